use clap::Parser;
use std::path::PathBuf;

use crate::config::BrowserConfig;

#[derive(Parser, Debug)]
#[command(name = "zipvfs")]
#[command(version)]
#[command(about = "Browse ZIP archives like directories and extract single entries", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipvfs -l photos.zip --dir 2020     list one directory level inside photos.zip\n  \
  zipvfs -v -r setup.exe              list every entry of a self-extracting archive\n  \
  zipvfs photos.zip '2020/*.jpg'      extract matching entries, print their paths\n  \
  zipvfs -p notes.zip todo.txt | less send an entry via pipe into less")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Entries to extract, by exact path or `*`/`?` pattern (default: list)
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Directory inside the archive to list
    #[arg(long = "dir", value_name = "PATH", default_value = "")]
    pub dir: String,

    /// List every entry instead of a single directory level
    #[arg(short = 'r')]
    pub recursive: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Keep extracted entries in DIR (default: $TMPDIR/zipvfs)
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Exclude entries that follow
    #[arg(short = 'x', value_name = "ENTRY", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Do not check extracted data against its CRC-32
    #[arg(long = "no-crc")]
    pub no_crc: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Log parser decisions to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn is_list(&self) -> bool {
        self.list || self.verbose || self.entries.is_empty()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "zipvfs=debug"
        } else if self.is_very_quiet() {
            "off"
        } else if self.quiet > 0 {
            "error"
        } else {
            "warn"
        }
    }

    /// Extracted files outlive the process so later runs can reuse them.
    pub fn config(&self) -> BrowserConfig {
        BrowserConfig {
            extract_dir: Some(
                self.extract_dir
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("zipvfs")),
            ),
            verify_crc: !self.no_crc,
        }
    }
}
