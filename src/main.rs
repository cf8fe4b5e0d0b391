//! Main entry point for the zipvfs CLI application.
//!
//! The archive core is synchronous; this front end runs it on tokio's
//! blocking pool so several entries can be extracted at once while sharing
//! one browser (and its cache) between worker threads.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use zipvfs::{ArchiveBrowser, ArchiveEntry, CachedArchive, Cli, entries_at_path};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let browser = Arc::new(ArchiveBrowser::new(cli.config())?);
    let archive = cli.file.clone();

    let cached = {
        let browser = browser.clone();
        let archive = archive.clone();
        tokio::task::spawn_blocking(move || browser.load(&archive)).await??
    };

    if cli.is_list() {
        list_files(&cached, &cli);
        return Ok(());
    }

    extract_files(browser, &archive, &cached, &cli).await
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// List one directory level (or, with `-r`, every entry).
///
/// Supports two output formats:
/// - Simple format (`-l`): Just entry paths, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(cached: &CachedArchive, cli: &Cli) {
    let entries: Vec<ArchiveEntry> = if cli.recursive {
        cached.entries.to_vec()
    } else {
        entries_at_path(&cli.dir, &cached.entries)
    };

    if !cli.verbose {
        for entry in &entries {
            println!("{}", entry.path);
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (date, time) = match entry.modification_time {
            Some(dt) => (
                dt.format("%Y-%m-%d").to_string(),
                dt.format("%H:%M").to_string(),
            ),
            None => ("----------".to_string(), "--:--".to_string()),
        };

        println!(
            "{:>10}  {:>10}  {}  {}  {}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            date,
            time,
            entry.path
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>17}  {} files, {}",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count,
        format_size(total_uncompressed)
    );
    if !cached.comment.is_empty() && !cli.is_quiet() {
        println!("{}", cached.comment);
    }
}

/// Percentage saved by compression.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        let saved = 100u64.saturating_sub(compressed.saturating_mul(100) / uncompressed);
        format!("{:>4}%", saved)
    } else {
        "  0%".to_string()
    }
}

/// Extract every selected entry on the blocking pool, then report (or pipe)
/// the results in archive order.
async fn extract_files(
    browser: Arc<ArchiveBrowser>,
    archive: &Path,
    cached: &CachedArchive,
    cli: &Cli,
) -> Result<()> {
    let selected: Vec<ArchiveEntry> = cached
        .entries
        .iter()
        .filter(|e| is_selected(e, cli))
        .cloned()
        .collect();

    if selected.is_empty() {
        bail!("No matching entries in {}", archive.display());
    }

    let tasks: Vec<_> = selected
        .into_iter()
        .map(|entry| {
            let browser = browser.clone();
            let archive = archive.to_path_buf();
            let offset_adjustment = cached.offset_adjustment;
            tokio::task::spawn_blocking(move || {
                let result = browser.extract_file(&entry, &archive, offset_adjustment);
                (entry, result)
            })
        })
        .collect();

    let show_filename = cli.pipe && tasks.len() > 1;
    let mut stdout = tokio::io::stdout();
    let mut failures = 0usize;

    for task in tasks {
        let (entry, result) = task.await?;
        let local: PathBuf = match result {
            Ok(local) => local,
            Err(e) => {
                tracing::error!(entry = %entry.path, "{e}");
                failures += 1;
                continue;
            }
        };

        if cli.pipe {
            if show_filename {
                stdout
                    .write_all(format!("--- {} ---\n", entry.path).as_bytes())
                    .await?;
            }
            stdout.write_all(&tokio::fs::read(&local).await?).await?;
        } else if cli.is_quiet() {
            println!("{}", local.display());
        } else {
            println!("  extracting: {} -> {}", entry.path, local.display());
        }
    }
    stdout.flush().await?;

    if failures > 0 {
        bail!("{failures} entries could not be extracted");
    }
    Ok(())
}

/// Apply the positional entry filters and the `-x` exclusions.
fn is_selected(entry: &ArchiveEntry, cli: &Cli) -> bool {
    if entry.is_directory {
        return false;
    }

    let matches = cli.entries.iter().any(|f| {
        if has_glob_chars(f) {
            glob_match(f, &entry.path)
        } else {
            entry.path == *f
        }
    });
    if !matches {
        return false;
    }

    !cli
        .exclude
        .iter()
        .any(|x| entry.path.contains(x.as_str()) || glob_match(x, &entry.path))
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Wildcard matching where `*` spans any run of characters (including
/// `/`) and `?` matches exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Human-readable byte count for summary lines.
fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
