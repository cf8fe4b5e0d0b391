//! # zipvfs
//!
//! Read-only ZIP/Zip64 browsing for file managers and thumbnailers.
//!
//! An archive is parsed once (trailer, Zip64 records, central directory)
//! and the resulting entry list is cached until the file's modification
//! time changes. Directory levels are served from that list, and single
//! entries are extracted on demand to content-addressed files that are
//! reused on later requests.
//!
//! ## Features
//!
//! - Support for ZIP64 format (archives larger than 4GB)
//! - Self-extracting and otherwise prefixed archives
//! - Legacy filename encodings (Latin-1, Windows-1252, Mac OS Roman, Shift-JIS)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - Damaged central directories yield the entries that could be read
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipvfs::{ArchiveBrowser, BrowserConfig};
//!
//! fn main() -> zipvfs::Result<()> {
//!     let browser = ArchiveBrowser::new(BrowserConfig::default())?;
//!     let archive = Path::new("photos.zip");
//!
//!     for entry in browser.list(archive, "")? {
//!         println!("{}{}", entry.name, if entry.is_directory { "/" } else { "" });
//!     }
//!
//!     let local = browser.extract_by_path("2020/beach.jpg", archive)?;
//!     println!("extracted to {}", local.display());
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod zip;

pub use browser::{ArchiveBrowser, BrowserStats};
pub use cache::CachedArchive;
pub use cli::Cli;
pub use config::BrowserConfig;
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{ArchiveEntry, CompressionMethod, ZipExtractor, ZipParser, entries_at_path};
