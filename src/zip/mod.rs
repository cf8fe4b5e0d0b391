//! ZIP archive parsing and extraction.
//!
//! This module provides functionality for reading ZIP archives and
//! extracting single entries, supporting both the standard format and the
//! Zip64 extensions for large archives.
//!
//! ## Architecture
//!
//! - [`bytes`]: Bounds-checked little-endian field access
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`encoding`]: Fallback decoding of legacy filenames
//! - [`parser`]: Locating the trailer, Zip64 records, offset skew and the central directory
//! - [`hierarchy`]: One-level directory listings over the flat entry list
//! - [`extractor`]: Reading, decoding and writing single entries
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Self-extracting archives put an executable stub in front of all of
//! this without rewriting the stored offsets; the parser detects and
//! corrects the resulting skew.
//!
//! ## Limitations
//!
//! - Read-only
//! - No encryption support
//! - No multi-disk archive support (detected and logged)
//! - Only STORED and DEFLATE compression methods

pub mod bytes;
pub mod encoding;
mod extractor;
mod hierarchy;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use hierarchy::entries_at_path;
pub use parser::{LocatedEocd, ParseStats, ParsedArchive, ZipParser, adjusted_offset, offset_adjustment};
pub use structures::*;
