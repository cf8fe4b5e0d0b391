//! The archive browsing component shared by every caller in a process.
//!
//! All operations are synchronous. Each call opens its own handle on the
//! archive, so one [`ArchiveBrowser`] can be shared across worker threads
//! behind an `Arc`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

use crate::cache::{ArchiveCache, CachedArchive};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::io::LocalFileReader;
use crate::zip::{ArchiveEntry, ZipExtractor, ZipParser, entries_at_path, entry_name};

/// Longer extensions are dropped from extracted file names so the hash
/// prefix plus extension stays within filesystem name limits.
const MAX_EXTENSION_LEN: usize = 32;

/// Counters for how much work the browser has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrowserStats {
    /// Cold reads of an archive's central directory.
    pub parses: u64,
    /// `read_contents` calls answered from the cache.
    pub cache_hits: u64,
    /// Entry payloads read and decoded for extraction.
    pub decompressions: u64,
}

#[derive(Default)]
struct Counters {
    parses: AtomicU64,
    cache_hits: AtomicU64,
    decompressions: AtomicU64,
}

enum ExtractDir {
    Owned(TempDir),
    Fixed(PathBuf),
}

impl ExtractDir {
    fn path(&self) -> &Path {
        match self {
            ExtractDir::Owned(dir) => dir.path(),
            ExtractDir::Fixed(path) => path,
        }
    }
}

/// Lists ZIP archives as directories and extracts single entries on demand.
pub struct ArchiveBrowser {
    cache: ArchiveCache,
    extract_dir: ExtractDir,
    verify_crc: bool,
    counters: Counters,
}

impl ArchiveBrowser {
    pub fn new(config: BrowserConfig) -> Result<Self> {
        let extract_dir = match config.extract_dir {
            Some(path) => ExtractDir::Fixed(path),
            None => ExtractDir::Owned(
                tempfile::Builder::new()
                    .prefix("zipvfs-")
                    .tempdir()
                    .map_err(|e| Error::io("create extraction directory", e))?,
            ),
        };

        tracing::debug!(dir = %extract_dir.path().display(), "extraction directory");

        Ok(Self {
            cache: ArchiveCache::new(),
            extract_dir,
            verify_crc: config.verify_crc,
            counters: Counters::default(),
        })
    }

    /// Directory extracted entries are written to.
    pub fn extract_dir(&self) -> &Path {
        self.extract_dir.path()
    }

    pub fn stats(&self) -> BrowserStats {
        BrowserStats {
            parses: self.counters.parses.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            decompressions: self.counters.decompressions.load(Ordering::Relaxed),
        }
    }

    /// Every entry in the archive, in central directory order.
    pub fn read_contents(&self, archive: &Path) -> Result<Arc<[ArchiveEntry]>> {
        Ok(self.load(archive)?.entries.clone())
    }

    /// The cached parse of `archive`, refreshed if the file changed.
    pub fn load(&self, archive: &Path) -> Result<Arc<CachedArchive>> {
        let (key, modified) = identity(archive)?;

        if let Some(cached) = self.cache.get(&key, modified) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(archive = %key.display(), "archive cache hit");
            return Ok(cached);
        }

        tracing::debug!(archive = %key.display(), "reading archive");
        let reader = open(&key)?;
        let modified = reader.modified();
        let parsed = ZipParser::new(Arc::new(reader)).parse()?;
        self.counters.parses.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            archive = %key.display(),
            entries = parsed.entries.len(),
            offset_adjustment = parsed.offset_adjustment,
            "archive read"
        );

        let cached = Arc::new(CachedArchive {
            entries: parsed.entries.into(),
            modified,
            offset_adjustment: parsed.offset_adjustment,
            comment: parsed.comment,
        });
        self.cache.insert(key, cached.clone());
        Ok(cached)
    }

    /// Forget the cached parse of `archive`.
    pub fn invalidate(&self, archive: &Path) -> bool {
        let key = fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
        self.cache.remove(&key)
    }

    /// Children of `path` inside `archive` (`""` for the root).
    pub fn list(&self, archive: &Path, path: &str) -> Result<Vec<ArchiveEntry>> {
        let entries = self.read_contents(archive)?;
        Ok(entries_at_path(path, &entries))
    }

    /// Materialize `entry` under the extraction directory and return its
    /// path. Repeated calls return the existing file without reading the
    /// archive again.
    pub fn extract_file(
        &self,
        entry: &ArchiveEntry,
        archive: &Path,
        offset_adjustment: i64,
    ) -> Result<PathBuf> {
        if entry.is_directory {
            return Err(Error::CannotExtractDirectory(entry.path.clone()));
        }

        let (key, modified) = identity(archive)?;
        let destination = self.destination(&key, modified, &entry.path);
        if destination.exists() {
            tracing::trace!(entry = %entry.path, "already extracted");
            return Ok(destination);
        }

        let reader = open(&key)?;
        self.counters.decompressions.fetch_add(1, Ordering::Relaxed);
        ZipExtractor::new(Arc::new(reader))
            .verify_crc(self.verify_crc)
            .extract_to_file(entry, offset_adjustment, &destination)?;

        tracing::debug!(entry = %entry.path, to = %destination.display(), "extracted");
        Ok(destination)
    }

    /// Extract the entry at exactly `path`.
    pub fn extract_by_path(&self, path: &str, archive: &Path) -> Result<PathBuf> {
        let cached = self.load(archive)?;
        let entry = cached
            .entries
            .iter()
            .find(|e| e.path == path)
            .ok_or_else(|| Error::invalid(format!("no entry `{path}` in archive")))?;
        self.extract_file(entry, archive, cached.offset_adjustment)
    }

    /// Where `path` would be extracted to, if it already has been. Never
    /// reads the archive's contents.
    pub fn extracted_file_path(&self, path: &str, archive: &Path) -> Option<PathBuf> {
        let (key, modified) = identity(archive).ok()?;
        let destination = self.destination(&key, modified, path);
        destination.exists().then_some(destination)
    }

    /// Content-addressed location for an entry: a hash of the archive
    /// identity, its modification time and the entry path, keeping a short
    /// extension so the file type stays recognizable.
    fn destination(&self, archive: &Path, modified: SystemTime, entry_path: &str) -> PathBuf {
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(archive.as_os_str().as_encoded_bytes());
        hasher.update(&[0]);
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&[0]);
        hasher.update(entry_path.as_bytes());
        let mut file_name = hasher.finalize().to_hex().to_string();

        if let Some(ext) = Path::new(entry_name(entry_path))
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= MAX_EXTENSION_LEN)
        {
            file_name.push('.');
            file_name.push_str(ext);
        }

        self.extract_dir.path().join(file_name)
    }
}

/// Canonical path and modification time: the cache key and the input to
/// extracted file names.
fn identity(archive: &Path) -> Result<(PathBuf, SystemTime)> {
    let key = fs::canonicalize(archive)
        .map_err(|e| Error::io(format!("resolve archive `{}`", archive.display()), e))?;
    let modified = fs::metadata(&key)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(format!("stat archive `{}`", key.display()), e))?;
    Ok((key, modified))
}

fn open(archive: &Path) -> Result<LocalFileReader> {
    LocalFileReader::new(archive)
        .map_err(|e| Error::io(format!("open archive `{}`", archive.display()), e))
}
