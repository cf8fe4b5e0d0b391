//! Parsed-archive memo keyed by archive path and modification time.
//!
//! The lock covers map access only. Parsing happens outside it, so two
//! threads refreshing the same stale archive may both parse; the later
//! insert wins and both results are identical.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::zip::ArchiveEntry;

/// Immutable result of one cold read. Replaced wholesale, never mutated.
#[derive(Debug)]
pub struct CachedArchive {
    pub entries: Arc<[ArchiveEntry]>,
    pub modified: SystemTime,
    pub offset_adjustment: i64,
    pub comment: String,
}

#[derive(Debug, Default)]
pub struct ArchiveCache {
    archives: Mutex<HashMap<PathBuf, Arc<CachedArchive>>>,
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached parse of `path`, if it was taken at `modified`.
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<CachedArchive>> {
        self.lock()
            .get(path)
            .filter(|cached| cached.modified == modified)
            .cloned()
    }

    pub fn insert(&self, path: PathBuf, archive: Arc<CachedArchive>) {
        self.lock().insert(path, archive);
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.lock().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Values are immutable Arcs, so a panic elsewhere cannot leave the map
    // half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<CachedArchive>>> {
        self.archives.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cached(modified: SystemTime, offset_adjustment: i64) -> Arc<CachedArchive> {
        Arc::new(CachedArchive {
            entries: Arc::from(Vec::new()),
            modified,
            offset_adjustment,
            comment: String::new(),
        })
    }

    #[test]
    fn stale_entries_are_not_returned() {
        let cache = ArchiveCache::new();
        let path = Path::new("/archives/a.zip");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(1);

        cache.insert(path.to_path_buf(), cached(t0, 0));
        assert!(cache.get(path, t0).is_some());
        assert!(cache.get(path, t1).is_none());
        assert!(cache.get(Path::new("/archives/b.zip"), t0).is_none());
    }

    #[test]
    fn insert_replaces_wholesale() {
        let cache = ArchiveCache::new();
        let path = PathBuf::from("/archives/a.zip");
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(5);

        cache.insert(path.clone(), cached(t0, 0));
        cache.insert(path.clone(), cached(t1, 42));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&path, t1).unwrap().offset_adjustment, 42);

        assert!(cache.remove(&path));
        assert!(cache.is_empty());
    }
}
