// src/core/cache.rs
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;

/// Source text shared between the scanning and resolution passes.
///
/// Bounded, least-recently-used eviction, one lock for all workers.
/// A capacity of zero turns caching off and every read goes to disk.
pub struct ContentCache {
    entries: Option<Mutex<LruCache<PathBuf, Arc<str>>>>,
}

impl ContentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Cached contents, or read from disk (invalid UTF-8 is replaced) and remember
    pub fn read(&self, path: &Path) -> Result<Arc<str>> {
        if let Some(entries) = &self.entries {
            if let Some(hit) = entries.lock().get(path) {
                return Ok(Arc::clone(hit));
            }
        }

        let bytes = std::fs::read(path)?;
        let text: Arc<str> = Arc::from(String::from_utf8_lossy(&bytes).into_owned());

        if let Some(entries) = &self.entries {
            entries.lock().put(path.to_path_buf(), Arc::clone(&text));
        }
        Ok(text)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_read_survives_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "x = 1\n").unwrap();

        let cache = ContentCache::new(4);
        assert_eq!(&*cache.read(&path).unwrap(), "x = 1\n");

        std::fs::write(&path, "x = 2\n").unwrap();
        assert_eq!(&*cache.read(&path).unwrap(), "x = 1\n");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("m{}.py", i));
                std::fs::write(&path, format!("v = {}\n", i)).unwrap();
                path
            })
            .collect();

        let cache = ContentCache::new(2);
        for path in &paths {
            cache.read(path).unwrap();
        }
        assert_eq!(cache.len(), 2);

        // m0 was evicted, so the new contents are visible
        std::fs::write(&paths[0], "v = 10\n").unwrap();
        assert_eq!(&*cache.read(&paths[0]).unwrap(), "v = 10\n");
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "first").unwrap();

        let cache = ContentCache::new(0);
        cache.read(&path).unwrap();
        std::fs::write(&path, "second").unwrap();

        assert_eq!(&*cache.read(&path).unwrap(), "second");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.py");
        std::fs::write(&path, b"name = '\xe9'\n").unwrap();

        let text = ContentCache::new(1).read(&path).unwrap();
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let cache = ContentCache::new(1);
        assert!(cache.read(Path::new("/no/such/file.py")).is_err());
    }
}
