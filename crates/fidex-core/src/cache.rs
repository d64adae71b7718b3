//! Content-addressed on-disk cache of extraction results.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::models::ExtractionResult;

/// One JSON file per key under `root`. Entries never expire.
///
/// Writes go through a temporary file in the same directory followed by an
/// atomic rename, so concurrent stores of the same key leave one complete
/// entry behind. I/O failures are logged and otherwise ignored: a failed
/// lookup is a miss and a failed store is a no-op.
#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache key: hex SHA-256 of the bytes followed by the filename.
    pub fn key(bytes: &[u8], filename: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(filename.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn lookup(&self, key: &str) -> Option<ExtractionResult> {
        match self.try_lookup(key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn try_lookup(&self, key: &str) -> Result<Option<ExtractionResult>, CacheError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path)?;
        let result = serde_json::from_slice(&content)?;
        debug!("Cache hit {}", key);
        Ok(Some(result))
    }

    pub fn store(&self, key: &str, result: &ExtractionResult) {
        if let Err(e) = self.try_store(key, result) {
            warn!("Failed to write cache entry {}: {}", key, e);
        }
    }

    fn try_store(&self, key: &str, result: &ExtractionResult) -> Result<(), CacheError> {
        let json = serde_json::to_vec(result)?;

        fs::create_dir_all(&self.root)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&json)?;
        tmp.persist(self.entry_path(key))?;

        debug!("Cached {} ({} bytes)", key, json.len());
        Ok(())
    }

    /// Remove every entry. Returns how many were deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionMetadata;
    use chrono::Utc;

    fn result(name: &str) -> ExtractionResult {
        ExtractionResult {
            filename: name.to_string(),
            extraction_timestamp: Utc::now(),
            extraction_methods: Vec::new(),
            text: "Бюджет".to_string(),
            tables: Vec::new(),
            budgets: Vec::new(),
            currencies: Vec::new(),
            structured_data: Default::default(),
            metadata: ExtractionMetadata {
                extraction_success: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_key_depends_on_filename() {
        let a = ResultCache::key(b"same", "a.pdf");
        let b = ResultCache::key(b"same", "b.pdf");
        assert_ne!(a, b);
        assert_eq!(a, ResultCache::key(b"same", "a.pdf"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_store_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("nested"));
        let key = ResultCache::key(b"x", "x.txt");

        assert!(cache.lookup(&key).is_none());
        cache.store(&key, &result("x.txt"));

        let hit = cache.lookup(&key).unwrap();
        assert_eq!(hit.filename, "x.txt");
        assert_eq!(hit.text, "Бюджет");
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        fs::write(dir.path().join("abc.json"), b"{not json").unwrap();

        assert!(cache.lookup("abc").is_none());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        cache.store("k1", &result("a"));
        cache.store("k2", &result("b"));
        fs::write(dir.path().join("keep.txt"), b"").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.lookup("k1").is_none());
        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(ResultCache::new(dir.path().join("missing")).clear().unwrap(), 0);
    }
}
