//! On-disk cache driver.
//!
//! Each key is stored as `<sha256(key)>.json` holding the key, the value
//! and the absolute expiry. Writes go through a temp file and a rename so
//! readers never observe a partial document. Every call does blocking IO,
//! so async callers run it through `spawn_blocking`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cache::{expiry_from, remaining, Cache, CacheError};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    key: String,
    value: Value,
    expires_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    /// Serialises writers within this process.
    lock: Arc<Mutex<()>>,
}

impl FileCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", hex::encode(Sha256::digest(key.as_bytes()))))
    }

    fn read(&self, path: &Path) -> Option<Document> {
        let bytes = fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Discarding corrupt cache entry");
                let _ = fs::remove_file(path);
                None
            }
        }
    }

    fn write(path: &Path, doc: &Document) -> Result<(), CacheError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(doc)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn remove(path: &Path) -> Result<(), CacheError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let doc = self.read(&path)?;
        if remaining(doc.expires_at).is_none() {
            let _ = Self::remove(&path);
            return None;
        }
        Some(doc.value)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let doc = Document {
            key: key.to_string(),
            value,
            expires_at: expiry_from(ttl),
        };
        let _guard = self.lock.lock().expect("file cache lock poisoned");
        Self::write(&self.path_for(key), &doc)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        Self::remove(&self.path_for(key))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        for path in self.entries()? {
            if let Some(doc) = self.read(&path) {
                if doc.key.starts_with(prefix) {
                    Self::remove(&path)?;
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        for path in self.entries()? {
            Self::remove(&path)?;
        }
        Ok(())
    }

    fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let doc = self.read(&self.path_for(key))?;
        remaining(doc.expires_at)
    }

    fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, CacheError> {
        let _guard = self.lock.lock().expect("file cache lock poisoned");
        let path = self.path_for(key);
        let doc = match self.read(&path) {
            Some(doc) if remaining(doc.expires_at).is_some() => Document {
                value: Value::from(doc.value.as_u64().unwrap_or(0) + 1),
                ..doc
            },
            _ => Document {
                key: key.to_string(),
                value: Value::from(1u64),
                expires_at: expiry_from(ttl),
            },
        };
        Self::write(&path, &doc)?;
        Ok(doc.value.as_u64().unwrap_or(1))
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut purged = 0;
        for path in self.entries()? {
            if let Some(doc) = self.read(&path) {
                if remaining(doc.expires_at).is_none() {
                    Self::remove(&path)?;
                    purged += 1;
                }
            }
        }
        Ok(purged)
    }

    fn is_blocking(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.set("page:/home", json!("<h1>hi</h1>"), None).unwrap();

        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get("page:/home"), Some(json!("<h1>hi</h1>")));
        assert_eq!(reopened.ttl("page:/home"), Some(None));
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let path = cache.path_for("old");
        let doc = Document {
            key: "old".into(),
            value: json!(1),
            expires_at: Some(1),
        };
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(cache.get("old").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        fs::write(cache.path_for("bad"), b"{not json").unwrap();
        assert!(cache.get("bad").is_none());
    }

    #[test]
    fn test_delete_prefix_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.set("user:1", json!(1), None).unwrap();
        cache.set("user:2", json!(2), Some(Duration::from_secs(60))).unwrap();
        cache.set("post:1", json!(3), None).unwrap();

        cache.delete_prefix("user:").unwrap();
        assert!(cache.get("user:1").is_none());
        assert!(cache.get("user:2").is_none());
        assert_eq!(cache.get("post:1"), Some(json!(3)));

        cache.delete("post:1").unwrap();
        cache.delete("post:1").unwrap();
        cache.set("x", json!(0), None).unwrap();
        cache.clear().unwrap();
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn test_increment_under_contention() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        cache.increment("hits", Some(Duration::from_secs(60))).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(cache.get("hits"), Some(json!(100)));
        assert!(cache.ttl("hits").unwrap().is_some());
    }

    #[test]
    fn test_purge_expired_removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.set("keep", json!(1), None).unwrap();
        let doc = Document {
            key: "old".into(),
            value: json!(1),
            expires_at: Some(1),
        };
        FileCache::write(&cache.path_for("old"), &doc).unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.entries().unwrap().len(), 1);
        assert!(cache.is_blocking());
    }
}
