//! Process-local cache driver.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::cache::{expiry_from, remaining, Cache, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Unix seconds; `None` never expires.
    expires_at: Option<u64>,
}

/// A thread-safe in-memory cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let live = {
            let entry = self.inner.get(key)?;
            remaining(entry.expires_at).map(|_| entry.value.clone())
        };
        if live.is_none() {
            self.inner
                .remove_if(key, |_, entry| remaining(entry.expires_at).is_none());
        }
        live
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expiry_from(ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.remove(key);
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.inner.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear();
        Ok(())
    }

    fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let entry = self.inner.get(key)?;
        remaining(entry.expires_at)
    }

    fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, CacheError> {
        // The shard lock is held for the whole read-modify-write.
        let mut slot = self.inner.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::from(0u64),
            expires_at: expiry_from(ttl),
        });
        if remaining(slot.expires_at).is_none() {
            *slot = Entry {
                value: Value::from(0u64),
                expires_at: expiry_from(ttl),
            };
        }
        let count = slot.value.as_u64().unwrap_or(0) + 1;
        slot.value = Value::from(count);
        Ok(count)
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| remaining(entry.expires_at).is_some());
        Ok(before.saturating_sub(self.inner.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_operations() {
        let cache = MemoryCache::new();
        assert!(cache.get("user:1").is_none());

        cache.set("user:1", json!({"name": "a"}), None).unwrap();
        assert_eq!(cache.get("user:1"), Some(json!({"name": "a"})));
        assert_eq!(cache.ttl("user:1"), Some(None));

        cache.delete("user:1").unwrap();
        assert!(cache.get("user:1").is_none());
        assert!(cache.ttl("user:1").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Some(Duration::from_secs(30))).unwrap();
        let left = cache.ttl("short").unwrap().unwrap();
        assert!(left.as_secs() <= 30);

        // Force expiry by rewriting the entry in the past.
        cache.inner.insert(
            "gone".into(),
            Entry {
                value: json!(2),
                expires_at: Some(1),
            },
        );
        assert!(cache.get("gone").is_none());
        assert!(!cache.inner.contains_key("gone"));
    }

    #[test]
    fn test_delete_prefix_and_purge() {
        let cache = MemoryCache::new();
        cache.set("session:a", json!(1), None).unwrap();
        cache.set("session:b", json!(2), None).unwrap();
        cache.set("other", json!(3), None).unwrap();
        cache.inner.insert(
            "stale".into(),
            Entry {
                value: json!(0),
                expires_at: Some(1),
            },
        );

        cache.delete_prefix("session:").unwrap();
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("other"), Some(json!(3)));

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_increment_counts_and_restarts_after_expiry() {
        let cache = MemoryCache::new();
        let window = Some(Duration::from_secs(60));
        assert_eq!(cache.increment("hits", window).unwrap(), 1);
        assert_eq!(cache.increment("hits", window).unwrap(), 2);
        assert!(cache.ttl("hits").unwrap().is_some());

        cache.inner.insert(
            "hits".into(),
            Entry {
                value: json!(9),
                expires_at: Some(1),
            },
        );
        assert_eq!(cache.increment("hits", window).unwrap(), 1);
    }

    #[test]
    fn test_increment_is_atomic_across_threads() {
        let cache = MemoryCache::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        cache.increment("shared", None).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(cache.get("shared"), Some(json!(2000)));
    }

    #[tokio::test]
    async fn test_purge_task_bounds_growth() {
        let cache = MemoryCache::new();
        for i in 0..100 {
            cache.inner.insert(
                format!("stale:{i}"),
                Entry {
                    value: json!(i),
                    expires_at: Some(1),
                },
            );
        }
        cache.set("live", json!(1), None).unwrap();

        let task = crate::cache::spawn_purge(Arc::new(cache.clone()), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("live"), Some(json!(1)));
    }
}
