//! Cache abstraction.
//!
//! # Data Flow
//! ```text
//! caller (throttle middleware, application code)
//!     → Cache trait (get/set/delete/ttl)
//!     → memory.rs (DashMap, process-local)
//!     → file.rs (one JSON document per key on disk)
//! ```
//!
//! # Design Decisions
//! - Values are `serde_json::Value` so every driver can persist them
//! - Expired entries read as absent and are dropped lazily on read, and in
//!   bulk by the purge task started with [`spawn_purge`]
//! - A `ttl` of `None` means "never expires"
//! - Drivers that touch the filesystem report [`Cache::is_blocking`] so async
//!   callers move them off the runtime threads

pub mod file;
pub mod memory;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{CacheConfig, CacheDriver};

pub use file::FileCache;
pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Key/value store with per-entry expiry.
pub trait Cache: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;

    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`.
    fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    /// Remaining lifetime. `None` when the key is absent; `Some(None)` when it
    /// never expires.
    fn ttl(&self, key: &str) -> Option<Option<Duration>>;

    /// Atomically add one to the counter at `key` and return the new count.
    ///
    /// A missing or expired counter restarts at 1 with `ttl`; a live counter
    /// keeps its original expiry.
    fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, CacheError>;

    /// Drop every expired entry, returning how many were removed.
    fn purge_expired(&self) -> Result<usize, CacheError>;

    /// Whether operations block the calling thread on IO.
    fn is_blocking(&self) -> bool {
        false
    }
}

/// Build the driver selected in configuration.
pub fn from_config(config: &CacheConfig) -> Result<Arc<dyn Cache>, CacheError> {
    match config.driver {
        CacheDriver::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheDriver::File => Ok(Arc::new(FileCache::open(&config.dir)?)),
    }
}

/// Purge expired entries every `every` until the handle is aborted.
pub fn spawn_purge(cache: Arc<dyn Cache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticks.tick().await;
        loop {
            ticks.tick().await;
            let result = if cache.is_blocking() {
                let cache = cache.clone();
                match tokio::task::spawn_blocking(move || cache.purge_expired()).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(error = %e, "Cache purge task failed");
                        continue;
                    }
                }
            } else {
                cache.purge_expired()
            };
            match result {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired cache entries"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired cache entries"),
            }
        }
    })
}

/// Run `f` at most once per `ttl` for `key`.
///
/// Returns `None` when the call was suppressed.
pub fn throttle<T>(cache: &dyn Cache, key: &str, ttl: Duration, f: impl FnOnce() -> T) -> Option<T> {
    let cache_key = format!("throttle_{}", hex::encode(Sha256::digest(key.as_bytes())));
    if cache.get(&cache_key).is_some() {
        return None;
    }

    let result = f();
    if let Err(e) = cache.set(&cache_key, Value::Bool(true), Some(ttl)) {
        tracing::warn!(error = %e, key, "Failed to record throttle marker");
    }
    Some(result)
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Absolute expiry timestamp for a relative ttl.
pub(crate) fn expiry_from(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| unix_now() + ttl.as_secs().max(1))
}

/// Remaining lifetime of an absolute expiry, `None` once expired.
pub(crate) fn remaining(expires_at: Option<u64>) -> Option<Option<Duration>> {
    match expires_at {
        None => Some(None),
        Some(at) => {
            let now = unix_now();
            if at > now {
                Some(Some(Duration::from_secs(at - now)))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_runs_once_per_window() {
        let cache = MemoryCache::new();
        let window = Duration::from_secs(60);

        assert_eq!(throttle(&cache, "login:1.2.3.4", window, || 1), Some(1));
        assert_eq!(throttle(&cache, "login:1.2.3.4", window, || 2), None);
        assert_eq!(throttle(&cache, "login:5.6.7.8", window, || 3), Some(3));
    }

    #[test]
    fn test_remaining() {
        assert_eq!(remaining(None), Some(None));
        assert_eq!(remaining(Some(0)), None);
        let left = remaining(Some(unix_now() + 30)).unwrap().unwrap();
        assert!(left <= Duration::from_secs(30) && left >= Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_purge_task_drops_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache: Arc<dyn Cache> = Arc::new(FileCache::open(dir.path()).unwrap());
        cache.set("live", Value::from(1), None).unwrap();
        cache.set("short", Value::from(2), Some(Duration::from_secs(1))).unwrap();

        let task = spawn_purge(cache.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(2_300)).await;
        task.abort();

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
        assert_eq!(cache.get("live"), Some(Value::from(1)));
    }

    #[test]
    fn test_from_config_memory() {
        let cache = from_config(&CacheConfig::default()).unwrap();
        cache.set("k", Value::from(1), None).unwrap();
        assert_eq!(cache.get("k"), Some(Value::from(1)));
    }
}
