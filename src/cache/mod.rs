//! Content-addressed, TTL-bounded cache for upstream API responses.
//!
//! Each cached response lives in its own file named by the SHA-256 hex of the
//! request URL, under a process-scoped temporary directory by default. The
//! file holds a JSON [`CacheEntry`] with the payload, the absolute expiry
//! timestamp, and the original URL for diagnostics.
//!
//! # Invariants
//!
//! - An entry is never returned once `now > expires_at`; expired reads delete
//!   the backing file and report a miss.
//! - A corrupt or unparsable entry is discarded, not surfaced as a hit. This
//!   also covers files left half-written by a crashed concurrent invocation:
//!   entries are immutable once fully written and keyed by content hash, so a
//!   partial file is simply treated as corrupt on the next read.
//! - A disabled cache makes every operation a no-op / always-miss; callers
//!   never special-case it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::core::{PinionError, Result};

/// One cached API response as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The response payload, opaque to the cache.
    pub data: serde_json::Value,
    /// Absolute expiry timestamp (RFC3339 in the file).
    pub expires_at: DateTime<Utc>,
    /// The request URL this entry was stored under, for diagnostics.
    pub url: String,
}

/// On-disk cache for upstream API responses.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
    enabled: bool,
}

impl Cache {
    /// Create a cache from explicit configuration.
    ///
    /// If the cache directory cannot be created, caching is disabled with a
    /// warning rather than failing the run.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        if let Err(e) = fs::create_dir_all(&config.dir) {
            warn!(error = %e, dir = %config.dir.display(), "failed to create cache directory, caching disabled");
            return Self::disabled();
        }

        debug!(dir = %config.dir.display(), ttl = ?config.ttl, "cache initialized");

        Self {
            dir: config.dir.clone(),
            ttl: config.ttl,
            enabled: true,
        }
    }

    /// A cache on which every operation is a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    /// Whether this cache stores anything at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// SHA-256 hex of the request URL, used as the entry filename.
    fn key(url: &str) -> String {
        let hash = Sha256::digest(url.as_bytes());
        hex::encode(hash)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    /// Retrieve a cached response, or `None` on any kind of miss.
    ///
    /// Expired and unparsable entries are deleted as a side effect.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }

        let path = self.entry_path(url);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(url, "cache miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(url, error = %e, "discarding unparsable cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if Utc::now() > entry.expires_at {
            debug!(url, "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        debug!(url, "cache hit");
        Some(entry.data)
    }

    /// Store a response under the URL's key with the configured TTL.
    pub fn set(&self, url: &str, data: &serde_json::Value) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        let entry = CacheEntry {
            data: data.clone(),
            expires_at,
            url: url.to_string(),
        };

        let encoded = serde_json::to_vec(&entry).map_err(|e| PinionError::CacheWrite {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        fs::write(self.entry_path(url), encoded).map_err(|e| PinionError::CacheWrite {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url, %expires_at, "cached response");
        Ok(())
    }

    /// Remove all cached entries and recreate the directory.
    pub fn clear(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Remove expired entries, returning how many were deleted.
    ///
    /// Unparsable files count as expired.
    pub fn clear_expired(&self) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }

        let now = Utc::now();
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.is_dir() {
                continue;
            }

            let Ok(raw) = fs::read(&path) else { continue };
            match serde_json::from_slice::<CacheEntry>(&raw) {
                Ok(entry) if now > entry.expires_at => {
                    let _ = fs::remove_file(&path);
                    removed += 1;
                }
                Ok(_) => {}
                Err(_) => {
                    let _ = fs::remove_file(&path);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(count = removed, "removed expired cache entries");
        }

        Ok(removed)
    }

    /// Entry count and total size in bytes of the cache directory.
    pub fn stats(&self) -> Result<(usize, u64)> {
        if !self.enabled {
            return Ok((0, 0));
        }

        let mut count = 0;
        let mut total_bytes = 0;

        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let metadata = dir_entry.metadata()?;
            if metadata.is_dir() {
                continue;
            }
            count += 1;
            total_bytes += metadata.len();
        }

        Ok((count, total_bytes))
    }

    /// The directory entries are stored under.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir, ttl: Duration) -> Cache {
        Cache::new(&CacheConfig {
            enabled: true,
            dir: dir.path().join("cache"),
            ttl,
        })
    }

    #[test]
    fn set_then_get_returns_payload() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp, Duration::from_secs(60));

        let payload = json!({"tag_name": "v4.0.0"});
        cache.set("https://example.test/releases", &payload).unwrap();

        let hit = cache.get("https://example.test/releases").unwrap();
        assert_eq!(hit, payload);
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp, Duration::ZERO);

        cache.set("https://example.test/tags", &json!([1, 2])).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(cache.get("https://example.test/tags").is_none());
        let (count, _) = cache.stats().unwrap();
        assert_eq!(count, 0, "expired entry should be deleted on read");
    }

    #[test]
    fn corrupt_entry_is_a_miss_and_removed() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp, Duration::from_secs(60));

        let url = "https://example.test/corrupt";
        cache.set(url, &json!("ok")).unwrap();
        let path = cache.entry_path(url);
        fs::write(&path, b"{half a json").unwrap();

        assert!(cache.get(url).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn disabled_cache_is_uniform_noop() {
        let cache = Cache::disabled();
        assert!(cache.set("https://example.test/x", &json!(1)).is_ok());
        assert!(cache.get("https://example.test/x").is_none());
        assert!(cache.clear().is_ok());
        assert_eq!(cache.clear_expired().unwrap(), 0);
        assert_eq!(cache.stats().unwrap(), (0, 0));
    }

    #[test]
    fn clear_removes_everything() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp, Duration::from_secs(60));

        cache.set("https://example.test/a", &json!(1)).unwrap();
        cache.set("https://example.test/b", &json!(2)).unwrap();
        assert_eq!(cache.stats().unwrap().0, 2);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().0, 0);
    }

    #[test]
    fn clear_expired_keeps_live_entries() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp, Duration::from_secs(3600));

        cache.set("https://example.test/live", &json!(1)).unwrap();
        // Write an already-expired entry by hand.
        let expired = CacheEntry {
            data: json!(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
            url: "https://example.test/dead".to_string(),
        };
        fs::write(
            cache.entry_path("https://example.test/dead"),
            serde_json::to_vec(&expired).unwrap(),
        )
        .unwrap();

        assert_eq!(cache.clear_expired().unwrap(), 1);
        assert!(cache.get("https://example.test/live").is_some());
    }

    #[test]
    fn keys_are_sha256_of_url() {
        assert_eq!(
            Cache::key("https://example.test/a"),
            Cache::key("https://example.test/a")
        );
        assert_ne!(
            Cache::key("https://example.test/a"),
            Cache::key("https://example.test/b")
        );
        assert_eq!(Cache::key("x").len(), 64);
    }
}
