//! Run configuration threaded through every component constructor.
//!
//! Pinion deliberately avoids ambient process state: the cache directory,
//! TTL, auth token, and per-run switches are all carried in [`RunConfig`] and
//! handed to each component explicitly. The only environment access happens
//! in the CLI layer, where clap reads `GITHUB_TOKEN` as a flag default.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::DEFAULT_CACHE_TTL;

/// Cache configuration: location, time-to-live, and the enable switch.
///
/// A disabled cache makes every cache operation a no-op; callers never
/// special-case it.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether responses are cached at all.
    pub enabled: bool,
    /// Directory holding one file per cached response.
    pub dir: PathBuf,
    /// How long an entry stays valid after being written.
    pub ttl: Duration,
}

impl CacheConfig {
    /// Default cache settings: enabled, 24h TTL, `pinion-cache` under the
    /// system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            dir: std::env::temp_dir().join("pinion-cache"),
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run configuration for the orchestrators.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// GitHub bearer token. Absent means anonymous requests, which are
    /// rate-limited more aggressively - expected, not fatal.
    pub token: Option<String>,
    /// Compute resolutions and diffs but never write the target file.
    pub dry_run: bool,
    /// When true, a per-reference resolution failure is logged and skipped;
    /// when false it aborts the whole file.
    pub continue_on_error: bool,
    /// Minimum age in days a release must have before being eligible.
    /// Zero means no filtering (take the latest release).
    pub stability_days: u32,
}

impl RunConfig {
    /// Borrow the token as a `&str`, if present.
    #[must_use]
    pub fn token_deref(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
