//! Global constants used throughout the Pinion codebase.
//!
//! Timeouts, retry parameters, and cache defaults live here so the numeric
//! policy of the tool is discoverable in one place.

use std::time::Duration;

/// Timeout applied to every upstream HTTP request (30 seconds).
///
/// All blocking operations in a run are upstream HTTP calls; this bound keeps
/// a single hung connection from stalling a batch indefinitely.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retries for rate-limited upstream calls.
///
/// Non-rate-limit errors fail immediately without retry.
pub const MAX_RATE_LIMIT_RETRIES: usize = 3;

/// Starting delay for rate-limit backoff (2 seconds), doubling per attempt.
pub const RATE_LIMIT_BACKOFF_BASE_MS: u64 = 2_000;

/// Cap on a single rate-limit backoff delay (30 seconds).
pub const RATE_LIMIT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Default time-to-live for cached upstream responses (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum nesting depth when peeling `//` subdirectory markers during
/// classification. Bounds the rule chain on malformed input.
pub const MAX_CLASSIFY_DEPTH: usize = 4;

/// GitHub REST API base URL.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Terraform Registry API base URL.
pub const TERRAFORM_REGISTRY_BASE: &str = "https://registry.terraform.io";
