//! Upstream HTTP clients.
//!
//! One client per source authority:
//! - [`github::GithubClient`] - GitHub REST API (releases, tags, tag refs)
//! - [`registry::RegistryClient`] - Terraform Registry (modules, providers)
//! - [`oci::OciClient`] - container registries (Docker Hub, GHCR, generic)
//!
//! Every client shares the same request discipline: a fixed 30-second
//! timeout, `Authorization: Bearer <token>` injection when a token is
//! supplied (with a logged warning on anonymous fallback), any non-200
//! response surfaced as an error carrying the status and body, and JSON
//! decoded once into a typed per-endpoint struct with validation errors
//! raised at the decode boundary.
//!
//! GitHub and Terraform Registry responses go through the shared [`Cache`];
//! OCI digest lookups read a response *header* and are not cached.

pub mod github;
pub mod oci;
pub mod registry;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::constants::HTTP_TIMEOUT;
use crate::core::{PinionError, Result};

/// Build the shared reqwest client with the fixed request timeout.
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("pinion/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PinionError::Config {
            message: format!("failed to build http client: {e}"),
        })
}

/// Fetch `url` as JSON and decode it into `T`, going through the cache.
///
/// `object` names what is being fetched and is carried into the not-found
/// error on a 404. A cache hit that no longer matches the expected shape is
/// treated as a miss and refetched, never surfaced as a hit.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    cache: &Cache,
    url: &str,
    token: Option<&str>,
    object: &str,
) -> Result<T> {
    if let Some(value) = cache.get(url) {
        match serde_json::from_value::<T>(value) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => debug!(url, error = %e, "cached payload no longer matches contract, refetching"),
        }
    }

    let mut request = http.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    } else if url.starts_with(crate::constants::GITHUB_API_BASE) {
        // The registry allows anonymous reads; only GitHub anonymous access
        // is worth flagging, its unauthenticated rate limit is tiny.
        warn!(url, "no token supplied, falling back to anonymous auth");
    }

    let response = request.send().await.map_err(|e| PinionError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(PinionError::NotFound {
            object: object.to_string(),
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PinionError::ApiStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let value: serde_json::Value =
        response.json().await.map_err(|e| PinionError::MalformedResponse {
            url: url.to_string(),
            reason: format!("body is not JSON: {e}"),
        })?;

    store_response(cache, url, &value);

    serde_json::from_value(value).map_err(|e| PinionError::MalformedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Cache a fetched response. The response is already in hand, so a cache
/// write failure is only worth a warning, never a resolution failure.
fn store_response(cache: &Cache, url: &str, value: &serde_json::Value) {
    if let Err(e) = cache.set(url, value) {
        warn!(url, error = %e, "failed to cache response, continuing uncached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::config::CacheConfig;

    #[test]
    fn cache_write_failure_does_not_propagate() {
        let temp = tempfile::TempDir::new().unwrap();
        let cache = Cache::new(&CacheConfig {
            enabled: true,
            dir: temp.path().join("cache"),
            ttl: Duration::from_secs(60),
        });

        // Remove the backing directory so the write itself fails.
        std::fs::remove_dir_all(temp.path().join("cache")).unwrap();

        let url = "https://api.github.com/repos/a/b/releases/latest";
        let payload = serde_json::json!({"tag_name": "v1.0.0"});
        assert!(cache.set(url, &payload).is_err());

        store_response(&cache, url, &payload);
        assert!(cache.get(url).is_none());
    }
}
