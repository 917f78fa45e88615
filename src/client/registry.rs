//! Terraform Registry API client.
//!
//! Consumes two read-only endpoints:
//! - `GET /v1/modules/{namespace}/{name}/{provider}/versions`
//! - `GET /v1/providers/{namespace}/{type}/versions`

use serde::Deserialize;

use crate::cache::Cache;
use crate::constants::TERRAFORM_REGISTRY_BASE;
use crate::core::Result;

use super::{build_http_client, get_json};

/// Response of the module versions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleVersionsResponse {
    /// One entry per published registry module version set.
    pub modules: Vec<ModuleVersions>,
}

/// Version list for a single registry module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleVersions {
    /// All published versions of the module.
    pub versions: Vec<VersionEntry>,
}

/// A single version string wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    /// Version without a `v` prefix (registry convention).
    pub version: String,
}

/// Response of the provider versions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderVersionsResponse {
    /// All published provider versions.
    pub versions: Vec<VersionEntry>,
}

/// Client for the public Terraform Registry.
///
/// The registry allows anonymous reads; no token is attached.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    cache: Cache,
}

impl RegistryClient {
    /// Create a client sharing the given response cache.
    pub fn new(cache: Cache) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            cache,
        })
    }

    /// Whether `{namespace}/{name}/{provider}` is a published registry
    /// module. A 404 means "no", any other failure propagates.
    pub async fn module_exists(&self, namespace: &str, name: &str, provider: &str) -> Result<bool> {
        let url =
            format!("{TERRAFORM_REGISTRY_BASE}/v1/modules/{namespace}/{name}/{provider}/versions");
        match get_json::<ModuleVersionsResponse>(
            &self.http,
            &self.cache,
            &url,
            None,
            "module versions",
        )
        .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All published versions of a provider.
    pub async fn provider_versions(
        &self,
        namespace: &str,
        provider_type: &str,
    ) -> Result<ProviderVersionsResponse> {
        let url =
            format!("{TERRAFORM_REGISTRY_BASE}/v1/providers/{namespace}/{provider_type}/versions");
        get_json(&self.http, &self.cache, &url, None, "provider versions").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_versions_decode() {
        let response: ProviderVersionsResponse = serde_json::from_value(serde_json::json!({
            "versions": [
                {"version": "5.31.0", "protocols": ["5.0"]},
                {"version": "5.30.0", "protocols": ["5.0"]},
            ],
        }))
        .unwrap();
        assert_eq!(response.versions.len(), 2);
        assert_eq!(response.versions[0].version, "5.31.0");
    }

    #[test]
    fn module_versions_decode() {
        let response: ModuleVersionsResponse = serde_json::from_value(serde_json::json!({
            "modules": [
                {"source": "jameswoolfenden/http/ip", "versions": [{"version": "0.3.12"}]},
            ],
        }))
        .unwrap();
        assert_eq!(response.modules[0].versions[0].version, "0.3.12");
    }
}
