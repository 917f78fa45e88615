//! Container registry client.
//!
//! Digest retrieval is authority-specific:
//! - **Docker Hub**: two-step - fetch a scoped anonymous bearer token from
//!   the auth service, then request the manifest. The digest comes from the
//!   `Docker-Content-Digest` response header, never computed locally.
//! - **GHCR**: same manifest request, optionally authenticated with the
//!   caller's GitHub token.
//! - **Generic OCI registry**: same manifest request without
//!   registry-specific auth; a 401 is reported distinctly as
//!   authentication-required.
//!
//! Image reference parsing follows the Docker conventions: a registry host
//! is inferred only when the first path segment contains `.`, `:` or equals
//! `localhost`; the default registry is `docker.io`; single-segment Docker
//! Hub repositories get an implicit `library/` prefix; the default tag is
//! `latest`.

use serde::Deserialize;
use tracing::debug;

use crate::core::{PinionError, Result};

use super::build_http_client;

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host (defaults to `docker.io`).
    pub registry: String,
    /// Repository path, including the implicit `library/` prefix for Docker
    /// Hub official images.
    pub repository: String,
    /// Tag (defaults to `latest`).
    pub tag: String,
    /// Existing digest, if the reference was already pinned.
    pub digest: Option<String>,
    /// The reference exactly as it appeared in the source file.
    pub original: String,
}

impl ImageReference {
    /// Parse an image reference string into its components.
    #[must_use]
    pub fn parse(image: &str) -> Self {
        let original = image.to_string();
        let mut remainder = image;

        // An existing @sha256: digest is stripped before further parsing.
        let mut digest = None;
        if let Some((head, tail)) = remainder.split_once('@') {
            digest = Some(tail.to_string());
            remainder = head;
        }

        let (registry, repo_tag) = match remainder.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest)
            }
            _ => ("docker.io".to_string(), remainder),
        };

        let (mut repository, tag) = match repo_tag.rsplit_once(':') {
            Some((repo, tag)) => (repo.to_string(), tag.to_string()),
            None => (repo_tag.to_string(), "latest".to_string()),
        };

        if registry == "docker.io" && !repository.contains('/') {
            repository = format!("library/{repository}");
        }

        Self {
            registry,
            repository,
            tag,
            digest,
            original,
        }
    }

    /// Render the pinned form `<repo>@<digest> # <tag>`.
    ///
    /// For Docker Hub images the `docker.io` registry and `library/` prefix
    /// are elided so the rewritten text stays as short as the original.
    #[must_use]
    pub fn with_digest(&self, digest: &str) -> String {
        let repo = if self.registry == "docker.io" {
            self.repository.strip_prefix("library/").unwrap_or(&self.repository).to_string()
        } else {
            format!("{}/{}", self.registry, self.repository)
        };

        format!("{repo}@{digest} # {}", self.tag)
    }
}

#[derive(Debug, Deserialize)]
struct DockerHubToken {
    token: String,
}

/// Client for container registry manifest lookups.
#[derive(Debug, Clone)]
pub struct OciClient {
    http: reqwest::Client,
    github_token: Option<String>,
}

impl OciClient {
    /// Create a client. The GitHub token, when present, authenticates GHCR
    /// manifest requests.
    pub fn new(github_token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            github_token,
        })
    }

    /// Retrieve the `sha256:` digest for an image reference, dispatching on
    /// the registry authority.
    pub async fn digest(&self, image: &ImageReference) -> Result<String> {
        match image.registry.as_str() {
            "docker.io" | "registry.hub.docker.com" => self.docker_hub_digest(image).await,
            "ghcr.io" => self.ghcr_digest(image).await,
            _ => self.generic_digest(image).await,
        }
    }

    async fn docker_hub_digest(&self, image: &ImageReference) -> Result<String> {
        let token_url = format!(
            "https://auth.docker.io/token?service=registry.docker.io&scope=repository:{}:pull",
            image.repository
        );
        let response =
            self.http.get(&token_url).send().await.map_err(|e| PinionError::Network {
                url: token_url.clone(),
                reason: e.to_string(),
            })?;

        // A throttled or failing auth service must surface as a status
        // error (retryable when rate-limited), not as a decode failure.
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(PinionError::ApiStatus {
                url: token_url,
                status,
                body,
            });
        }

        let token: DockerHubToken =
            response.json().await.map_err(|e| PinionError::MalformedResponse {
                url: token_url,
                reason: format!("token response: {e}"),
            })?;

        let manifest_url = format!(
            "https://registry-1.docker.io/v2/{}/manifests/{}",
            image.repository, image.tag
        );
        self.manifest_digest(&manifest_url, Some(&token.token), &image.registry).await
    }

    async fn ghcr_digest(&self, image: &ImageReference) -> Result<String> {
        let manifest_url =
            format!("https://ghcr.io/v2/{}/manifests/{}", image.repository, image.tag);
        self.manifest_digest(&manifest_url, self.github_token.as_deref(), &image.registry).await
    }

    async fn generic_digest(&self, image: &ImageReference) -> Result<String> {
        let manifest_url = format!(
            "https://{}/v2/{}/manifests/{}",
            image.registry, image.repository, image.tag
        );
        self.manifest_digest(&manifest_url, None, &image.registry).await
    }

    /// Request a manifest and read the digest from the
    /// `Docker-Content-Digest` header.
    async fn manifest_digest(
        &self,
        url: &str,
        bearer: Option<&str>,
        registry: &str,
    ) -> Result<String> {
        let mut request = self.http.get(url).header("Accept", MANIFEST_ACCEPT);
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request.send().await.map_err(|e| PinionError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status == 401 {
            return Err(PinionError::RegistryAuthRequired {
                registry: registry.to_string(),
            });
        }
        if status == 404 {
            return Err(PinionError::NotFound {
                object: "manifest".to_string(),
                url: url.to_string(),
            });
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(PinionError::ApiStatus {
                url: url.to_string(),
                status,
                body,
            });
        }

        let digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| PinionError::MalformedResponse {
                url: url.to_string(),
                reason: "no Docker-Content-Digest header in manifest response".to_string(),
            })?;

        debug!(url, digest, "resolved manifest digest");
        Ok(digest)
    }
}
