//! GitHub REST API client.
//!
//! Covers the four endpoints Pinion consumes:
//! - `GET /repos/{owner}/{repo}/releases/latest`
//! - `GET /repos/{owner}/{repo}/releases`
//! - `GET /repos/{owner}/{repo}/tags`
//! - `GET /repos/{owner}/{repo}/git/ref/tags/{tag}`
//!
//! Each endpoint decodes into its own response struct; a payload missing a
//! required field is a malformed-response error at the decode boundary, not
//! a scattered runtime assertion.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::Cache;
use crate::constants::GITHUB_API_BASE;
use crate::core::Result;

use super::{build_http_client, get_json};

/// One release as returned by the releases endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// The git tag the release points at.
    pub tag_name: String,
    /// Publication timestamp; absent on drafts.
    pub published_at: Option<DateTime<Utc>>,
}

/// One entry from the repository tags list.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoTag {
    /// Tag name (e.g. `v24.4.2`).
    pub name: String,
    /// The commit the tag points at.
    pub commit: CommitRef,
}

/// Commit pointer inside a tag list entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    /// Full 40-character commit SHA.
    pub sha: String,
}

/// Response of the tag-ref lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    /// The object the ref points at.
    pub object: RefObject,
}

/// Object pointer inside a git ref.
#[derive(Debug, Clone, Deserialize)]
pub struct RefObject {
    /// Full 40-character SHA of the tagged object.
    pub sha: String,
}

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    cache: Cache,
    token: Option<String>,
}

impl GithubClient {
    /// Create a client sharing the given response cache.
    pub fn new(cache: Cache, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            cache,
            token,
        })
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The single most recent release of `owner/repo`.
    pub async fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = format!("{GITHUB_API_BASE}/repos/{repo}/releases/latest");
        get_json(&self.http, &self.cache, &url, self.token(), "latest release").await
    }

    /// The release list of `owner/repo`, reverse-chronological.
    pub async fn releases(&self, repo: &str) -> Result<Vec<Release>> {
        let url = format!("{GITHUB_API_BASE}/repos/{repo}/releases");
        get_json(&self.http, &self.cache, &url, self.token(), "release list").await
    }

    /// The tag list of `owner/repo`, most recent first.
    pub async fn tags(&self, repo: &str) -> Result<Vec<RepoTag>> {
        let url = format!("{GITHUB_API_BASE}/repos/{repo}/tags");
        get_json(&self.http, &self.cache, &url, self.token(), "tag list").await
    }

    /// Resolve a tag name to the git ref object it points at.
    pub async fn tag_ref(&self, repo: &str, tag: &str) -> Result<GitRef> {
        let url = format!("{GITHUB_API_BASE}/repos/{repo}/git/ref/tags/{tag}");
        get_json(&self.http, &self.cache, &url, self.token(), &format!("tag {tag}")).await
    }
}
