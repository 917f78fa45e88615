//! Version resolution.
//!
//! [`Resolver::resolve`] takes a classified reference plus an optional
//! constraint and produces a [`ResolvedVersion`]: an immutable pin (commit
//! SHA) together with the human-readable version it corresponds to. The pin
//! always names exactly the upstream object the display version pointed at
//! when resolution happened - there is no silent substitution.
//!
//! Resolution by source kind:
//! - `Local`, `Shallow`, `Archive`, `S3`, `Gcs`, `Mercurial`, `Bitbucket`:
//!   unsupported; the reference passes through unchanged with a logged
//!   notice, never a batch-aborting error.
//! - `Registry`: the registry triple `{namespace, name, provider}` becomes
//!   the canonical GitHub slug `{namespace}/terraform-{provider}-{name}` and
//!   resolution delegates to GitHub.
//! - `GitHub` / `Git` (GitHub host only): an explicit version constraint
//!   resolves to its tag object's commit SHA; a 40- or 7-character hex
//!   constraint is already a pin and costs no network call; otherwise the
//!   latest release wins, optionally filtered by a stability window.
//!
//! All upstream calls go through the rate-limit retry policy in [`retry`].

pub mod retry;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::{ClassifiedSource, SourceKind};
use crate::client::github::GithubClient;
use crate::client::registry::RegistryClient;
use crate::core::{PinionError, Result};

use retry::with_rate_limit_retry;

/// A reference resolved to an immutable pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// Human-readable version the pin corresponds to (e.g. `v4.0.0`).
    pub display_version: String,
    /// Immutable identifier: commit SHA or short hash.
    pub pin: String,
    /// When this resolution happened.
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedVersion {
    fn new(display_version: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            display_version: display_version.into(),
            pin: pin.into(),
            resolved_at: Utc::now(),
        }
    }
}

/// Resolves classified references against their upstream authorities.
#[derive(Debug, Clone)]
pub struct Resolver {
    github: GithubClient,
    registry: RegistryClient,
    stability_days: u32,
}

impl Resolver {
    /// Create a resolver. `stability_days` of zero means "latest release",
    /// not "filter to today".
    #[must_use]
    pub const fn new(github: GithubClient, registry: RegistryClient, stability_days: u32) -> Self {
        Self {
            github,
            registry,
            stability_days,
        }
    }

    /// Resolve a classified source to a pin.
    ///
    /// `constraint` is the version requested by the host file (a module
    /// `version` attribute, for instance); an explicit `?ref=` constraint on
    /// the source itself takes precedence. Returns `Ok(None)` when the
    /// source kind is unsupported or no release qualifies.
    pub async fn resolve(
        &self,
        source: &ClassifiedSource,
        constraint: Option<&str>,
    ) -> Result<Option<ResolvedVersion>> {
        let constraint = source.explicit_constraint.as_deref().or(constraint);

        match source.kind {
            SourceKind::Registry => {
                let (namespace, name, provider) = split_registry_triple(&source.root)?;
                if !self.registry.module_exists(namespace, name, provider).await? {
                    info!(module = %source.root, "not a published registry module, skipping");
                    return Ok(None);
                }
                let slug = format!("{namespace}/terraform-{provider}-{name}");
                self.resolve_github(&slug, constraint).await
            }
            SourceKind::GitHub => {
                let repo = github_repo(&source.root).ok_or_else(|| PinionError::Classification {
                    reference: source.root.clone(),
                    reason: "github source without owner/repo".to_string(),
                })?;
                self.resolve_github(&repo, constraint).await
            }
            SourceKind::Git => {
                let Some(repo) = github_repo(&source.root) else {
                    info!(source = %source.root, "generic git source is not github-hosted, skipping");
                    return Ok(None);
                };
                self.resolve_github(&repo, constraint).await
            }
            kind => {
                info!(source = %source.root, %kind, "source kind cannot be pinned, leaving unchanged");
                Ok(None)
            }
        }
    }

    /// Resolve an `owner/repo` GitHub slug to a pin.
    pub async fn resolve_github(
        &self,
        repo: &str,
        constraint: Option<&str>,
    ) -> Result<Option<ResolvedVersion>> {
        if let Some(constraint) = constraint {
            let exact = strip_constraint_operators(constraint);

            if looks_like_version(exact) {
                let sha = self.tag_sha(repo, exact).await?;
                return Ok(Some(ResolvedVersion::new(exact, sha)));
            }

            if is_commit_hash(exact) {
                // Already pinned; no network call.
                return Ok(Some(ResolvedVersion::new(exact, exact)));
            }

            return Err(PinionError::InvalidConstraint {
                constraint: constraint.to_string(),
            });
        }

        let Some(tag) = self.select_release_tag(repo).await? else {
            return Ok(None);
        };

        let sha = self.tag_sha(repo, &tag).await?;
        Ok(Some(ResolvedVersion::new(tag, sha)))
    }

    /// Pick the release tag to pin: the most recent release, or with a
    /// stability window the first release older than `now - window`.
    async fn select_release_tag(&self, repo: &str) -> Result<Option<String>> {
        if self.stability_days == 0 {
            let release =
                with_rate_limit_retry("api.github.com", || self.github.latest_release(repo))
                    .await?;
            return Ok(Some(release.tag_name));
        }

        let releases =
            with_rate_limit_retry("api.github.com", || self.github.releases(repo)).await?;
        let limit = Utc::now() - chrono::Duration::days(i64::from(self.stability_days));

        // The list is reverse-chronological; the first qualifying release is
        // the newest one older than the window.
        for release in releases {
            match release.published_at {
                Some(published) if published < limit => {
                    debug!(repo, tag = %release.tag_name, %published, "release clears stability window");
                    return Ok(Some(release.tag_name));
                }
                _ => {}
            }
        }

        info!(repo, days = self.stability_days, "no release clears the stability window");
        Ok(None)
    }

    /// Convert a tag name to the commit SHA it points at.
    ///
    /// Tolerates truncated two-part tags: a 404 on `X.Y` is retried once as
    /// `X.Y.0`.
    pub async fn tag_sha(&self, repo: &str, tag: &str) -> Result<String> {
        let lookup = with_rate_limit_retry("api.github.com", || self.github.tag_ref(repo, tag)).await;

        match lookup {
            Ok(git_ref) => Ok(git_ref.object.sha),
            Err(e) if e.is_not_found() => {
                if let Some(padded) = pad_two_part_tag(tag) {
                    warn!(repo, tag, padded, "tag not found, retrying with padded patch version");
                    let git_ref = with_rate_limit_retry("api.github.com", || {
                        self.github.tag_ref(repo, &padded)
                    })
                    .await?;
                    return Ok(git_ref.object.sha);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Latest tag of a repository and the commit it points at; used for
    /// pre-commit hooks, which pin tags rather than releases.
    pub async fn latest_tag(&self, repo: &str) -> Result<Option<ResolvedVersion>> {
        let tags = with_rate_limit_retry("api.github.com", || self.github.tags(repo)).await?;
        Ok(tags.into_iter().next().map(|tag| ResolvedVersion::new(tag.name, tag.commit.sha)))
    }

    /// Latest non-prerelease version of a Terraform provider.
    pub async fn latest_provider_version(
        &self,
        namespace: &str,
        provider_type: &str,
    ) -> Result<Option<String>> {
        let response = with_rate_limit_retry("registry.terraform.io", || {
            self.registry.provider_versions(namespace, provider_type)
        })
        .await?;

        let mut latest: Option<semver::Version> = None;
        for entry in response.versions {
            let Ok(parsed) = semver::Version::parse(entry.version.trim_start_matches('v')) else {
                continue;
            };
            if !parsed.pre.is_empty() {
                continue;
            }
            if latest.as_ref().is_none_or(|current| parsed > *current) {
                latest = Some(parsed);
            }
        }

        Ok(latest.map(|v| v.to_string()))
    }
}

/// Render the pinned Terraform source string for a resolved module.
///
/// Registry and GitHub sources canonicalize to
/// `git::github.com/{owner}/{repo}?ref={pin}`; git sources keep their
/// original URL. A subdirectory is re-attached with the `//` marker.
#[must_use]
pub fn pinned_module_source(source: &ClassifiedSource, resolved: &ResolvedVersion) -> String {
    let root = match source.kind {
        SourceKind::Git => source.root.clone(),
        SourceKind::GitHub => format!("github.com/{}", github_repo(&source.root).unwrap_or_default()),
        SourceKind::Registry => {
            match split_registry_triple(&source.root) {
                Ok((namespace, name, provider)) => {
                    format!("github.com/{namespace}/terraform-{provider}-{name}")
                }
                Err(_) => source.root.clone(),
            }
        }
        _ => source.root.clone(),
    };

    match &source.subdirectory {
        Some(subdirectory) => format!("git::{root}//{subdirectory}?ref={}", resolved.pin),
        None => format!("git::{root}?ref={}", resolved.pin),
    }
}

/// Split a registry triple `namespace/name/provider`.
fn split_registry_triple(root: &str) -> Result<(&str, &str, &str)> {
    let mut parts = root.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(name), Some(provider), None) => Ok((namespace, name, provider)),
        _ => Err(PinionError::Classification {
            reference: root.to_string(),
            reason: "registry source must be namespace/name/provider".to_string(),
        }),
    }
}

/// Extract `owner/repo` from a github.com URL or slug.
pub(crate) fn github_repo(root: &str) -> Option<String> {
    let after_host = root.split("github.com/").nth(1)?;
    let repo = after_host.split(".git").next().unwrap_or(after_host);
    let repo = repo.trim_end_matches('/');
    if repo.splitn(2, '/').count() == 2 {
        Some(repo.to_string())
    } else {
        None
    }
}

/// Strip comparison operators (`~>`, `>=`, ...) from a constraint, treating
/// the remainder as an exact version.
fn strip_constraint_operators(constraint: &str) -> &str {
    constraint
        .trim_start_matches("~>")
        .trim_start_matches(">=")
        .trim_start_matches("<=")
        .trim_start_matches('>')
        .trim_start_matches('<')
        .trim_start_matches('=')
        .trim()
}

/// Whether a constraint is version-shaped: `v`-prefixed or digits with a
/// dot. Two-part forms like `1.2` count; the tag lookup pads them on a 404.
fn looks_like_version(constraint: &str) -> bool {
    let body = constraint.strip_prefix('v').unwrap_or(constraint);
    let mut chars = body.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_digit()) && body.contains('.')
}

/// Whether a constraint is a 40- or 7-character hex commit hash.
pub(crate) fn is_commit_hash(constraint: &str) -> bool {
    (constraint.len() == 40 || constraint.len() == 7)
        && constraint.chars().all(|c| c.is_ascii_hexdigit())
}

/// Pad a two-part numeric tag `X.Y` (optionally `v`-prefixed) to `X.Y.0`.
fn pad_two_part_tag(tag: &str) -> Option<String> {
    let body = tag.strip_prefix('v').unwrap_or(tag);
    let parts: Vec<&str> = body.split('.').collect();
    if parts.len() == 2 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        return Some(format!("{tag}.0"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_triple_canonicalizes_to_github_slug() {
        let (namespace, name, provider) = split_registry_triple("jameswoolfenden/http/ip").unwrap();
        assert_eq!(
            format!("{namespace}/terraform-{provider}-{name}"),
            "jameswoolfenden/terraform-ip-http"
        );
    }

    #[test]
    fn malformed_registry_triple_is_an_error() {
        assert!(split_registry_triple("only/two").is_err());
        assert!(split_registry_triple("a/b/c/d").is_err());
    }

    #[test]
    fn github_repo_extraction() {
        assert_eq!(
            github_repo("https://github.com/owner/repo.git").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            github_repo("github.com/owner/repo").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(github_repo("https://example.com/owner/repo.git"), None);
    }

    #[test]
    fn constraint_operators_are_stripped() {
        assert_eq!(strip_constraint_operators("~> 5.31"), "5.31");
        assert_eq!(strip_constraint_operators(">=1.2.0"), "1.2.0");
        assert_eq!(strip_constraint_operators("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn version_and_hash_shapes() {
        assert!(looks_like_version("v1.2.3"));
        assert!(looks_like_version("1.2"));
        assert!(!looks_like_version("main"));
        assert!(!looks_like_version("deadbee"));

        assert!(is_commit_hash("deadbee"));
        assert!(is_commit_hash("1e31de5234b9f8995739874a8ce0492dc87873e2"));
        assert!(!is_commit_hash("v1.2.3"));
        assert!(!is_commit_hash("deadbeef"));
    }

    #[test]
    fn two_part_tags_pad_to_patch_zero() {
        assert_eq!(pad_two_part_tag("v1.2").as_deref(), Some("v1.2.0"));
        assert_eq!(pad_two_part_tag("1.2").as_deref(), Some("1.2.0"));
        assert_eq!(pad_two_part_tag("v1.2.3"), None);
        assert_eq!(pad_two_part_tag("v1.x"), None);
    }

    #[test]
    fn pinned_source_for_git_keeps_original_url() {
        let source = ClassifiedSource {
            kind: SourceKind::Git,
            root: "https://github.com/owner/repo.git".to_string(),
            subdirectory: None,
            explicit_constraint: None,
        };
        let resolved = ResolvedVersion::new("v1.0.0", "abc1234");
        assert_eq!(
            pinned_module_source(&source, &resolved),
            "git::https://github.com/owner/repo.git?ref=abc1234"
        );
    }

    #[test]
    fn pinned_source_for_registry_canonicalizes_and_keeps_subdirectory() {
        let source = ClassifiedSource {
            kind: SourceKind::Registry,
            root: "jameswoolfenden/http/ip".to_string(),
            subdirectory: Some("modules/endpoint".to_string()),
            explicit_constraint: None,
        };
        let resolved = ResolvedVersion::new("v1.0.0", "abc1234");
        assert_eq!(
            pinned_module_source(&source, &resolved),
            "git::github.com/jameswoolfenden/terraform-ip-http//modules/endpoint?ref=abc1234"
        );
    }
}
