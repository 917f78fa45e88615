//! Reference classification.
//!
//! [`classify`] maps a raw dependency-reference string to exactly one
//! source-authority type via an **ordered** rule chain. The order is
//! load-bearing: reference strings can match several surface patterns (a
//! `git::` URL also contains `//`, a registry triple is also `/`-separated),
//! and earlier rules take precedence.
//!
//! Rule order:
//! 1. Existing local filesystem path -> [`SourceKind::Local`]
//! 2. Contains `bitbucket.org` -> [`SourceKind::Bitbucket`]
//! 3. Contains `s3::` / `gcs::` -> [`SourceKind::S3`] / [`SourceKind::Gcs`]
//! 4. Contains `.zip` or `archive=` -> [`SourceKind::Archive`]
//! 5. Exactly three `/`-separated segments without `git::`/`https:` ->
//!    [`SourceKind::GitHub`] when it names `github.com`, else
//!    [`SourceKind::Registry`]
//! 6. Contains `depth=` -> [`SourceKind::Shallow`]
//! 7. Contains `git::` -> [`SourceKind::Git`]
//! 8. Contains `hg::` -> [`SourceKind::Mercurial`]
//! 9. Contains a `//` sub-directory marker -> classify the prefix and attach
//!    the remainder as `subdirectory` (bounded loop, not recursion)
//! 10. Otherwise: path-shaped strings classify as a missing local path,
//!     anything else is unknown
//!
//! Classification is pure apart from the local-path existence probe, and
//! total: `Unknown` (with an error) is the only fallback, reached after all
//! positive rules fail.

use std::path::Path;

use crate::constants::MAX_CLASSIFY_DEPTH;
use crate::core::{PinionError, Result};

/// The source-authority type of a classified reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Path on the local filesystem.
    Local,
    /// Generic `git::` source.
    Git,
    /// GitHub-hosted repository.
    GitHub,
    /// Terraform Registry module triple.
    Registry,
    /// Bitbucket-hosted repository.
    Bitbucket,
    /// Zip or other packaged archive.
    Archive,
    /// S3-backed source.
    S3,
    /// GCS-backed source.
    Gcs,
    /// Mercurial repository.
    Mercurial,
    /// Shallow git clone (`depth=` parameter).
    Shallow,
    /// No positive rule matched.
    Unknown,
}

impl SourceKind {
    /// Kinds Pinion can resolve to a pin. Everything else passes through
    /// unchanged with a logged notice.
    #[must_use]
    pub const fn is_resolvable(self) -> bool {
        matches!(self, Self::Git | Self::GitHub | Self::Registry)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Git => "git",
            Self::GitHub => "github",
            Self::Registry => "registry",
            Self::Bitbucket => "bitbucket",
            Self::Archive => "archive",
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::Mercurial => "mercurial",
            Self::Shallow => "shallow",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A reference string resolved to its source authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSource {
    /// Which authority the reference belongs to.
    pub kind: SourceKind,
    /// The reference with scheme prefixes, `?ref=` suffixes, and
    /// sub-directory markers stripped.
    pub root: String,
    /// Sub-directory portion after a `//` marker, if any.
    pub subdirectory: Option<String>,
    /// Version constraint carried in the reference itself (`?ref=<value>`).
    pub explicit_constraint: Option<String>,
}

/// Classify a raw reference string.
///
/// Deterministic and total: the same input always yields the same
/// classification, and every input yields either a positive kind or an
/// error.
pub fn classify(reference: &str) -> Result<ClassifiedSource> {
    let mut current = reference.to_string();
    let mut subdirectory: Option<String> = None;

    // The `//` rule re-enters the chain on the truncated prefix; an explicit
    // depth guard bounds that on malformed input.
    for _ in 0..MAX_CLASSIFY_DEPTH {
        if let Some(kind) = match_positive_rules(&current) {
            return Ok(build(kind, &current, subdirectory));
        }

        if let Some((prefix, rest)) = split_subdirectory_marker(&current) {
            subdirectory = match subdirectory {
                Some(existing) => Some(format!("{rest}/{existing}")),
                None => Some(rest),
            };
            current = prefix;
            continue;
        }

        break;
    }

    // Positive rules exhausted. A path-shaped string is a missing local
    // path; anything else is unknown.
    if looks_like_path(&current) {
        return Err(PinionError::LocalPathNotFound {
            path: reference.to_string(),
        });
    }

    Err(PinionError::Classification {
        reference: reference.to_string(),
        reason: "matched no source rule".to_string(),
    })
}

fn match_positive_rules(reference: &str) -> Option<SourceKind> {
    if Path::new(reference).exists() {
        return Some(SourceKind::Local);
    }

    if reference.contains("bitbucket.org") {
        return Some(SourceKind::Bitbucket);
    }

    if reference.contains("s3::") {
        return Some(SourceKind::S3);
    }

    if reference.contains("gcs::") {
        return Some(SourceKind::Gcs);
    }

    if reference.contains(".zip") || reference.contains("archive=") {
        return Some(SourceKind::Archive);
    }

    let segments = reference.split('/').count();
    if segments == 3 && !reference.contains("git::") && !reference.contains("https:") {
        if reference.contains("github.com") {
            return Some(SourceKind::GitHub);
        }
        return Some(SourceKind::Registry);
    }

    if reference.contains("depth=") {
        return Some(SourceKind::Shallow);
    }

    if reference.contains("git::") {
        return Some(SourceKind::Git);
    }

    if reference.contains("hg::") {
        return Some(SourceKind::Mercurial);
    }

    None
}

fn build(kind: SourceKind, reference: &str, subdirectory: Option<String>) -> ClassifiedSource {
    let mut root = reference.to_string();
    let mut explicit_constraint = None;
    let mut subdirectory = subdirectory;

    if kind == SourceKind::Git {
        root = root.strip_prefix("git::").unwrap_or(&root).to_string();

        if let Some((head, constraint)) = root.split_once("?ref=") {
            if !constraint.is_empty() {
                explicit_constraint = Some(constraint.to_string());
            }
            root = head.to_string();
        }
    }

    // A positive rule can fire on a string that still carries a `//`
    // sub-directory marker after its scheme (scenario: git::https URL with a
    // module subpath).
    if subdirectory.is_none() {
        if let Some((prefix, rest)) = split_subdirectory_marker(&root) {
            root = prefix;
            subdirectory = Some(rest);
        }
    }

    ClassifiedSource {
        kind,
        root,
        subdirectory,
        explicit_constraint,
    }
}

/// Split on the first `//` that is a sub-directory marker, skipping the
/// `://` of a URL scheme.
fn split_subdirectory_marker(reference: &str) -> Option<(String, String)> {
    let scan_from = match reference.find("://") {
        Some(idx) => idx + 3,
        None => 0,
    };

    let rest = &reference[scan_from..];
    let marker = rest.find("//")?;
    let split_at = scan_from + marker;

    Some((
        reference[..split_at].to_string(),
        reference[split_at + 2..].to_string(),
    ))
}

/// Whether a string that matched nothing looks like a filesystem path
/// rather than a remote locator.
fn looks_like_path(reference: &str) -> bool {
    !reference.contains("::")
        && !reference.contains("://")
        && !reference.contains('?')
        && !reference.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_local_path_wins_over_everything() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap();
        let source = classify(path).unwrap();
        assert_eq!(source.kind, SourceKind::Local);
    }

    #[test]
    fn bitbucket_host() {
        let source = classify("bitbucket.org/hashicorp/terraform-consul-aws").unwrap();
        assert_eq!(source.kind, SourceKind::Bitbucket);
    }

    #[test]
    fn object_store_schemes() {
        assert_eq!(
            classify("s3::https://s3-eu-west-1.amazonaws.com/bucket/vpc.zip").unwrap().kind,
            SourceKind::S3
        );
        assert_eq!(
            classify("gcs::https://www.googleapis.com/storage/v1/modules/foo").unwrap().kind,
            SourceKind::Gcs
        );
    }

    #[test]
    fn archives() {
        assert_eq!(
            classify("https://example.com/vpc-module.zip").unwrap().kind,
            SourceKind::Archive
        );
        assert_eq!(
            classify("https://example.com/vpc-module?archive=tar.gz").unwrap().kind,
            SourceKind::Archive
        );
    }

    #[test]
    fn registry_triple() {
        let source = classify("jameswoolfenden/http/ip").unwrap();
        assert_eq!(source.kind, SourceKind::Registry);
        assert_eq!(source.root, "jameswoolfenden/http/ip");
        assert_eq!(source.subdirectory, None);
    }

    #[test]
    fn github_triple() {
        let source = classify("github.com/jameswoolfenden/terraform-aws-sqs").unwrap();
        assert_eq!(source.kind, SourceKind::GitHub);
    }

    #[test]
    fn shallow_clone_marker() {
        assert_eq!(
            classify("git::https://example.com/vpc.git?depth=1").unwrap().kind,
            SourceKind::Shallow
        );
    }

    #[test]
    fn git_rule_fires_before_subdirectory_rule() {
        let source = classify("git::https://example.com/network.git//modules/vpc").unwrap();
        assert_eq!(source.kind, SourceKind::Git);
        assert_eq!(source.root, "https://example.com/network.git");
        assert_eq!(source.subdirectory.as_deref(), Some("modules/vpc"));
    }

    #[test]
    fn git_ref_extracted_as_explicit_constraint() {
        let source = classify("git::https://github.com/owner/repo.git?ref=v1.2.0").unwrap();
        assert_eq!(source.kind, SourceKind::Git);
        assert_eq!(source.root, "https://github.com/owner/repo.git");
        assert_eq!(source.explicit_constraint.as_deref(), Some("v1.2.0"));
    }

    #[test]
    fn mercurial_scheme() {
        assert_eq!(
            classify("hg::http://example.com/vpc.hg").unwrap().kind,
            SourceKind::Mercurial
        );
    }

    #[test]
    fn registry_triple_with_subdirectory() {
        let source = classify("jameswoolfenden/http/ip//modules/endpoint").unwrap();
        assert_eq!(source.kind, SourceKind::Registry);
        assert_eq!(source.root, "jameswoolfenden/http/ip");
        assert_eq!(source.subdirectory.as_deref(), Some("modules/endpoint"));
    }

    #[test]
    fn missing_path_reports_local_not_found() {
        let err = classify("./does-not-exist").unwrap_err();
        assert!(matches!(err, PinionError::LocalPathNotFound { .. }));
    }

    #[test]
    fn three_segment_missing_path_still_matches_the_segment_rule() {
        // Rule order is load-bearing: the segment-count rule fires before
        // the missing-local-path fallback ever gets a say.
        let source = classify("./modules/does-not-exist").unwrap();
        assert_eq!(source.kind, SourceKind::Registry);
    }

    #[test]
    fn unclassifiable_reference_is_unknown() {
        let err = classify("wat::scheme?x=1").unwrap_err();
        assert!(matches!(err, PinionError::Classification { .. }));
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify("jameswoolfenden/http/ip").unwrap();
        let b = classify("jameswoolfenden/http/ip").unwrap();
        assert_eq!(a, b);
    }
}
