//! GitHub Actions workflow pinning.
//!
//! Scans `.github/workflows/*.ya?ml` for `uses:` references and rewrites
//! every mutable tag to the commit SHA of the latest release (or the newest
//! release clearing the stability window), keeping the resolved version as
//! a trailing comment:
//!
//! ```yaml
//! - uses: actions/checkout@1e31de5234b9f8995739874a8ce0492dc87873e2 # v4.0.0
//! ```
//!
//! References already pinned to a commit are left alone.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::core::Result;
use crate::resolve::{Resolver, is_commit_hash};
use crate::rewrite::{FileOutcome, RewriteOperation};

use super::{RunSummary, collect_files, handle_reference_failure, report_file_failure};

static USES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"uses:\s*(\S+)").expect("hardcoded regex"));

/// Pin every workflow file under `directory` (or just `file`).
pub async fn run(
    resolver: &Resolver,
    config: &RunConfig,
    file: Option<&Path>,
    directory: &Path,
) -> Result<RunSummary> {
    let files = collect_files(file, directory, is_workflow_file)?;
    if files.is_empty() {
        info!(directory = %directory.display(), "no workflow files found");
    }

    let mut summary = RunSummary::default();
    for path in &files {
        summary.scanned += 1;
        match process_file(resolver, config, path).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                report_file_failure(path, &e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn process_file(
    resolver: &Resolver,
    config: &RunConfig,
    path: &Path,
) -> Result<FileOutcome> {
    let mut op = RewriteOperation::load(path)?;

    let references: Vec<String> = USES_RE
        .captures_iter(op.candidate())
        .map(|c| c[1].trim_matches(|ch| ch == '"' || ch == '\'').to_string())
        .collect();

    for reference in references {
        let Some((action, current)) = extract(&reference) else {
            debug!(reference, "not a pinnable action reference");
            continue;
        };

        // First two path segments are the API repository; a subpath inside
        // the action reference stays in the rewritten text untouched.
        let repo = match truncate_to_repo(action) {
            Some(repo) => repo,
            None => continue,
        };

        match resolver.resolve_github(&repo, None).await {
            Ok(Some(resolved)) => {
                op.replace_exact(
                    &format!("{action}@{current}"),
                    &format!("{action}@{} # {}", resolved.pin, resolved.display_version),
                );
            }
            Ok(None) => {
                info!(action, "no release clears the stability window, leaving unchanged");
            }
            Err(e) => handle_reference_failure(config.continue_on_error, &reference, e)?,
        }
    }

    op.commit(config.dry_run)
}

/// Split a `uses:` value into action path and mutable ref, filtering out
/// everything that is not pinnable: local workflow paths, docker refs, and
/// references already pinned to a commit.
fn extract(reference: &str) -> Option<(&str, &str)> {
    if reference.contains(".github") || reference.starts_with("./") {
        return None;
    }
    if reference.starts_with("docker://") {
        return None;
    }

    let (action, current) = reference.split_once('@')?;
    if current.is_empty() || is_commit_hash(current) {
        return None;
    }
    Some((action, current))
}

/// First two segments of an action path, i.e. `owner/repo`.
fn truncate_to_repo(action: &str) -> Option<String> {
    let mut segments = action.split('/');
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{owner}/{repo}"))
        }
        _ => None,
    }
}

fn is_workflow_file(path: &Path) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yml" || e == "yaml");
    is_yaml
        && path.components().any(|c| c.as_os_str() == ".github")
        && path.parent().is_some_and(|p| p.ends_with("workflows"))
}
