//! Pre-commit hook pinning.
//!
//! Reads `.pre-commit-config.yaml`, resolves each GitHub-hosted repo's
//! latest tag, and rewrites the `rev:` field to the tag's commit SHA with
//! the tag kept as a comment. Repos that cannot be resolved (non-GitHub
//! hosts, `local`/`meta` entries, repos without tags) are retained
//! unmodified.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::core::{PinionError, Result};
use crate::resolve::{Resolver, github_repo, is_commit_hash};
use crate::rewrite::{FileOutcome, RewriteOperation};

use super::{RunSummary, collect_files, handle_reference_failure, report_file_failure};

#[derive(Debug, Deserialize)]
struct PreCommitConfig {
    #[serde(default)]
    repos: Vec<RepoEntry>,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    repo: String,
    #[serde(default)]
    rev: Option<String>,
}

/// Pin every `.pre-commit-config.yaml` under `directory` (or just `file`).
pub async fn run(
    resolver: &Resolver,
    config: &RunConfig,
    file: Option<&Path>,
    directory: &Path,
) -> Result<RunSummary> {
    let files = collect_files(file, directory, |p| {
        p.file_name().and_then(|n| n.to_str()) == Some(".pre-commit-config.yaml")
    })?;
    if files.is_empty() {
        info!(directory = %directory.display(), "no pre-commit configuration found");
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

    let parsed: PreCommitConfig =
        serde_yaml::from_str(op.candidate()).map_err(|e| PinionError::ParseFile {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    for entry in parsed.repos {
        let Some(rev) = entry.rev.as_deref() else {
            continue;
        };
        if is_commit_hash(rev) {
            debug!(repo = %entry.repo, "rev already pinned to a commit");
            continue;
        }
        let Some(repo) = github_repo(&entry.repo) else {
            info!(repo = %entry.repo, "not a github-hosted hook repo, leaving unchanged");
            continue;
        };

        match resolver.latest_tag(&repo).await {
            Ok(Some(resolved)) => {
                apply_rev(&mut op, rev, &resolved.pin, &resolved.display_version);
            }
            Ok(None) => {
                info!(repo = %entry.repo, "repo has no tags, leaving unchanged");
            }
            Err(e) => handle_reference_failure(config.continue_on_error, &entry.repo, e)?,
        }
    }

    op.commit(config.dry_run)
}

/// Rewrite a `rev:` line, tolerating the quoting styles YAML allows.
fn apply_rev(op: &mut RewriteOperation, old: &str, sha: &str, tag: &str) {
    let replacement = format!("rev: {sha} # {tag}");
    for pattern in [
        format!("rev: {old}"),
        format!("rev: \"{old}\""),
        format!("rev: '{old}'"),
    ] {
        op.replace_exact(&pattern, &replacement);
    }
}
