//! Per-ecosystem orchestrators.
//!
//! Each submodule drives one file format through the same pass:
//! discover files, extract references, classify, resolve, rewrite, then
//! diff and conditionally persist. A failure in one file is logged and
//! never aborts the rest of a directory batch; within a file, the
//! continue-on-error switch decides whether one bad reference skips or
//! aborts that file.

pub mod actions;
pub mod ci;
pub mod modules;
pub mod precommit;
pub mod providers;

use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::{error, warn};
use walkdir::WalkDir;

use crate::core::{PinionError, Result};
use crate::rewrite::FileOutcome;

/// Aggregate result of a directory pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Files inspected.
    pub scanned: usize,
    /// Files rewritten on disk.
    pub written: usize,
    /// Files with pending changes suppressed by dry-run.
    pub dry_run: usize,
    /// Files that failed and were skipped.
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Written => self.written += 1,
            FileOutcome::SkippedDryRun => self.dry_run += 1,
            FileOutcome::SkippedNoChange => {}
        }
    }

    /// Print a one-line closing summary.
    pub fn print(&self) {
        let mut parts = vec![format!("{} scanned", self.scanned)];
        if self.written > 0 {
            parts.push(format!("{} updated", self.written).green().to_string());
        }
        if self.dry_run > 0 {
            parts.push(format!("{} pending (dry run)", self.dry_run).yellow().to_string());
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed).red().to_string());
        }
        println!("{}", parts.join(", "));
    }
}

/// Collect the files a pass operates on.
///
/// An explicit `--file` wins and must exist; otherwise the directory is
/// walked, skipping `.git` and `.terraform` trees, keeping paths the
/// filter accepts.
pub fn collect_files(
    file: Option<&Path>,
    directory: &Path,
    filter: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    if let Some(file) = file {
        if !file.is_file() {
            return Err(PinionError::Config {
                message: format!("no such file: {}", file.display()),
            });
        }
        return Ok(vec![file.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !matches!(e.file_name().to_str(), Some(".git" | ".terraform")))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && filter(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Log a per-file failure without aborting the batch.
fn report_file_failure(path: &Path, error: &PinionError) {
    error!(file = %path.display(), %error, "skipping file after failure");
}

/// Handle a per-reference failure: skip it when continue-on-error is set,
/// otherwise propagate and abort the file.
fn handle_reference_failure(
    continue_on_error: bool,
    reference: &str,
    error: PinionError,
) -> Result<()> {
    if continue_on_error {
        warn!(reference, %error, "skipping reference after failure");
        return Ok(());
    }
    Err(error)
}
