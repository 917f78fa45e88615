//! Rewrite engine.
//!
//! A [`RewriteOperation`] holds a file's original content and the candidate
//! content being built up by an orchestrator. Substitutions mutate only the
//! candidate; the file on disk is untouched until [`RewriteOperation::commit`],
//! which writes the complete candidate in one shot - a failure mid-pass can
//! never leave a half-rewritten file behind.
//!
//! A unified diff is printed whenever the candidate differs from the
//! original, dry-run or not. The write itself is gated: dry-run and
//! unchanged content both skip it.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info};

use crate::core::{PinionError, Result};

/// Terminal state of a single file's rewrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The candidate differed and was written to disk.
    Written,
    /// The candidate differed but dry-run suppressed the write.
    SkippedDryRun,
    /// Nothing changed; the file was left alone.
    SkippedNoChange,
}

/// An in-memory rewrite of one file.
#[derive(Debug, Clone)]
pub struct RewriteOperation {
    path: PathBuf,
    original: String,
    candidate: String,
}

impl RewriteOperation {
    /// Load a file's content as both original and candidate.
    pub fn load(path: &Path) -> Result<Self> {
        let original = fs::read_to_string(path).map_err(|e| PinionError::ParseFile {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_content(path, original))
    }

    /// Build an operation from already-read content.
    #[must_use]
    pub fn from_content(path: &Path, original: String) -> Self {
        Self {
            path: path.to_path_buf(),
            candidate: original.clone(),
            original,
        }
    }

    /// Path of the file being rewritten.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current candidate content.
    #[must_use]
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// Replace every occurrence of `from` in the candidate with `to`.
    ///
    /// The span is exact: nothing outside the matched substring is touched,
    /// so surrounding indentation, quoting, and comments survive.
    pub fn replace_exact(&mut self, from: &str, to: &str) {
        if from == to || !self.candidate.contains(from) {
            return;
        }
        debug!(file = %self.path.display(), from, to, "substituting reference");
        self.candidate = self.candidate.replace(from, to);
    }

    /// Replace the whole candidate. Used by the HCL path, where the mutation
    /// happens inside a parsed document rather than on raw text.
    pub fn set_candidate(&mut self, candidate: String) {
        self.candidate = candidate;
    }

    /// Whether the candidate differs from the original.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.candidate != self.original
    }

    /// Print a unified diff of original vs candidate to stdout.
    pub fn print_diff(&self) {
        if !self.changed() {
            return;
        }

        println!("{}", self.path.display().to_string().bold());
        let diff = TextDiff::from_lines(&self.original, &self.candidate);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete => print!("{}", format!("-{change}").red()),
                ChangeTag::Insert => print!("{}", format!("+{change}").green()),
                ChangeTag::Equal => {}
            }
        }
        println!();
    }

    /// Persist the candidate, printing the diff first. Returns the terminal
    /// state of the pass.
    pub fn commit(&self, dry_run: bool) -> Result<FileOutcome> {
        if !self.changed() {
            debug!(file = %self.path.display(), "no changes");
            return Ok(FileOutcome::SkippedNoChange);
        }

        self.print_diff();

        if dry_run {
            info!(file = %self.path.display(), "dry run, not writing");
            return Ok(FileOutcome::SkippedDryRun);
        }

        fs::write(&self.path, &self.candidate).map_err(|e| PinionError::Rewrite {
            file: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(file = %self.path.display(), "updated");
        Ok(FileOutcome::Written)
    }
}
