//! Terraform module source pinning.
//!
//! Walks `.tf` files, classifies every `module` block's `source`, and
//! rewrites resolvable sources to the pinned git form:
//!
//! ```hcl
//! module "ip" {
//!   source = "git::github.com/jameswoolfenden/terraform-ip-http?ref=<sha> # 0.3.12"
//! }
//! ```
//!
//! The `version` attribute is removed (it is meaningless on a git source)
//! and the resolved version survives as a comment inside the source string.
//! Mutation happens on the parsed document, so every other token in the
//! file - comments, spacing, unrelated blocks - is preserved byte-for-byte.

use std::path::Path;

use hcl_edit::expr::Expression;
use hcl_edit::repr::{Decorate, Decorated};
use hcl_edit::structure::{Block, Body};
use tracing::{debug, info};

use crate::classify::classify;
use crate::config::RunConfig;
use crate::core::{PinionError, Result};
use crate::resolve::{Resolver, is_commit_hash, pinned_module_source};
use crate::rewrite::{FileOutcome, RewriteOperation};

use super::{RunSummary, collect_files, handle_reference_failure, report_file_failure};

/// Pin module sources in every `.tf` file under `directory` (or just `file`).
pub async fn run(
    resolver: &Resolver,
    config: &RunConfig,
    file: Option<&Path>,
    directory: &Path,
) -> Result<RunSummary> {
    let files = collect_files(file, directory, is_terraform_file)?;
    if files.is_empty() {
        info!(directory = %directory.display(), "no terraform files found");
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
    let mut body: Body = parse_body(path, op.candidate())?;

    let mut mutated = false;
    for mut structure in body.iter_mut() {
        let Some(block) = structure.as_block_mut() else {
            continue;
        };
        if block.ident.as_str() != "module" {
            continue;
        }
        if pin_module_block(resolver, config, block).await? {
            mutated = true;
        }
    }

    if mutated {
        op.set_candidate(body.to_string());
    }
    op.commit(config.dry_run)
}

async fn pin_module_block(
    resolver: &Resolver,
    config: &RunConfig,
    block: &mut Block,
) -> Result<bool> {
    let Some(source_value) = string_attribute(&block.body, "source") else {
        return Ok(false);
    };
    let version_value = string_attribute(&block.body, "version");

    // A previous run leaves the resolved version as a comment inside the
    // source string; strip it before classifying.
    let reference = strip_embedded_comment(&source_value);

    let classified = match classify(reference) {
        Ok(classified) => classified,
        Err(e) => {
            handle_reference_failure(config.continue_on_error, reference, e)?;
            return Ok(false);
        }
    };

    if classified.explicit_constraint.as_deref().is_some_and(is_commit_hash) {
        debug!(source = reference, "source already pinned to a commit");
        return Ok(false);
    }

    let resolved = match resolver.resolve(&classified, version_value.as_deref()).await {
        Ok(Some(resolved)) => resolved,
        Ok(None) => return Ok(false),
        Err(e) => {
            handle_reference_failure(config.continue_on_error, reference, e)?;
            return Ok(false);
        }
    };

    let pinned = format!(
        "{} # {}",
        pinned_module_source(&classified, &resolved),
        resolved.display_version
    );
    if pinned == source_value {
        return Ok(false);
    }

    apply_pin(block, &pinned);
    Ok(true)
}

/// Remove the `version` attribute and point `source` at the pinned form.
fn apply_pin(block: &mut Block, pinned: &str) {
    block.body.remove_attribute("version");
    if let Some(mut attr) = block.body.get_attribute_mut("source") {
        *attr.value_mut() = string_expression(pinned);
    }
}

fn parse_body(path: &Path, content: &str) -> Result<Body> {
    content.parse().map_err(|e: hcl_edit::parser::Error| PinionError::ParseFile {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn string_attribute(body: &Body, name: &str) -> Option<String> {
    match body.get_attribute(name).map(|attr| &attr.value) {
        Some(Expression::String(s)) => Some(s.value().clone()),
        _ => None,
    }
}

fn string_expression(value: &str) -> Expression {
    let mut expr = Expression::String(Decorated::new(value.to_string()));
    expr.decor_mut().set_prefix(" ");
    expr
}

fn strip_embedded_comment(source: &str) -> &str {
    source.split(" #").next().unwrap_or(source).trim_end()
}

fn is_terraform_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("tf")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_TF: &str = r#"# networking
module "ip" {
  source  = "jameswoolfenden/http/ip"
  version = "0.3.12"
}

resource "aws_sqs_queue" "q" {
  name = "queue"
}
"#;

    #[test]
    fn apply_pin_removes_version_and_preserves_the_rest() {
        let mut body: Body = MAIN_TF.parse().unwrap();
        for mut structure in body.iter_mut() {
            if let Some(block) = structure.as_block_mut() {
                if block.ident.as_str() == "module" {
                    apply_pin(
                        block,
                        "git::github.com/jameswoolfenden/terraform-ip-http?ref=abc1234 # 0.3.12",
                    );
                }
            }
        }

        let out = body.to_string();
        assert!(out.contains(
            "source  = \"git::github.com/jameswoolfenden/terraform-ip-http?ref=abc1234 # 0.3.12\""
        ));
        assert!(!out.contains("version = \"0.3.12\""));
        assert!(out.contains("# networking"));
        assert!(out.contains("resource \"aws_sqs_queue\" \"q\""));
    }

    #[test]
    fn string_attribute_reads_only_string_expressions() {
        let body: Body = "source = \"a/b/c\"\ncount = 2\n".parse().unwrap();
        assert_eq!(string_attribute(&body, "source").as_deref(), Some("a/b/c"));
        assert_eq!(string_attribute(&body, "count"), None);
        assert_eq!(string_attribute(&body, "absent"), None);
    }

    #[test]
    fn embedded_comment_is_stripped_before_classification() {
        assert_eq!(
            strip_embedded_comment("git::github.com/o/r?ref=abc1234 # 0.3.12"),
            "git::github.com/o/r?ref=abc1234"
        );
        assert_eq!(strip_embedded_comment("jameswoolfenden/http/ip"), "jameswoolfenden/http/ip");
    }

    #[test]
    fn terraform_file_filter() {
        assert!(is_terraform_file(Path::new("infra/main.tf")));
        assert!(!is_terraform_file(Path::new("infra/main.tf.json")));
        assert!(!is_terraform_file(Path::new("README.md")));
    }
}
