//! Terraform provider version updating.
//!
//! Walks `.tf` files for `terraform { required_providers { ... } }` blocks
//! and rewrites every provider's `version` to the latest non-prerelease
//! version published in the Terraform Registry. Versions carrying a
//! constraint operator are updated like any other.

use std::path::Path;

use hcl_edit::expr::{Expression, ObjectKey};
use hcl_edit::repr::{Decorate, Decorated};
use hcl_edit::structure::Body;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::core::{PinionError, Result};
use crate::resolve::Resolver;
use crate::rewrite::{FileOutcome, RewriteOperation};

use super::{RunSummary, collect_files, handle_reference_failure, report_file_failure};

/// A provider entry found in a `required_providers` block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProviderEntry {
    /// Local name, the attribute key (`aws`).
    name: String,
    /// Registry address (`hashicorp/aws`).
    source: String,
    /// Current version constraint, if any.
    version: Option<String>,
}

/// Update provider versions in every `.tf` file under `directory` (or just
/// `file`).
pub async fn run(
    resolver: &Resolver,
    config: &RunConfig,
    file: Option<&Path>,
    directory: &Path,
) -> Result<RunSummary> {
    let files = collect_files(file, directory, |p| {
        p.extension().and_then(|e| e.to_str()) == Some("tf")
    })?;
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
    let mut body: Body =
        op.candidate().parse().map_err(|e: hcl_edit::parser::Error| PinionError::ParseFile {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let entries = collect_providers(&body);
    if entries.is_empty() {
        return op.commit(config.dry_run);
    }

    let mut mutated = false;
    for entry in entries {
        let Some((namespace, provider_type)) = split_provider_source(&entry.source) else {
            debug!(source = %entry.source, "provider source is not a registry address");
            continue;
        };

        let latest = match resolver.latest_provider_version(namespace, provider_type).await {
            Ok(Some(latest)) => latest,
            Ok(None) => {
                info!(provider = %entry.source, "no stable provider version published");
                continue;
            }
            Err(e) => {
                handle_reference_failure(config.continue_on_error, &entry.source, e)?;
                continue;
            }
        };

        if entry.version.as_deref() == Some(latest.as_str()) {
            continue;
        }
        if set_provider_version(&mut body, &entry.name, &latest) {
            mutated = true;
        }
    }

    if mutated {
        op.set_candidate(body.to_string());
    }
    op.commit(config.dry_run)
}

/// Gather provider entries from every `terraform.required_providers` block.
fn collect_providers(body: &Body) -> Vec<ProviderEntry> {
    let mut entries = Vec::new();

    for_each_required_provider(body, |name, value| {
        let entry = match value {
            Expression::Object(object) => {
                let mut source = None;
                let mut version = None;
                for (key, item) in object.iter() {
                    match (object_key_name(key), item.expr()) {
                        (Some("source"), Expression::String(s)) => {
                            source = Some(s.value().clone());
                        }
                        (Some("version"), Expression::String(s)) => {
                            version = Some(s.value().clone());
                        }
                        _ => {}
                    }
                }
                ProviderEntry {
                    name: name.to_string(),
                    source: source.unwrap_or_else(|| format!("hashicorp/{name}")),
                    version,
                }
            }
            // Legacy form: aws = "~> 3.0"
            Expression::String(s) => ProviderEntry {
                name: name.to_string(),
                source: format!("hashicorp/{name}"),
                version: Some(s.value().clone()),
            },
            _ => return,
        };
        entries.push(entry);
    });

    entries
}

/// Set the version of the named provider, returning whether anything
/// changed. Object entries get their `version` item replaced; legacy string
/// entries are replaced wholesale.
fn set_provider_version(body: &mut Body, name: &str, version: &str) -> bool {
    let mut changed = false;

    for mut structure in body.iter_mut() {
        let Some(terraform) = structure.as_block_mut() else {
            continue;
        };
        if terraform.ident.as_str() != "terraform" {
            continue;
        }
        for mut inner in terraform.body.iter_mut() {
            let Some(required) = inner.as_block_mut() else {
                continue;
            };
            if required.ident.as_str() != "required_providers" {
                continue;
            }
            for mut item in required.body.iter_mut() {
                let Some(mut attr) = item.as_attribute_mut() else {
                    continue;
                };
                if attr.key.as_str() != name {
                    continue;
                }
                let value = attr.value_mut();
                match value {
                    Expression::Object(object) => {
                        for (key, entry) in object.iter_mut() {
                            if object_key_name(&key) == Some("version") {
                                *entry.expr_mut() = string_expression(version);
                                changed = true;
                            }
                        }
                    }
                    Expression::String(_) => {
                        *value = string_expression(version);
                        changed = true;
                    }
                    _ => {}
                }
            }
        }
    }

    changed
}

fn for_each_required_provider(body: &Body, mut f: impl FnMut(&str, &Expression)) {
    for structure in body.iter() {
        let Some(terraform) = structure.as_block() else {
            continue;
        };
        if terraform.ident.as_str() != "terraform" {
            continue;
        }
        for inner in terraform.body.iter() {
            let Some(required) = inner.as_block() else {
                continue;
            };
            if required.ident.as_str() != "required_providers" {
                continue;
            }
            for item in required.body.iter() {
                if let Some(attr) = item.as_attribute() {
                    f(attr.key.as_str(), &attr.value);
                }
            }
        }
    }
}

fn object_key_name(key: &ObjectKey) -> Option<&str> {
    match key {
        ObjectKey::Ident(ident) => Some(ident.as_str()),
        ObjectKey::Expression(Expression::String(s)) => Some(s.value().as_str()),
        ObjectKey::Expression(_) => None,
    }
}

fn string_expression(value: &str) -> Expression {
    let mut expr = Expression::String(Decorated::new(value.to_string()));
    expr.decor_mut().set_prefix(" ");
    expr
}

/// Split a provider source address into `(namespace, type)`, tolerating a
/// leading registry host.
fn split_provider_source(source: &str) -> Option<(&str, &str)> {
    let mut segments: Vec<&str> = source.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() == 3 {
        segments.remove(0);
    }
    match segments.as_slice() {
        [namespace, provider_type] => Some((namespace, provider_type)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSIONS_TF: &str = r#"terraform {
  required_version = ">= 1.5"

  required_providers {
    aws = {
      source  = "hashicorp/aws"
      version = ">= 5.20.0"
    }
    random = "~> 3.0"
  }
}
"#;

    #[test]
    fn collects_object_and_legacy_entries() {
        let body: Body = VERSIONS_TF.parse().unwrap();
        let entries = collect_providers(&body);
        assert_eq!(
            entries,
            vec![
                ProviderEntry {
                    name: "aws".to_string(),
                    source: "hashicorp/aws".to_string(),
                    version: Some(">= 5.20.0".to_string()),
                },
                ProviderEntry {
                    name: "random".to_string(),
                    source: "hashicorp/random".to_string(),
                    version: Some("~> 3.0".to_string()),
                },
            ]
        );
    }

    #[test]
    fn sets_version_in_object_entry_only() {
        let mut body: Body = VERSIONS_TF.parse().unwrap();
        assert!(set_provider_version(&mut body, "aws", "5.31.0"));

        let out = body.to_string();
        assert!(out.contains("version = \"5.31.0\""));
        assert!(!out.contains(">= 5.20.0"));
        assert!(out.contains("random = \"~> 3.0\""));
        assert!(out.contains("required_version = \">= 1.5\""));
    }

    #[test]
    fn sets_version_on_legacy_string_entry() {
        let mut body: Body = VERSIONS_TF.parse().unwrap();
        assert!(set_provider_version(&mut body, "random", "3.6.0"));
        assert!(body.to_string().contains("random = \"3.6.0\""));
    }

    #[test]
    fn unknown_provider_changes_nothing() {
        let mut body: Body = VERSIONS_TF.parse().unwrap();
        assert!(!set_provider_version(&mut body, "google", "5.0.0"));
        assert_eq!(body.to_string(), VERSIONS_TF);
    }

    #[test]
    fn provider_source_splitting() {
        assert_eq!(split_provider_source("hashicorp/aws"), Some(("hashicorp", "aws")));
        assert_eq!(
            split_provider_source("registry.terraform.io/hashicorp/aws"),
            Some(("hashicorp", "aws"))
        );
        assert_eq!(split_provider_source("aws"), None);
    }
}
