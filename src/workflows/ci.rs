//! GitLab CI image pinning.
//!
//! Reads `.gitlab-ci.yml`, collects every `image:` reference (plain string
//! and `{name: ...}` object forms, at any nesting depth), and rewrites
//! mutable tags to their registry digest:
//!
//! ```yaml
//! image: alpine@sha256:c5b1261d6d3e... # 3.19
//! ```
//!
//! References through CI variables (`$IMAGE`) are skipped - their value is
//! unknowable here. Already-digested references are left alone.

use std::collections::BTreeSet;
use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, info};

use crate::client::oci::{ImageReference, OciClient};
use crate::config::RunConfig;
use crate::core::{PinionError, Result};
use crate::resolve::retry::with_rate_limit_retry;
use crate::rewrite::{FileOutcome, RewriteOperation};

use super::{RunSummary, collect_files, handle_reference_failure, report_file_failure};

/// Pin every `.gitlab-ci.yml` under `directory` (or just `file`).
pub async fn run(
    oci: &OciClient,
    config: &RunConfig,
    file: Option<&Path>,
    directory: &Path,
) -> Result<RunSummary> {
    let files = collect_files(file, directory, |p| {
        p.file_name().and_then(|n| n.to_str()) == Some(".gitlab-ci.yml")
    })?;
    if files.is_empty() {
        info!(directory = %directory.display(), "no gitlab-ci manifest found");
    }

    let mut summary = RunSummary::default();
    for path in &files {
        summary.scanned += 1;
        match process_file(oci, config, path).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                report_file_failure(path, &e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn process_file(oci: &OciClient, config: &RunConfig, path: &Path) -> Result<FileOutcome> {
    let mut op = RewriteOperation::load(path)?;

    let document: Value =
        serde_yaml::from_str(op.candidate()).map_err(|e| PinionError::ParseFile {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut images = BTreeSet::new();
    collect_images(&document, &mut images);

    for original in images {
        let image = ImageReference::parse(&original);
        if image.digest.is_some() {
            debug!(image = %original, "already pinned to a digest");
            continue;
        }

        let digest =
            match with_rate_limit_retry(&image.registry, || oci.digest(&image)).await {
                Ok(digest) => digest,
                Err(e) => {
                    handle_reference_failure(config.continue_on_error, &original, e)?;
                    continue;
                }
            };

        op.replace_exact(&original, &image.with_digest(&digest));
    }

    op.commit(config.dry_run)
}

/// Walk the document collecting `image:` values. A `BTreeSet` keeps the
/// resolution order deterministic and deduplicates repeated images.
fn collect_images(value: &Value, images: &mut BTreeSet<String>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, entry) in mapping {
                if key.as_str() == Some("image") {
                    match entry {
                        Value::String(image) => push_image(image, images),
                        Value::Mapping(object) => {
                            if let Some(name) = object.get("name").and_then(Value::as_str) {
                                push_image(name, images);
                            }
                        }
                        _ => {}
                    }
                }
                collect_images(entry, images);
            }
        }
        Value::Sequence(sequence) => {
            for entry in sequence {
                collect_images(entry, images);
            }
        }
        _ => {}
    }
}

fn push_image(image: &str, images: &mut BTreeSet<String>) {
    if image.contains('$') {
        debug!(image, "image reference uses a CI variable, skipping");
        return;
    }
    images.insert(image.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    const GITLAB_CI: &str = r#"default:
  image: alpine:3.19

build:
  image:
    name: hashicorp/terraform:1.6
  script:
    - terraform plan

deploy:
  image: $DEPLOY_IMAGE
  script:
    - ./deploy.sh

lint:
  image: alpine:3.19
"#;

    #[test]
    fn collects_string_and_object_forms_deduplicated() {
        let document: Value = serde_yaml::from_str(GITLAB_CI).unwrap();
        let mut images = BTreeSet::new();
        collect_images(&document, &mut images);
        assert_eq!(
            images.into_iter().collect::<Vec<_>>(),
            vec!["alpine:3.19".to_string(), "hashicorp/terraform:1.6".to_string()]
        );
    }

    #[test]
    fn variable_references_are_skipped() {
        let mut images = BTreeSet::new();
        push_image("$IMAGE", &mut images);
        push_image("registry.example.com/$GROUP/app:1.0", &mut images);
        assert!(images.is_empty());
    }

    #[test]
    fn nested_sequences_are_walked() {
        let document: Value =
            serde_yaml::from_str("stages:\n  - test\njobs:\n  - image: busybox\n").unwrap();
        let mut images = BTreeSet::new();
        collect_images(&document, &mut images);
        assert_eq!(images.into_iter().collect::<Vec<_>>(), vec!["busybox".to_string()]);
    }
}
