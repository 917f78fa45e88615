//! End-to-end pin passes that complete without any upstream call: every
//! reference in the fixtures is local, already pinned, or variable-based,
//! so the orchestrators classify and skip. These exercise discovery,
//! parsing, dry-run gating, and the batch summary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn pinion() -> Command {
    let mut cmd = Command::cargo_bin("pinion").unwrap();
    cmd.env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn actions_pass_skips_pinned_and_local_references() {
    let dir = tempfile::TempDir::new().unwrap();
    let workflows = dir.path().join(".github/workflows");
    fs::create_dir_all(&workflows).unwrap();
    let path = workflows.join("ci.yml");
    let content = "jobs:\n  build:\n    steps:\n      - uses: actions/checkout@1e31de5234b9f8995739874a8ce0492dc87873e2 # v4\n      - uses: ./.github/actions/setup\n";
    fs::write(&path, content).unwrap();

    pinion()
        .args(["actions", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 scanned"));

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn actions_pass_with_no_workflow_files_scans_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    pinion()
        .args(["actions", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 scanned"));
}

#[test]
fn modules_pass_leaves_local_sources_alone() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("modules/vpc")).unwrap();
    let path = dir.path().join("main.tf");
    let content = "module \"vpc\" {\n  source = \"./modules/vpc\"\n}\n";
    fs::write(&path, content).unwrap();

    pinion()
        .args(["modules", "-d"])
        .arg(dir.path())
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 scanned"));

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn malformed_terraform_fails_the_file_but_not_the_exit_path() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("broken.tf"), "module \"x\" {").unwrap();

    // The file failure is reported in the summary and the exit code.
    pinion()
        .args(["modules", "--dry-run", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 failed"));
}

#[test]
fn ci_images_pass_skips_variable_and_digested_images() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(".gitlab-ci.yml");
    let content = "build:\n  image: $BUILD_IMAGE\n  script:\n    - make\ntest:\n  image: alpine@sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b\n  script:\n    - make test\n";
    fs::write(&path, content).unwrap();

    pinion()
        .args(["ci-images", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 scanned"));

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn hooks_pass_retains_local_and_commit_pinned_repos() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(".pre-commit-config.yaml");
    let content = "repos:\n  - repo: local\n    hooks:\n      - id: fmt\n        name: fmt\n        entry: cargo fmt\n        language: system\n  - repo: https://github.com/psf/black\n    rev: 1e31de5234b9f8995739874a8ce0492dc87873e2\n    hooks:\n      - id: black\n";
    fs::write(&path, content).unwrap();

    pinion()
        .args(["hooks", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 scanned"));

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn dry_run_never_touches_files_even_when_parsing_succeeds() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("versions.tf");
    let content = "terraform {\n  required_version = \">= 1.5\"\n}\n";
    fs::write(&path, content).unwrap();

    pinion()
        .args(["providers", "--dry-run", "-d"])
        .arg(dir.path())
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}
