//! Pinion - dependency reference pinning for IaC and CI configuration
//!
//! Pinion rewrites mutable external references found in infrastructure-as-code
//! and CI configuration to immutable, content-addressed identifiers while
//! preserving the human-readable context around them:
//!
//! - GitHub Action tags (`uses: actions/checkout@v3`) become the latest
//!   release's commit SHA with the resolved version kept as a comment
//! - Terraform module sources are pinned to `git::...?ref=<sha>` form
//! - Terraform provider constraints are bumped to the latest registry release
//! - Pre-commit hook revisions become commit SHAs
//! - Container image tags in CI manifests become `@sha256:` digests
//!
//! # Architecture Overview
//!
//! Processing follows a fixed pipeline per file:
//!
//! ```text
//! Read -> Extract[] -> {Classify -> Resolve -> Rewrite}* -> Diff -> (Write | Skip)
//! ```
//!
//! - [`classify`] maps a raw reference string to a source-authority type via
//!   an ordered rule chain
//! - [`resolve`] turns a classified reference into an immutable pin plus a
//!   human-readable version, with bounded retry on rate limits
//! - [`client`] holds the GitHub, Terraform Registry, and OCI registry
//!   clients, each with a fixed timeout and typed response decoding
//! - [`cache`] is a content-addressed, TTL-bounded store for upstream API
//!   responses, shared by all clients
//! - [`rewrite`] performs the minimal text surgery on the host file, renders
//!   a diff for operator review, and honors dry-run semantics
//! - [`workflows`] contains the per-ecosystem orchestrators that feed
//!   extracted references through the pipeline
//!
//! Resolution is read-only with respect to upstreams: Pinion never modifies
//! registries or repositories, and never resolves version *ranges* - every
//! reference resolves to a single point.
//!
//! # Example
//!
//! ```bash
//! # Pin every workflow under .github/workflows, showing the diff first
//! pinion actions -d . --dry-run
//!
//! # Pin Terraform module sources in a single file
//! pinion modules -f main.tf
//! ```

pub mod cache;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod core;
pub mod resolve;
pub mod rewrite;
pub mod workflows;
