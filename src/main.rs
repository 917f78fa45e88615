//! Pinion CLI entry point
//!
//! Handles command-line argument parsing, tracing setup, error display, and
//! command execution. The subcommands map one-to-one onto the per-ecosystem
//! orchestrators in [`pinion_cli::workflows`]:
//! - `actions` - pin GitHub Action references in workflow files
//! - `modules` - pin Terraform module sources
//! - `providers` - update Terraform provider versions
//! - `hooks` - pin pre-commit hook revisions
//! - `ci-images` - pin container image tags in CI manifests
//! - `cache` - manage the on-disk response cache

use anyhow::Result;
use clap::Parser;
use pinion_cli::cli;
use pinion_cli::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    cli.init_tracing();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
