//! Command-line interface.
//!
//! One subcommand per ecosystem plus `cache` maintenance. Flags that every
//! pass understands (target selection, token, dry-run, cache tuning,
//! verbosity) are global, so `pinion actions --dry-run` and
//! `pinion --dry-run actions` both work.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cache::Cache;
use crate::client::github::GithubClient;
use crate::client::oci::OciClient;
use crate::client::registry::RegistryClient;
use crate::config::{CacheConfig, RunConfig};
use crate::resolve::Resolver;
use crate::workflows::{self, RunSummary};

/// Pin mutable IaC and CI references to immutable commit SHAs and digests.
#[derive(Parser, Debug)]
#[command(name = "pinion", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Operate on a single file instead of walking a directory
    #[arg(short, long, global = true, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Directory to scan
    #[arg(short, long, global = true, value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// GitHub API token for authenticated (higher rate limit) requests
    #[arg(short, long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Show diffs without writing any file
    #[arg(long, global = true)]
    dry_run: bool,

    /// Skip references that fail to resolve instead of aborting the file
    #[arg(long, global = true)]
    continue_on_error: bool,

    /// Only pin releases at least this many days old (0 = latest)
    #[arg(long, global = true, value_name = "DAYS", default_value_t = 0)]
    stable: u32,

    /// Disable the on-disk response cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Cache time-to-live in hours
    #[arg(long, global = true, value_name = "HOURS", default_value_t = 24)]
    cache_ttl: u64,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pin GitHub Action references in workflow files
    Actions,
    /// Pin Terraform module sources to git commit refs
    Modules,
    /// Update Terraform provider versions to the latest release
    Providers,
    /// Pin pre-commit hook revisions to commit SHAs
    Hooks,
    /// Pin container image tags in CI manifests to digests
    CiImages,
    /// Manage the on-disk response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Remove every cached response
    Clear,
    /// Remove only expired entries
    ClearExpired,
    /// Show entry count, size, and location
    Stats,
}

impl Cli {
    /// Initialise the tracing subscriber from the verbosity flags.
    /// `RUST_LOG` still wins when set.
    pub fn init_tracing(&self) {
        let level = if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                _ => "debug",
            }
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("pinion={level}")));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new();
        config.enabled = !self.no_cache;
        config.ttl = Duration::from_secs(self.cache_ttl * 3600);
        config
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            token: self.token.clone(),
            dry_run: self.dry_run,
            continue_on_error: self.continue_on_error,
            stability_days: self.stable,
        }
    }

    fn resolver(&self, cache: Cache) -> Result<Resolver> {
        let github = GithubClient::new(cache.clone(), self.token.clone())?;
        let registry = RegistryClient::new(cache)?;
        Ok(Resolver::new(github, registry, self.stable))
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.run_config();
        let file = self.file.as_deref();
        let directory = self.directory.as_path();

        let summary = match &self.command {
            Commands::Actions => {
                let resolver = self.resolver(Cache::new(&self.cache_config()))?;
                workflows::actions::run(&resolver, &config, file, directory).await?
            }
            Commands::Modules => {
                let resolver = self.resolver(Cache::new(&self.cache_config()))?;
                workflows::modules::run(&resolver, &config, file, directory).await?
            }
            Commands::Providers => {
                let resolver = self.resolver(Cache::new(&self.cache_config()))?;
                workflows::providers::run(&resolver, &config, file, directory).await?
            }
            Commands::Hooks => {
                let resolver = self.resolver(Cache::new(&self.cache_config()))?;
                workflows::precommit::run(&resolver, &config, file, directory).await?
            }
            Commands::CiImages => {
                let oci = OciClient::new(self.token.clone())?;
                workflows::ci::run(&oci, &config, file, directory).await?
            }
            Commands::Cache { command } => {
                return run_cache_command(&Cache::new(&self.cache_config()), command);
            }
        };

        finish(summary)
    }
}

fn run_cache_command(cache: &Cache, command: &CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Clear => {
            cache.clear()?;
            println!("cache cleared ({})", cache.dir().display());
        }
        CacheCommands::ClearExpired => {
            let removed = cache.clear_expired()?;
            println!("removed {removed} expired entries");
        }
        CacheCommands::Stats => {
            let (entries, bytes) = cache.stats()?;
            println!("{entries} entries, {bytes} bytes, {}", cache.dir().display());
        }
    }
    Ok(())
}

fn finish(summary: RunSummary) -> Result<()> {
    summary.print();
    if summary.failed > 0 {
        anyhow::bail!("{} file(s) failed", summary.failed);
    }
    Ok(())
}
