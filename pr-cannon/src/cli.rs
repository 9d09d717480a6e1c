//! # pr-cannon CLI Interface (Module)
//!
//! This module implements the full CLI interface for pr-cannon: command
//! parsing, argument validation, and the async entrypoint. All core business
//! logic (file collection, destination paths, remote orchestration) lives in
//! the `pr-cannon-core` crate; this module is strictly CLI glue.
//!
//! ## How To Use
//! - For command-line users: run the installed `pr-cannon` binary with
//!   `--help`.
//! - For programmatic/integration use: call [`run`] with a constructed
//!   [`Cli`].
//!
//! Startup order: repository format and credential are checked before any
//! file is read, and every local file is read before any remote call is made.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pr_cannon_core::content;
use pr_cannon_core::publish::{self, MergeStatus, PublishRequest};

use crate::github::GitHubClient;

/// CLI for pr-cannon: fire your files to any repository as a pull request.
#[derive(Parser)]
#[clap(
    name = "pr-cannon",
    version,
    about = "Fire your files to any repository as a Pull Request"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send files or directories to a repository as a new pull request
    Fire {
        /// Files or directories to send, followed by the target repository
        /// (owner/repo format)
        #[clap(required = true, num_args = 2.., value_name = "PATHS... REPO")]
        args: Vec<String>,

        /// Destination path in the repository
        #[clap(short, long)]
        path: Option<String>,

        /// Merge the pull request automatically (repository owner only)
        #[clap(long)]
        merge: bool,

        /// Keep the source branch after a successful merge
        #[clap(long)]
        keep_branch: bool,
    },
    /// Smoke test: upload the current working directory under a timestamped
    /// destination
    Test {
        /// Target repository (owner/repo format)
        repo: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fire {
            args,
            path,
            merge,
            keep_branch,
        } => {
            let (paths, repo) = split_fire_args(&args)?;
            fire(paths, repo, path.as_deref(), merge, keep_branch).await
        }
        Commands::Test { repo } => {
            let cwd = std::env::current_dir()?;
            let dest = format!("pr-cannon-test-{}", unix_millis());
            info!(%dest, "running smoke test upload of the current directory");
            fire(vec![cwd], &repo, Some(&dest), false, false).await
        }
    }
}

/// The trailing positional is the repository; everything before it is a path.
fn split_fire_args(args: &[String]) -> Result<(Vec<PathBuf>, &str)> {
    let (repo, paths) = args
        .split_last()
        .ok_or_else(|| anyhow!("expected <paths...> <owner/repo>"))?;
    Ok((paths.iter().map(PathBuf::from).collect(), repo.as_str()))
}

async fn fire(
    paths: Vec<PathBuf>,
    repo: &str,
    dest: Option<&str>,
    auto_merge: bool,
    keep_branch: bool,
) -> Result<()> {
    publish::parse_repo(repo)?;
    let host = GitHubClient::from_env()?;

    let files = content::load_batch(&paths, dest)?;
    info!(files = files.len(), repo, "collected local file batch");

    let request = PublishRequest {
        repo: repo.to_owned(),
        source_label: content::source_label(&paths),
        files,
        branch: None,
        auto_merge,
        keep_branch,
    };

    let report = publish::publish(&host, &request).await?;

    println!(
        "Pull request #{} created: {}",
        report.pull_request.number, report.pull_request.url
    );
    println!("Branch: {}", report.branch);
    match &report.merge {
        MergeStatus::NotRequested => {}
        MergeStatus::Merged if report.branch_deleted => {
            println!("Merged and deleted branch {}.", report.branch);
        }
        MergeStatus::Merged => println!("Merged."),
        MergeStatus::SkippedNotOwner => {
            println!("Auto-merge skipped: you are not the repository owner.");
        }
        MergeStatus::NotMergeable(reason) => {
            println!("Not merged ({reason}); the pull request is left open.");
        }
        MergeStatus::Failed(reason) => {
            println!("Merge failed ({reason}); the pull request is left open.");
        }
    }
    Ok(())
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
