//! Reconcile command - one pass for one repository

use crate::cli::style::{Stylize, check};
use anstream::println;
use pr_sisyphus::auth::platform_for_repo;
use pr_sisyphus::config::Config;
use pr_sisyphus::error::Result;
use pr_sisyphus::queue::Reconciler;
use pr_sisyphus::types::RepoRef;

/// Run the reconcile command
pub async fn run_reconcile(config: &Config, repo: &str) -> Result<()> {
    let repo: RepoRef = repo.parse()?;
    let platform = platform_for_repo(&config.github, &repo).await?;

    let reconciler = Reconciler::new(config.queue.clone());
    let report = reconciler.reconcile(platform.as_ref(), &repo).await?;

    for pr in &report.released_locks {
        println!(
            "{} Released stale lock on PR #{}",
            "!".warn(),
            pr.emphasis()
        );
    }
    println!("{} {}: {}", check(), report.repo.emphasis(), report.outcome);

    Ok(())
}
