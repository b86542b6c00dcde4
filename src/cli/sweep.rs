//! Sweep command - reconcile every repository once

use crate::cli::style::{Stylize, check, cross, dot};
use anstream::println;
use pr_sisyphus::auth::github_app;
use pr_sisyphus::config::Config;
use pr_sisyphus::error::{Error, Result};
use pr_sisyphus::queue::{PassOutcome, Reconciler};
use pr_sisyphus::sweep::{SweepOptions, run_sweep};

/// Run the sweep command
pub async fn run_sweep_command(config: &Config, concurrency: Option<usize>) -> Result<()> {
    let app = github_app(&config.github)?;
    let mut options = SweepOptions::from(&config.sweep);
    if let Some(n) = concurrency {
        if n == 0 {
            return Err(Error::Config("--concurrency must be at least 1".to_string()));
        }
        options.max_concurrency = n;
    }

    let reconciler = Reconciler::new(config.queue.clone());
    let report = run_sweep(&app, &reconciler, &options).await?;

    println!(
        "{}",
        format!(
            "Swept {} repositories across {} installations",
            report.reconciled.len() + report.failures.len(),
            report.installations
        )
        .emphasis()
    );

    for pass in &report.reconciled {
        let marker = match pass.outcome {
            PassOutcome::Idle | PassOutcome::Busy { .. } => dot(),
            PassOutcome::Merged { .. } | PassOutcome::UpdatingBranch { .. } => check(),
            _ => "•".warn(),
        };
        println!("  {marker} {}: {}", pass.repo.emphasis(), pass.outcome);
        for pr in &pass.released_locks {
            println!("      {}", format!("released stale lock on PR #{pr}").muted());
        }
    }

    for failure in &report.failures {
        println!("  {} {}: {}", cross(), failure.target.emphasis(), failure.error.error());
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(Error::Internal(format!(
            "{} sweep target(s) failed",
            report.failures.len()
        )))
    }
}
