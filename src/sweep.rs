//! Sweep driver - reconcile every repository of every installation
//!
//! Used by the scheduler endpoint and the `sweep` command to catch events
//! that were missed and to recover stale locks in quiet repositories.

use crate::config::{DEFAULT_MAX_CONCURRENCY, SweepConfig};
use crate::error::{Error, Result};
use crate::platform::{InstallationDirectory, InstallationScope};
use crate::queue::{PassReport, Reconciler};
use crate::types::RepoRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Sweep tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Maximum repositories reconciled at once (at least 1)
    pub max_concurrency: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl From<&SweepConfig> for SweepOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
        }
    }
}

/// What a sweep failure was isolated to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepTarget {
    /// Repositories of the installation could not be listed
    Installation(u64),
    /// The reconciliation pass for this repository failed
    Repository(RepoRef),
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installation(id) => write!(f, "installation {id}"),
            Self::Repository(repo) => write!(f, "{repo}"),
        }
    }
}

/// A failure that did not stop the rest of the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    /// Installation or repository affected
    pub target: SweepTarget,
    /// Error message
    pub error: String,
}

/// Outcome of a full sweep
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Installations visited
    pub installations: usize,
    /// Successful passes, ordered by repository
    pub reconciled: Vec<PassReport>,
    /// Isolated failures, ordered by target
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    /// True when every installation and repository was processed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reconcile every repository the App can see.
///
/// Only a failure to list installations fails the sweep. Every other
/// failure is logged, recorded in the report, and does not affect siblings.
/// At most `options.max_concurrency` passes run at the same time.
pub async fn run_sweep(
    directory: &dyn InstallationDirectory,
    reconciler: &Reconciler,
    options: &SweepOptions,
) -> Result<SweepReport> {
    let installations = directory.list_installations().await?;
    info!(count = installations.len(), "starting sweep");

    let mut report = SweepReport {
        installations: installations.len(),
        ..SweepReport::default()
    };

    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut join_set: JoinSet<Result<PassReport>> = JoinSet::new();
    let mut in_flight: HashMap<tokio::task::Id, RepoRef> = HashMap::new();

    for installation in &installations {
        let InstallationScope {
            platform,
            repositories,
        } = match directory.open_installation(installation).await {
            Ok(scope) => scope,
            Err(e) => {
                error!(installation = installation.id, error = %e, "failed to process installation");
                report.failures.push(SweepFailure {
                    target: SweepTarget::Installation(installation.id),
                    error: e.to_string(),
                });
                continue;
            }
        };

        for repo in repositories {
            // Wait for a slot before spawning so pending repos are not all
            // started at once
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("sweep semaphore closed: {e}")))?;

            let platform = Arc::clone(&platform);
            let reconciler = reconciler.clone();
            let task_repo = repo.clone();
            let handle = join_set.spawn(async move {
                let _permit = permit;
                reconciler.reconcile(platform.as_ref(), &task_repo).await
            });
            in_flight.insert(handle.id(), repo);
        }
    }

    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((id, Ok(pass))) => {
                in_flight.remove(&id);
                report.reconciled.push(pass);
            }
            Ok((id, Err(e))) => {
                let Some(repo) = in_flight.remove(&id) else {
                    continue;
                };
                error!(%repo, error = %e, "failed to process repository");
                report.failures.push(SweepFailure {
                    target: SweepTarget::Repository(repo),
                    error: e.to_string(),
                });
            }
            Err(e) => {
                let Some(repo) = in_flight.remove(&e.id()) else {
                    continue;
                };
                error!(%repo, error = %e, "reconciliation task aborted");
                report.failures.push(SweepFailure {
                    target: SweepTarget::Repository(repo),
                    error: e.to_string(),
                });
            }
        }
    }

    report.reconciled.sort_by(|a, b| a.repo.cmp(&b.repo));
    report.failures.sort_by_key(|f| f.target.to_string());

    if report.is_clean() {
        info!(repos = report.reconciled.len(), "sweep finished");
    } else {
        warn!(
            repos = report.reconciled.len(),
            failures = report.failures.len(),
            "sweep finished with failures"
        );
    }
    Ok(report)
}
