//! Queue execution - one reconciliation pass against the platform
//!
//! A pass reads fresh label state, performs at most one queue transition,
//! and returns. Passes are idempotent and may run concurrently; nothing here
//! holds an in-process lock.

use crate::config::QueueSettings;
use crate::error::Result;
use crate::platform::PlatformService;
use crate::queue::labels::{FailureKind, failure_comment, stale_lock_comment};
use crate::queue::plan::{LockState, Verdict, assess_checks, assess_locks, assess_mergeability};
use crate::types::{MergeableState, RepoRef};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use tracing::{error, info, instrument, warn};

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another PR holds a live lock; nothing was touched
    Busy {
        /// PR holding the lock
        pr: u64,
        /// Time since that PR was last updated
        age: TimeDelta,
    },
    /// No PR is waiting in the queue
    Idle,
    /// The candidate was kicked out of the queue
    Failed {
        /// PR number
        pr: u64,
        /// Conflict or CI
        kind: FailureKind,
    },
    /// A branch update was requested; the lock stays
    UpdatingBranch {
        /// PR number
        pr: u64,
    },
    /// The branch update request failed; retried on the next pass
    UpdateBranchFailed {
        /// PR number
        pr: u64,
        /// Error reported by the platform
        error: String,
    },
    /// Checks are still running; the lock stays
    AwaitingChecks {
        /// PR number
        pr: u64,
        /// Unfinished checks
        pending: Vec<String>,
    },
    /// The candidate was merged
    Merged {
        /// PR number
        pr: u64,
        /// Merge commit SHA
        sha: Option<String>,
    },
    /// The merge request failed; retried on the next pass
    MergeFailed {
        /// PR number
        pr: u64,
        /// Error reported by the platform
        error: String,
    },
    /// Green checks, but GitHub reports a state the queue does not merge in
    Holding {
        /// PR number
        pr: u64,
        /// Reported mergeable state
        state: MergeableState,
    },
    /// The candidate was closed after the search ran; its lock was released
    Closed {
        /// PR number
        pr: u64,
    },
}

impl PassOutcome {
    /// PR the pass acted on or waited for, if any
    pub const fn pr(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Busy { pr, .. }
            | Self::Failed { pr, .. }
            | Self::UpdatingBranch { pr }
            | Self::UpdateBranchFailed { pr, .. }
            | Self::AwaitingChecks { pr, .. }
            | Self::Merged { pr, .. }
            | Self::MergeFailed { pr, .. }
            | Self::Holding { pr, .. }
            | Self::Closed { pr } => Some(*pr),
        }
    }
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy { pr, age } => {
                write!(f, "busy with PR #{pr} (locked {}m ago)", age.num_minutes())
            }
            Self::Idle => write!(f, "nothing queued"),
            Self::Failed { pr, kind } => write!(f, "kicked PR #{pr} out of the queue ({kind})"),
            Self::UpdatingBranch { pr } => write!(f, "updating branch of PR #{pr}"),
            Self::UpdateBranchFailed { pr, error } => {
                write!(f, "branch update of PR #{pr} failed: {error}")
            }
            Self::AwaitingChecks { pr, pending } => {
                write!(f, "PR #{pr} waiting on CI ({})", pending.join(", "))
            }
            Self::Merged { pr, .. } => write!(f, "merged PR #{pr}"),
            Self::MergeFailed { pr, error } => write!(f, "merge of PR #{pr} failed: {error}"),
            Self::Holding { pr, state } => write!(f, "PR #{pr} is '{state}', waiting"),
            Self::Closed { pr } => write!(f, "PR #{pr} was closed, lock released"),
        }
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Repository reconciled
    pub repo: RepoRef,
    /// Abandoned locks released at the start of the pass
    pub released_locks: Vec<u64>,
    /// How the pass ended
    pub outcome: PassOutcome,
}

/// Runs reconciliation passes with a fixed set of queue settings
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    settings: QueueSettings,
}

impl Reconciler {
    /// Create a reconciler
    pub const fn new(settings: QueueSettings) -> Self {
        Self { settings }
    }

    /// Queue settings in use
    pub const fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Run one pass for `repo`, timed against the wall clock
    pub async fn reconcile(
        &self,
        platform: &dyn PlatformService,
        repo: &RepoRef,
    ) -> Result<PassReport> {
        self.reconcile_at(platform, repo, Utc::now()).await
    }

    /// Run one pass for `repo`, measuring lock age against `now`
    ///
    /// Gateway errors while reading state, taking the lock or listing checks
    /// abort the pass and leave labels as they are. Branch update and merge
    /// failures are reported in the outcome instead, since the next event or
    /// sweep retries them.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn reconcile_at(
        &self,
        platform: &dyn PlatformService,
        repo: &RepoRef,
        now: DateTime<Utc>,
    ) -> Result<PassReport> {
        let labels = &self.settings.labels;
        let mut report = PassReport {
            repo: repo.clone(),
            released_locks: Vec::new(),
            outcome: PassOutcome::Idle,
        };

        // A. Check for stuck locks
        let locked = platform.search_open_prs(repo, &labels.locked_query()).await?;
        match assess_locks(&locked, now, self.settings.stale_after()) {
            LockState::Free => {}
            LockState::Busy { pr, age } => {
                info!(pr, minutes = age.num_minutes(), "repository is busy, skipping");
                report.outcome = PassOutcome::Busy { pr, age };
                return Ok(report);
            }
            LockState::Stale { locks } => {
                for stale in locks {
                    warn!(
                        pr = stale.pr,
                        minutes = stale.age.num_minutes(),
                        "found stale lock, releasing"
                    );
                    platform.remove_label(repo, stale.pr, &labels.lock).await?;
                    platform
                        .create_comment(repo, stale.pr, &stale_lock_comment())
                        .await?;
                    report.released_locks.push(stale.pr);
                }
                // Fall through so a new candidate is picked up right away
            }
        }

        // B. Find next candidate (FIFO)
        let candidates = platform
            .search_open_prs(repo, &labels.candidates_query())
            .await?;
        let Some(candidate) = candidates.first() else {
            return Ok(report);
        };
        let pr = candidate.number;

        // C. Engage: nothing may happen between the search and this call
        platform.add_label(repo, pr, &labels.lock).await?;
        info!(pr, "acquired merge lock");

        // Search results are partial; fetch mergeability and head SHA
        let details = platform.get_pr(repo, pr).await?;
        let state = details.mergeable_state;

        // Search results can lag behind a close
        if !details.open {
            warn!(pr, "candidate is no longer open, releasing lock");
            if let Err(e) = platform.remove_label(repo, pr, &labels.lock).await {
                warn!(pr, error = %e, "failed to release lock on closed PR");
            }
            report.outcome = PassOutcome::Closed { pr };
            return Ok(report);
        }

        // D. Evaluate
        let verdict = match assess_mergeability(state) {
            Some(verdict) => verdict,
            None => {
                let checks = platform.list_check_runs(repo, &details.head_sha).await?;
                assess_checks(state, &checks)
            }
        };

        report.outcome = match verdict {
            Verdict::Conflicted => {
                self.fail_pr(platform, repo, pr, FailureKind::Conflict, &[])
                    .await?;
                PassOutcome::Failed {
                    pr,
                    kind: FailureKind::Conflict,
                }
            }
            Verdict::Behind => {
                info!(pr, "PR is behind, updating branch");
                // GitHub applies the update asynchronously
                match platform.update_branch(repo, pr).await {
                    Ok(()) => PassOutcome::UpdatingBranch { pr },
                    Err(e) => {
                        error!(pr, error = %e, "branch update failed");
                        PassOutcome::UpdateBranchFailed {
                            pr,
                            error: e.to_string(),
                        }
                    }
                }
            }
            Verdict::CiFailed { failing } => {
                self.fail_pr(platform, repo, pr, FailureKind::Ci, &failing)
                    .await?;
                PassOutcome::Failed {
                    pr,
                    kind: FailureKind::Ci,
                }
            }
            Verdict::AwaitingChecks { pending } => {
                info!(pr, pending = pending.len(), "PR is waiting on CI");
                PassOutcome::AwaitingChecks { pr, pending }
            }
            Verdict::Merge => self.merge(platform, repo, pr).await,
            Verdict::Hold { state } => {
                info!(pr, %state, "PR is not in a mergeable state, waiting");
                PassOutcome::Holding { pr, state }
            }
        };

        Ok(report)
    }

    /// Merge the locked PR; failures are transient and keep the lock
    async fn merge(&self, platform: &dyn PlatformService, repo: &RepoRef, pr: u64) -> PassOutcome {
        let method = self.settings.merge_method;
        info!(pr, %method, "merging PR");

        let result = match platform.merge_pr(repo, pr, method).await {
            Ok(result) if result.merged => result,
            Ok(result) => {
                let error = result
                    .message
                    .unwrap_or_else(|| "GitHub did not merge the PR".to_string());
                error!(pr, error, "merge failed");
                return PassOutcome::MergeFailed { pr, error };
            }
            Err(e) => {
                error!(pr, error = %e, "merge failed");
                return PassOutcome::MergeFailed {
                    pr,
                    error: e.to_string(),
                };
            }
        };

        // The PR is closed now and invisible to open-PR searches; the labels
        // are removed only to keep closed PRs tidy.
        if self.settings.cleanup_after_merge {
            let labels = &self.settings.labels;
            for label in [&labels.trigger, &labels.lock] {
                if let Err(e) = platform.remove_label(repo, pr, label).await {
                    warn!(pr, label = %label, error = %e, "failed to clean up label after merge");
                }
            }
        }

        PassOutcome::Merged {
            pr,
            sha: result.sha,
        }
    }

    /// Kick a PR out of the queue: comment, drop trigger and lock, attach
    /// the terminal label. Not transactional; the first error stops it.
    async fn fail_pr(
        &self,
        platform: &dyn PlatformService,
        repo: &RepoRef,
        pr: u64,
        kind: FailureKind,
        failing_checks: &[String],
    ) -> Result<()> {
        let labels = &self.settings.labels;
        warn!(pr, %kind, "kicking PR out of the queue");

        platform
            .create_comment(repo, pr, &failure_comment(labels, kind, failing_checks))
            .await?;
        platform.remove_label(repo, pr, &labels.trigger).await?;
        platform.remove_label(repo, pr, &labels.lock).await?;
        platform
            .add_label(repo, pr, labels.for_failure(kind))
            .await?;
        Ok(())
    }
}
