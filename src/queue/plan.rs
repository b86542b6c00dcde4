//! Queue planning - pure functions deciding the next transition
//!
//! No I/O happens here. The executor gathers label, PR and check data,
//! hands it to these functions, and acts on the returned state.

use crate::types::{CheckRun, MergeableState, PrSummary};
use chrono::{DateTime, TimeDelta, Utc};

/// A lock whose holder has not been updated within the threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleLock {
    /// PR holding the lock
    pub pr: u64,
    /// Time since the PR was last updated
    pub age: TimeDelta,
}

/// Lock state of a repository, derived from the open PRs carrying the lock
/// label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No PR holds the lock
    Free,
    /// A PR holds a live lock; the pass must not touch the queue
    Busy {
        /// PR holding the lock
        pr: u64,
        /// Time since the PR was last updated
        age: TimeDelta,
    },
    /// Every lock holder is past the threshold; release them and continue
    Stale {
        /// Abandoned locks, in search order
        locks: Vec<StaleLock>,
    },
}

/// Classify the repository's lock from the locked PRs.
///
/// Lock age is approximated by the PR's `updated_at`: labels carry no
/// timestamp of their own. An age equal to the threshold still counts as
/// live. If any lock holder is live the repository is busy, even when other
/// holders are stale.
pub fn assess_locks(locked: &[PrSummary], now: DateTime<Utc>, stale_after: TimeDelta) -> LockState {
    if locked.is_empty() {
        return LockState::Free;
    }

    let mut stale = Vec::new();
    for pr in locked {
        let age = now - pr.updated_at;
        if age <= stale_after {
            return LockState::Busy { pr: pr.number, age };
        }
        stale.push(StaleLock { pr: pr.number, age });
    }

    LockState::Stale { locks: stale }
}

/// What to do with the locked candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Merge conflicts: kick out with the conflict label
    Conflicted,
    /// Behind base: request a branch update and keep the lock
    Behind,
    /// A check failed or timed out: kick out with the fail label
    CiFailed {
        /// Names of the failing checks
        failing: Vec<String>,
    },
    /// Checks still running: keep the lock
    AwaitingChecks {
        /// Names of the unfinished checks
        pending: Vec<String>,
    },
    /// Everything green: merge
    Merge,
    /// Green checks but a mergeable state we do not act on
    Hold {
        /// The state GitHub reported
        state: MergeableState,
    },
}

/// Verdicts that can be reached without looking at CI
///
/// Returns `None` when check runs must be consulted.
pub const fn assess_mergeability(state: MergeableState) -> Option<Verdict> {
    match state {
        MergeableState::Dirty => Some(Verdict::Conflicted),
        MergeableState::Behind => Some(Verdict::Behind),
        _ => None,
    }
}

/// Full verdict for a candidate, given its check runs
///
/// Priority: conflict, behind, failed check, pending check, merge, hold.
/// No check runs at all counts as green.
pub fn assess_checks(state: MergeableState, checks: &[CheckRun]) -> Verdict {
    if let Some(verdict) = assess_mergeability(state) {
        return verdict;
    }

    let failing: Vec<String> = checks
        .iter()
        .filter(|run| run.is_failed())
        .map(|run| run.name.clone())
        .collect();
    if !failing.is_empty() {
        return Verdict::CiFailed { failing };
    }

    let pending: Vec<String> = checks
        .iter()
        .filter(|run| run.is_pending())
        .map(|run| run.name.clone())
        .collect();
    if !pending.is_empty() {
        return Verdict::AwaitingChecks { pending };
    }

    if state.is_mergeable() {
        Verdict::Merge
    } else {
        Verdict::Hold { state }
    }
}
