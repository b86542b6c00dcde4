//! Merge queue reconciliation engine
//!
//! Three-phase pattern, as in every pass:
//! 1. Gather - read label and PR state from GitHub (effectful, fresh each pass)
//! 2. Plan - classify the lock and the candidate (pure, testable)
//! 3. Execute - perform at most one transition (effectful)
//!
//! Queue state is never held in memory between passes. The only mutual
//! exclusion is the lock label, checked and then set without an atomic
//! compare-and-swap; two passes racing on the same repository can both
//! acquire, which the staleness threshold and GitHub's idempotent merge
//! bound.

mod execute;
mod labels;
mod plan;

pub use execute::{PassOutcome, PassReport, Reconciler};
pub use labels::{
    COMMENT_PREFIX, DEFAULT_CONFLICT_LABEL, DEFAULT_FAIL_LABEL, DEFAULT_LOCK_LABEL,
    DEFAULT_TRIGGER_LABEL, FailureKind, LabelQuery, QueueLabels, failure_comment,
    stale_lock_comment,
};
pub use plan::{LockState, StaleLock, Verdict, assess_checks, assess_locks, assess_mergeability};
