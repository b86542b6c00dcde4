//! Label vocabulary
//!
//! Queue state lives entirely in four labels on GitHub. This module names
//! them, builds the issue-search queries that read them back, and renders the
//! comments the bot leaves when it changes them.

use crate::types::RepoRef;
use serde::{Deserialize, Serialize};

/// Label a human attaches to enqueue a PR
pub const DEFAULT_TRIGGER_LABEL: &str = "ready-to-merge";
/// Label marking the single PR currently being processed
pub const DEFAULT_LOCK_LABEL: &str = "processing-merge";
/// Terminal label for PRs with merge conflicts
pub const DEFAULT_CONFLICT_LABEL: &str = "error-conflict";
/// Terminal label for PRs with failing CI
pub const DEFAULT_FAIL_LABEL: &str = "error-ci";

/// Prefix on every comment the bot posts
pub const COMMENT_PREFIX: &str = "🤖 **Merge Bot:**";

/// The four reserved label names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueLabels {
    /// Enqueue request
    pub trigger: String,
    /// Lock held by the PR in flight
    pub lock: String,
    /// Terminal: merge conflict
    pub conflict: String,
    /// Terminal: CI failure
    pub fail: String,
}

impl Default for QueueLabels {
    fn default() -> Self {
        Self {
            trigger: DEFAULT_TRIGGER_LABEL.to_string(),
            lock: DEFAULT_LOCK_LABEL.to_string(),
            conflict: DEFAULT_CONFLICT_LABEL.to_string(),
            fail: DEFAULT_FAIL_LABEL.to_string(),
        }
    }
}

impl QueueLabels {
    /// All four names, in vocabulary order
    pub fn all(&self) -> [&str; 4] {
        [&self.trigger, &self.lock, &self.conflict, &self.fail]
    }

    /// Open PRs holding the lock
    pub fn locked_query(&self) -> LabelQuery {
        LabelQuery::new().with(&self.lock)
    }

    /// Open PRs waiting in the queue, oldest first
    pub fn candidates_query(&self) -> LabelQuery {
        LabelQuery::new()
            .with(&self.trigger)
            .without(&self.lock)
            .oldest_first()
    }

    /// Label to attach for a terminal failure
    pub fn for_failure(&self, kind: FailureKind) -> &str {
        match kind {
            FailureKind::Conflict => &self.conflict,
            FailureKind::Ci => &self.fail,
        }
    }
}

/// Filter over open PRs by label presence/absence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelQuery {
    /// Labels that must be present
    pub with: Vec<String>,
    /// Labels that must be absent
    pub without: Vec<String>,
    /// Sort by creation time, ascending
    pub oldest_first: bool,
}

impl LabelQuery {
    /// Empty query (all open PRs)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a label
    #[must_use]
    pub fn with(mut self, label: &str) -> Self {
        self.with.push(label.to_string());
        self
    }

    /// Exclude a label
    #[must_use]
    pub fn without(mut self, label: &str) -> Self {
        self.without.push(label.to_string());
        self
    }

    /// Sort results by creation time, ascending
    #[must_use]
    pub const fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    /// Whether a PR with `labels` satisfies the label filter
    pub fn matches<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        let has = |name: &String| labels.iter().any(|l| l.as_ref() == name);
        self.with.iter().all(has) && !self.without.iter().any(has)
    }

    /// Render as a GitHub issue-search `q` string scoped to `repo`
    pub fn to_search_query(&self, repo: &RepoRef) -> String {
        let mut q = format!("repo:{repo} is:pr is:open");
        for label in &self.with {
            q.push_str(&format!(" label:\"{label}\""));
        }
        for label in &self.without {
            q.push_str(&format!(" -label:\"{label}\""));
        }
        if self.oldest_first {
            q.push_str(" sort:created-asc");
        }
        q
    }
}

/// Why a PR was kicked out of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Merge conflicts with the base branch
    Conflict,
    /// A check run failed or timed out
    Ci,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Ci => write!(f, "ci"),
        }
    }
}

/// Comment posted when an abandoned lock is released
pub fn stale_lock_comment() -> String {
    format!("{COMMENT_PREFIX} Automation was stuck. I have reset the lock. Waiting for next cycle.")
}

/// Comment posted when a PR is kicked out of the queue
pub fn failure_comment(labels: &QueueLabels, kind: FailureKind, failing_checks: &[String]) -> String {
    match kind {
        FailureKind::Conflict => format!(
            "{COMMENT_PREFIX} Merge conflicts detected. Please resolve manually and re-apply `{}`.",
            labels.trigger
        ),
        FailureKind::Ci if failing_checks.is_empty() => format!(
            "{COMMENT_PREFIX} CI checks failed. Please fix and re-apply `{}`.",
            labels.trigger
        ),
        FailureKind::Ci => format!(
            "{COMMENT_PREFIX} CI checks failed ({}). Please fix and re-apply `{}`.",
            failing_checks.join(", "),
            labels.trigger
        ),
    }
}
