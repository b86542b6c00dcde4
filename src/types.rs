//! Core types for pr-sisyphus
//!
//! Everything here is a snapshot of state owned by GitHub. Nothing is cached
//! between reconciliation passes.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A repository, identified by owner and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepoRef {
    /// Create a repository reference
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches(".git");
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::InvalidRepo(format!(
                "expected <owner>/<name>, got '{s}'"
            ))),
        }
    }
}

/// Partial PR record as returned by issue search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSummary {
    /// PR number
    pub number: u64,
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Last time anything on the PR changed (labels included)
    pub updated_at: DateTime<Utc>,
}

/// Full PR record from a direct fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    /// PR number
    pub number: u64,
    /// Head commit SHA
    pub head_sha: String,
    /// GitHub's mergeability classification
    pub mergeable_state: MergeableState,
    /// Whether the PR is still open
    pub open: bool,
}

/// GitHub's `mergeable_state` classification for a PR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    /// Mergeable, all requirements satisfied
    Clean,
    /// Merge conflicts with the base branch
    Dirty,
    /// Head branch is behind the base branch
    Behind,
    /// Mergeable, but with non-passing commit statuses
    Unstable,
    /// Mergeable, with passing pre-receive hooks
    HasHooks,
    /// Blocked by branch protection
    Blocked,
    /// Draft PR
    Draft,
    /// Not computed yet, or a value we do not recognize
    #[default]
    #[serde(other)]
    Unknown,
}

impl MergeableState {
    /// Parse GitHub's string form; unrecognized values map to `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw {
            "clean" => Self::Clean,
            "dirty" => Self::Dirty,
            "behind" => Self::Behind,
            "unstable" => Self::Unstable,
            "has_hooks" => Self::HasHooks,
            "blocked" => Self::Blocked,
            "draft" => Self::Draft,
            _ => Self::Unknown,
        }
    }

    /// States in which the queue is willing to request a merge
    pub const fn is_mergeable(self) -> bool {
        matches!(self, Self::Clean | Self::HasHooks | Self::Unstable)
    }
}

impl fmt::Display for MergeableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Behind => "behind",
            Self::Unstable => "unstable",
            Self::HasHooks => "has_hooks",
            Self::Blocked => "blocked",
            Self::Draft => "draft",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Check run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Waiting for a runner
    Queued,
    /// Running
    InProgress,
    /// Finished, see the conclusion
    Completed,
    /// `waiting`, `requested`, `pending` and anything newer
    #[serde(other)]
    Pending,
}

impl CheckStatus {
    /// Parse GitHub's string form
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

/// Conclusion of a completed check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    /// Passed
    Success,
    /// Failed
    Failure,
    /// Ran out of time
    TimedOut,
    /// Neither passed nor failed
    Neutral,
    /// Cancelled before completion
    Cancelled,
    /// Skipped
    Skipped,
    /// Needs a human
    ActionRequired,
    /// Superseded
    Stale,
    /// Anything GitHub adds later
    #[serde(other)]
    Other,
}

impl CheckConclusion {
    /// Parse GitHub's string form
    pub fn parse(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "timed_out" => Self::TimedOut,
            "neutral" => Self::Neutral,
            "cancelled" => Self::Cancelled,
            "skipped" => Self::Skipped,
            "action_required" => Self::ActionRequired,
            "stale" => Self::Stale,
            _ => Self::Other,
        }
    }
}

/// A CI check run attached to a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    /// Check name as shown in the GitHub UI
    pub name: String,
    /// Current status
    pub status: CheckStatus,
    /// Conclusion, present once completed
    pub conclusion: Option<CheckConclusion>,
}

impl CheckRun {
    /// Whether this run counts as a CI failure for the queue
    pub const fn is_failed(&self) -> bool {
        matches!(
            self.conclusion,
            Some(CheckConclusion::Failure | CheckConclusion::TimedOut)
        )
    }

    /// Whether this run has not finished yet
    pub fn is_pending(&self) -> bool {
        self.status != CheckStatus::Completed
    }
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    #[default]
    Squash,
    /// Create a merge commit
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// Result of a merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// A GitHub App installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Installation ID
    pub id: u64,
    /// Login of the account the App is installed on
    pub account: Option<String>,
}
