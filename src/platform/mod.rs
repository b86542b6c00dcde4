//! Platform services for GitHub
//!
//! The queue talks to GitHub only through these traits, so the
//! reconciliation engine can be driven by an in-memory mock in tests.

mod app;
mod github;

pub use app::GitHubApp;
pub use github::GitHubService;

use crate::error::Result;
use crate::queue::LabelQuery;
use crate::types::{
    CheckRun, Installation, MergeMethod, MergeResult, PrDetails, PrSummary, RepoRef,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Platform service trait for the PR operations the merge queue needs
///
/// Every call is an independent, fallible round-trip. Implementations must
/// not cache label state between calls.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Search open PRs in `repo` matching a label filter
    async fn search_open_prs(&self, repo: &RepoRef, query: &LabelQuery)
    -> Result<Vec<PrSummary>>;

    /// Fetch the full PR record (head SHA, mergeability, open state)
    async fn get_pr(&self, repo: &RepoRef, number: u64) -> Result<PrDetails>;

    /// Attach a label. Adding a label that is already present is a no-op.
    async fn add_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()>;

    /// Detach a label. Removing an absent label is not an error.
    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()>;

    /// Post a comment on a PR
    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()>;

    /// List every check run attached to a commit
    async fn list_check_runs(&self, repo: &RepoRef, head_sha: &str) -> Result<Vec<CheckRun>>;

    /// Merge the base branch into the PR's head branch
    ///
    /// GitHub performs the update asynchronously; the result is only
    /// observable through a later `synchronize` event.
    async fn update_branch(&self, repo: &RepoRef, number: u64) -> Result<()>;

    /// Merge a PR with the specified method
    async fn merge_pr(&self, repo: &RepoRef, number: u64, method: MergeMethod)
    -> Result<MergeResult>;
}

/// An installation's repositories and a service authenticated for them
pub struct InstallationScope {
    /// Service acting as the installation
    pub platform: Arc<dyn PlatformService>,
    /// Repositories the installation has granted access to
    pub repositories: Vec<RepoRef>,
}

/// Enumerates App installations and hands out installation-scoped services
#[async_trait]
pub trait InstallationDirectory: Send + Sync {
    /// All installations of the App
    async fn list_installations(&self) -> Result<Vec<Installation>>;

    /// Authenticate as an installation once and list its repositories
    ///
    /// The returned platform reuses the credentials obtained for the
    /// listing, so sweeping an installation costs one token exchange.
    async fn open_installation(&self, installation: &Installation) -> Result<InstallationScope>;

    /// Platform service authenticated as the given installation
    async fn platform_for(&self, installation_id: u64) -> Result<Arc<dyn PlatformService>>;
}
