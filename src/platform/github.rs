//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::queue::LabelQuery;
use crate::types::{
    CheckConclusion, CheckRun, CheckStatus, MergeMethod, MergeResult, MergeableState, PrDetails,
    PrSummary, RepoRef,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::IssueState;
use octocrab::models::pulls::MergeableState as GhMergeableState;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Page size for list endpoints
pub(crate) const PER_PAGE: u8 = 100;

// octocrab's check run model has no `status`, so check runs are read
// through a raw route with these wire types.

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    total_count: usize,
    check_runs: Vec<CheckRunItem>,
}

#[derive(Deserialize)]
struct CheckRunItem {
    name: String,
    status: String,
    conclusion: Option<String>,
}

impl From<CheckRunItem> for CheckRun {
    fn from(run: CheckRunItem) -> Self {
        Self {
            name: run.name,
            status: CheckStatus::parse(&run.status),
            conclusion: run.conclusion.as_deref().map(CheckConclusion::parse),
        }
    }
}

/// Helper to convert octocrab's mergeability to ours
const fn mergeable_state_from_octocrab(state: Option<&GhMergeableState>) -> MergeableState {
    match state {
        Some(GhMergeableState::Clean) => MergeableState::Clean,
        Some(GhMergeableState::Dirty) => MergeableState::Dirty,
        Some(GhMergeableState::Behind) => MergeableState::Behind,
        Some(GhMergeableState::Unstable) => MergeableState::Unstable,
        Some(GhMergeableState::HasHooks) => MergeableState::HasHooks,
        Some(GhMergeableState::Blocked) => MergeableState::Blocked,
        Some(GhMergeableState::Draft) => MergeableState::Draft,
        _ => MergeableState::Unknown,
    }
}

/// Helper to convert octocrab PR to our `PrDetails` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PrDetails {
    PrDetails {
        number: pr.number,
        head_sha: pr.head.sha.clone(),
        mergeable_state: mergeable_state_from_octocrab(pr.mergeable_state.as_ref()),
        open: matches!(pr.state, Some(IssueState::Open)),
    }
}

/// GitHub service using octocrab
///
/// Wraps a client that is already authenticated, either as an App
/// installation or with a personal access token.
#[derive(Clone)]
pub struct GitHubService {
    client: Octocrab,
}

impl GitHubService {
    /// Wrap an authenticated octocrab client
    pub const fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Create a service authenticated with a personal access token
    pub fn with_token(token: &str, api_url: Option<&Url>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        if let Some(url) = api_url {
            builder = builder
                .base_uri(url.as_str())
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn search_open_prs(
        &self,
        repo: &RepoRef,
        query: &LabelQuery,
    ) -> Result<Vec<PrSummary>> {
        let q = query.to_search_query(repo);
        debug!(%repo, q = %q, "searching PRs");

        let page = self
            .client
            .search()
            .issues_and_pull_requests(&q)
            .per_page(PER_PAGE)
            .send()
            .await?;
        let issues = self.client.all_pages(page).await?;

        let result: Vec<PrSummary> = issues
            .into_iter()
            .map(|issue| PrSummary {
                number: issue.number,
                created_at: issue.created_at,
                updated_at: issue.updated_at,
            })
            .collect();
        debug!(%repo, count = result.len(), "searched PRs");
        Ok(result)
    }

    async fn get_pr(&self, repo: &RepoRef, number: u64) -> Result<PrDetails> {
        debug!(%repo, number, "getting PR");
        let pr = self
            .client
            .pulls(&repo.owner, &repo.name)
            .get(number)
            .await?;

        let details = pr_from_octocrab(&pr);
        debug!(%repo, number, state = %details.mergeable_state, open = details.open, "got PR");
        Ok(details)
    }

    async fn add_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        debug!(%repo, number, label, "adding label");
        self.client
            .issues(&repo.owner, &repo.name)
            .add_labels(number, &[label.to_string()])
            .await?;
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        debug!(%repo, number, label, "removing label");
        let result = self
            .client
            .issues(&repo.owner, &repo.name)
            .remove_label(number, label)
            .await
            .map_err(Error::from);

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(%repo, number, label, "label was not present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()> {
        debug!(%repo, number, "creating PR comment");
        self.client
            .issues(&repo.owner, &repo.name)
            .create_comment(number, body)
            .await?;
        Ok(())
    }

    async fn list_check_runs(&self, repo: &RepoRef, head_sha: &str) -> Result<Vec<CheckRun>> {
        debug!(%repo, head_sha, "listing check runs");
        let route = format!(
            "/repos/{}/{}/commits/{head_sha}/check-runs",
            repo.owner, repo.name
        );

        let mut runs = Vec::new();
        let mut page = 1;
        loop {
            let response: CheckRunsResponse = self
                .client
                .get(
                    &route,
                    Some(&PageParams {
                        per_page: PER_PAGE,
                        page,
                    }),
                )
                .await?;

            let fetched = response.check_runs.len();
            runs.extend(response.check_runs.into_iter().map(CheckRun::from));

            if fetched == 0 || runs.len() >= response.total_count {
                break;
            }
            page += 1;
        }

        debug!(%repo, head_sha, count = runs.len(), "listed check runs");
        Ok(runs)
    }

    async fn update_branch(&self, repo: &RepoRef, number: u64) -> Result<()> {
        debug!(%repo, number, "updating PR branch");
        let accepted = self
            .client
            .pulls(&repo.owner, &repo.name)
            .update_branch(number)
            .await?;

        // octocrab reports any answer other than 202 Accepted as `false`
        if !accepted {
            return Err(Error::GitHubApi(format!(
                "GitHub did not accept the branch update for {repo}#{number}"
            )));
        }
        Ok(())
    }

    async fn merge_pr(
        &self,
        repo: &RepoRef,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult> {
        debug!(%repo, number, %method, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let result = self
            .client
            .pulls(&repo.owner, &repo.name)
            .merge(number)
            .method(octocrab_method)
            .send()
            .await?;

        let merge_result = MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        };

        debug!(
            %repo,
            number,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }
}
