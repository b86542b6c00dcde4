//! Mock GitHub for queue tests
//!
//! Unlike a response table, this mock keeps PRs and their labels in memory
//! and applies every mutation, so consecutive reconciliation passes observe
//! each other's effects the way they would on GitHub. PRs are keyed by
//! repository and number; helpers without a repository argument use
//! `test_repo()`.

#![allow(dead_code)]

use super::test_repo;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use pr_sisyphus::error::{Error, Result};
use pr_sisyphus::platform::{InstallationDirectory, InstallationScope, PlatformService};
use pr_sisyphus::queue::LabelQuery;
use pr_sisyphus::types::{
    CheckConclusion, CheckRun, CheckStatus, Installation, MergeMethod, MergeResult,
    MergeableState, PrDetails, PrSummary, RepoRef,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed "now" used by the mock clock and by tests
pub fn t0() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z".parse().unwrap()
}

/// `t0()` shifted by `minutes`
pub fn at(minutes: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(minutes)
}

/// A PR as the mock stores it
#[derive(Debug, Clone)]
pub struct MockPr {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub mergeable_state: MergeableState,
    pub head_sha: String,
    pub open: bool,
    pub merged: bool,
    /// Search still reports the PR as open
    pub search_lags: bool,
}

impl MockPr {
    /// Open PR created `created_min` minutes relative to `t0()`
    pub fn new(number: u64, created_min: i64) -> Self {
        Self {
            number,
            created_at: at(created_min),
            updated_at: at(created_min),
            labels: Vec::new(),
            mergeable_state: MergeableState::Clean,
            head_sha: format!("sha{number}"),
            open: true,
            merged: false,
            search_lags: false,
        }
    }

    #[must_use]
    pub fn label(mut self, label: &str) -> Self {
        self.labels.push(label.to_string());
        self
    }

    #[must_use]
    pub const fn state(mut self, state: MergeableState) -> Self {
        self.mergeable_state = state;
        self
    }

    #[must_use]
    pub fn updated(mut self, minutes: i64) -> Self {
        self.updated_at = at(minutes);
        self
    }
}

/// Every gateway call the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search(String),
    GetPr(u64),
    AddLabel(u64, String),
    RemoveLabel(u64, String),
    Comment(u64, String),
    ListChecks(String),
    UpdateBranch(u64),
    Merge(u64, MergeMethod),
}

impl Call {
    /// Whether the call changes anything on GitHub
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Search(_) | Self::GetPr(_) | Self::ListChecks(_))
    }
}

/// Which gateway call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    Search,
    GetPr,
    AddLabel,
    RemoveLabel,
    Comment,
    ListChecks,
    UpdateBranch,
    Merge,
}

/// Stateful in-memory GitHub
pub struct MockPlatformService {
    prs: Mutex<BTreeMap<(RepoRef, u64), MockPr>>,
    checks: Mutex<HashMap<String, Vec<CheckRun>>>,
    clock: Mutex<DateTime<Utc>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<FailOn, String>>,
    merge_refusal: Mutex<Option<String>>,
    search_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockPlatformService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatformService {
    pub fn new() -> Self {
        Self {
            prs: Mutex::new(BTreeMap::new()),
            checks: Mutex::new(HashMap::new()),
            clock: Mutex::new(t0()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            merge_refusal: Mutex::new(None),
            search_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    // === Setup ===

    pub fn add_pr(&self, pr: MockPr) {
        self.add_pr_in(&test_repo(), pr);
    }

    pub fn add_pr_in(&self, repo: &RepoRef, pr: MockPr) {
        self.prs.lock().unwrap().insert((repo.clone(), pr.number), pr);
    }

    /// Attach check runs to a PR's head SHA
    pub fn set_checks(&self, pr_number: u64, runs: Vec<CheckRun>) {
        let sha = self.pr(pr_number).head_sha;
        self.checks.lock().unwrap().insert(sha, runs);
    }

    /// Time used for `updated_at` bumps on label changes and comments
    pub fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.lock().unwrap() = now;
    }

    pub fn set_mergeable_state(&self, pr_number: u64, state: MergeableState) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(&(test_repo(), pr_number)) {
            pr.mergeable_state = state;
        }
    }

    /// Close a PR without merging it while search results still list it
    pub fn close_pr_behind_search(&self, pr_number: u64) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(&(test_repo(), pr_number)) {
            pr.open = false;
            pr.search_lags = true;
        }
    }

    // === Error injection ===

    pub fn fail_on(&self, call: FailOn, msg: &str) {
        self.failures.lock().unwrap().insert(call, msg.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Make the merge endpoint answer `merged: false`
    pub fn refuse_merge(&self, msg: &str) {
        *self.merge_refusal.lock().unwrap() = Some(msg.to_string());
    }

    /// Make searches take a while, to observe concurrent passes
    pub fn delay_searches(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = Some(delay);
    }

    // === Inspection ===

    pub fn pr(&self, number: u64) -> MockPr {
        self.pr_in(&test_repo(), number)
    }

    pub fn pr_in(&self, repo: &RepoRef, number: u64) -> MockPr {
        self.prs
            .lock()
            .unwrap()
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_else(|| panic!("no PR {repo}#{number} in mock"))
    }

    pub fn labels(&self, number: u64) -> Vec<String> {
        self.pr(number).labels
    }

    pub fn has_label(&self, number: u64, label: &str) -> bool {
        self.labels(number).iter().any(|l| l == label)
    }

    /// Open PRs of `test_repo()` carrying `label`
    pub fn prs_with_label(&self, label: &str) -> Vec<u64> {
        let repo = test_repo();
        self.prs
            .lock()
            .unwrap()
            .iter()
            .filter(|((r, _), pr)| *r == repo && pr.open && pr.labels.iter().any(|l| l == label))
            .map(|(_, pr)| pr.number)
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn comments_on(&self, number: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Comment(n, body) if n == number => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn merge_count(&self, number: u64) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Merge(n, _) if *n == number))
            .count()
    }

    pub fn update_branch_count(&self, number: u64) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::UpdateBranch(n) if *n == number))
            .count()
    }

    /// Highest number of searches observed running at the same time
    pub fn max_concurrent_searches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    // === Assertions ===

    pub fn assert_no_mutations(&self) {
        let mutations = self.mutations();
        assert!(
            mutations.is_empty(),
            "Expected no mutating calls but got: {mutations:?}"
        );
    }

    pub fn assert_merge_called(&self, number: u64) {
        let calls = self.calls();
        assert!(
            calls.iter().any(|c| matches!(c, Call::Merge(n, _) if *n == number)),
            "Expected merge_pr({number}) but got: {calls:?}"
        );
    }

    pub fn assert_merge_not_called(&self) {
        let calls = self.calls();
        assert!(
            !calls.iter().any(|c| matches!(c, Call::Merge(..))),
            "Expected merge_pr NOT to be called but got: {calls:?}"
        );
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, call: FailOn) -> Result<()> {
        match self.failures.lock().unwrap().get(&call) {
            Some(msg) => Err(Error::GitHubApi(msg.clone())),
            None => Ok(()),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        *self.clock.lock().unwrap()
    }

    fn with_pr<T>(
        &self,
        repo: &RepoRef,
        number: u64,
        f: impl FnOnce(&mut MockPr) -> T,
    ) -> Result<T> {
        let mut prs = self.prs.lock().unwrap();
        prs.get_mut(&(repo.clone(), number))
            .map(f)
            .ok_or_else(|| Error::GitHubApi(format!("PR {repo}#{number} not found")))
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn search_open_prs(
        &self,
        repo: &RepoRef,
        query: &LabelQuery,
    ) -> Result<Vec<PrSummary>> {
        self.record(Call::Search(query.to_search_query(repo)));
        self.check_failure(FailOn::Search)?;

        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let prs = self.prs.lock().unwrap();
        let mut found: Vec<&MockPr> = prs
            .iter()
            .filter(|((r, _), pr)| {
                r == repo && (pr.open || pr.search_lags) && query.matches(&pr.labels)
            })
            .map(|(_, pr)| pr)
            .collect();
        if query.oldest_first {
            found.sort_by_key(|pr| pr.created_at);
        }

        Ok(found
            .into_iter()
            .map(|pr| PrSummary {
                number: pr.number,
                created_at: pr.created_at,
                updated_at: pr.updated_at,
            })
            .collect())
    }

    async fn get_pr(&self, repo: &RepoRef, number: u64) -> Result<PrDetails> {
        self.record(Call::GetPr(number));
        self.check_failure(FailOn::GetPr)?;

        self.with_pr(repo, number, |pr| PrDetails {
            number: pr.number,
            head_sha: pr.head_sha.clone(),
            mergeable_state: pr.mergeable_state,
            open: pr.open,
        })
    }

    async fn add_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        self.record(Call::AddLabel(number, label.to_string()));
        self.check_failure(FailOn::AddLabel)?;

        let now = self.now();
        self.with_pr(repo, number, |pr| {
            if !pr.labels.iter().any(|l| l == label) {
                pr.labels.push(label.to_string());
                pr.updated_at = now;
            }
        })
    }

    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        self.record(Call::RemoveLabel(number, label.to_string()));
        self.check_failure(FailOn::RemoveLabel)?;

        let now = self.now();
        self.with_pr(repo, number, |pr| {
            let before = pr.labels.len();
            pr.labels.retain(|l| l != label);
            if pr.labels.len() != before {
                pr.updated_at = now;
            }
        })
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()> {
        self.record(Call::Comment(number, body.to_string()));
        self.check_failure(FailOn::Comment)?;

        let now = self.now();
        self.with_pr(repo, number, |pr| pr.updated_at = now)
    }

    async fn list_check_runs(&self, _repo: &RepoRef, head_sha: &str) -> Result<Vec<CheckRun>> {
        self.record(Call::ListChecks(head_sha.to_string()));
        self.check_failure(FailOn::ListChecks)?;

        Ok(self
            .checks
            .lock()
            .unwrap()
            .get(head_sha)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_branch(&self, _repo: &RepoRef, number: u64) -> Result<()> {
        self.record(Call::UpdateBranch(number));
        self.check_failure(FailOn::UpdateBranch)
    }

    async fn merge_pr(
        &self,
        repo: &RepoRef,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult> {
        self.record(Call::Merge(number, method));
        self.check_failure(FailOn::Merge)?;

        if let Some(msg) = self.merge_refusal.lock().unwrap().clone() {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: Some(msg),
            });
        }

        let now = self.now();
        self.with_pr(repo, number, |pr| {
            if !pr.open {
                return Err(Error::GitHubApi(format!("PR #{number} is not open")));
            }
            pr.open = false;
            pr.merged = true;
            pr.updated_at = now;
            Ok(MergeResult {
                merged: true,
                sha: Some(format!("merge-{number}")),
                message: None,
            })
        })?
    }
}

/// Installation directory backed by mocks
#[derive(Default)]
pub struct MockDirectory {
    installations: Vec<Installation>,
    repos: HashMap<u64, Vec<RepoRef>>,
    platforms: HashMap<u64, Arc<MockPlatformService>>,
    broken_installations: HashSet<u64>,
    fail_listing: Option<String>,
    opened: Mutex<HashMap<u64, usize>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installation with its repositories and backing mock
    pub fn add_installation(
        &mut self,
        id: u64,
        repos: &[&str],
        platform: Arc<MockPlatformService>,
    ) {
        self.installations.push(Installation {
            id,
            account: Some(format!("account-{id}")),
        });
        self.repos.insert(
            id,
            repos.iter().map(|r| r.parse().unwrap()).collect(),
        );
        self.platforms.insert(id, platform);
    }

    /// Make listing repositories of `id` fail
    pub fn break_installation(&mut self, id: u64) {
        self.broken_installations.insert(id);
    }

    /// Make listing installations fail
    pub fn fail_listing(&mut self, msg: &str) {
        self.fail_listing = Some(msg.to_string());
    }

    /// How many times installation `id` was authenticated for a sweep
    pub fn open_count(&self, id: u64) -> usize {
        self.opened.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl InstallationDirectory for MockDirectory {
    async fn list_installations(&self) -> Result<Vec<Installation>> {
        if let Some(msg) = &self.fail_listing {
            return Err(Error::GitHubApi(msg.clone()));
        }
        Ok(self.installations.clone())
    }

    async fn open_installation(&self, installation: &Installation) -> Result<InstallationScope> {
        *self.opened.lock().unwrap().entry(installation.id).or_default() += 1;
        if self.broken_installations.contains(&installation.id) {
            return Err(Error::Auth(format!(
                "installation {} suspended",
                installation.id
            )));
        }
        Ok(InstallationScope {
            platform: self.platform_for(installation.id).await?,
            repositories: self.repos.get(&installation.id).cloned().unwrap_or_default(),
        })
    }

    async fn platform_for(&self, installation_id: u64) -> Result<Arc<dyn PlatformService>> {
        let platform = self
            .platforms
            .get(&installation_id)
            .cloned()
            .ok_or_else(|| Error::Auth(format!("unknown installation {installation_id}")))?;
        Ok(platform as Arc<dyn PlatformService>)
    }
}

/// Check run helpers
pub fn passed(name: &str) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status: CheckStatus::Completed,
        conclusion: Some(CheckConclusion::Success),
    }
}

pub fn failed(name: &str) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status: CheckStatus::Completed,
        conclusion: Some(CheckConclusion::Failure),
    }
}

pub fn running(name: &str) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status: CheckStatus::InProgress,
        conclusion: None,
    }
}
