//! GitHub App authentication and installation discovery

use crate::error::{Error, Result};
use crate::platform::github::PER_PAGE;
use crate::platform::{GitHubService, InstallationDirectory, InstallationScope, PlatformService};
use crate::types::{Installation, RepoRef};
use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

// octocrab has no typed call for `/installation/repositories`.

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Deserialize)]
struct InstallationRepositories {
    total_count: usize,
    repositories: Vec<RepositoryItem>,
}

#[derive(Deserialize)]
struct RepositoryItem {
    name: String,
    owner: OwnerItem,
}

#[derive(Deserialize)]
struct OwnerItem {
    login: String,
}

/// Helper to convert an octocrab installation to our `Installation` type
fn installation_from_octocrab(item: &octocrab::models::Installation) -> Installation {
    Installation {
        id: item.id.into_inner(),
        account: Some(item.account.login.clone()),
    }
}

/// A GitHub App, identified by its ID and RSA private key
///
/// octocrab signs the App JWT for every App-level request. Installation
/// clients exchange it for an installation token on first use and reuse
/// that token until it expires.
#[derive(Clone)]
pub struct GitHubApp {
    client: Octocrab,
}

impl GitHubApp {
    /// Create an App from its ID and PEM-encoded RSA private key
    pub fn new(app_id: u64, private_key_pem: &str, api_url: Option<&Url>) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| Error::Auth(format!("invalid GitHub App private key: {e}")))?;

        let mut builder = Octocrab::builder().app(AppId(app_id), key);
        if let Some(url) = api_url {
            builder = builder
                .base_uri(url.as_str())
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;
        Ok(Self { client })
    }

    /// Client authenticated as one installation of the App
    fn installation_client(&self, installation_id: u64) -> Result<Octocrab> {
        debug!(installation = installation_id, "creating installation client");
        Ok(self.client.installation(InstallationId(installation_id))?)
    }

    /// Find the installation that covers a single repository
    pub async fn installation_for_repo(&self, repo: &RepoRef) -> Result<Installation> {
        debug!(%repo, "looking up repository installation");
        let item = self
            .client
            .apps()
            .get_repository_installation(&repo.owner, &repo.name)
            .await
            .map_err(|e| {
                let err = Error::from(e);
                if err.is_not_found() {
                    Error::Auth(format!("the GitHub App is not installed on {repo}"))
                } else {
                    err
                }
            })?;
        Ok(installation_from_octocrab(&item))
    }

    /// Platform service for the installation covering `repo`
    pub async fn service_for_repo(&self, repo: &RepoRef) -> Result<GitHubService> {
        let installation = self.installation_for_repo(repo).await?;
        Ok(GitHubService::new(
            self.installation_client(installation.id)?,
        ))
    }
}

/// Page through `/installation/repositories` with an installation client
async fn installation_repositories(client: &Octocrab) -> Result<Vec<RepoRef>> {
    let mut repos = Vec::new();
    let mut page = 1;
    loop {
        let response: InstallationRepositories = client
            .get(
                "/installation/repositories",
                Some(&PageParams {
                    per_page: PER_PAGE,
                    page,
                }),
            )
            .await?;

        let fetched = response.repositories.len();
        repos.extend(
            response
                .repositories
                .into_iter()
                .map(|r| RepoRef::new(r.owner.login, r.name)),
        );
        if fetched == 0 || repos.len() >= response.total_count {
            break;
        }
        page += 1;
    }
    Ok(repos)
}

#[async_trait]
impl InstallationDirectory for GitHubApp {
    async fn list_installations(&self) -> Result<Vec<Installation>> {
        debug!("listing installations");
        let first = self
            .client
            .apps()
            .installations()
            .per_page(PER_PAGE)
            .send()
            .await?;
        let items = self.client.all_pages(first).await?;

        let installations: Vec<Installation> =
            items.iter().map(installation_from_octocrab).collect();
        debug!(count = installations.len(), "listed installations");
        Ok(installations)
    }

    async fn open_installation(&self, installation: &Installation) -> Result<InstallationScope> {
        debug!(installation = installation.id, "listing installation repositories");
        let client = self.installation_client(installation.id)?;
        let repositories = installation_repositories(&client).await?;

        debug!(
            installation = installation.id,
            count = repositories.len(),
            "listed installation repositories"
        );
        // The same client, with its cached token, serves every pass
        Ok(InstallationScope {
            platform: Arc::new(GitHubService::new(client)),
            repositories,
        })
    }

    async fn platform_for(&self, installation_id: u64) -> Result<Arc<dyn PlatformService>> {
        let client = self.installation_client(installation_id)?;
        Ok(Arc::new(GitHubService::new(client)))
    }
}
