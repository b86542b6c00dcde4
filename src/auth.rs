//! Credential resolution
//!
//! The server and the sweep always act as a GitHub App. A one-off
//! `reconcile` can also run with a personal access token.

use crate::config::GitHubConfig;
use crate::error::{Error, Result};
use crate::platform::{GitHubApp, GitHubService, PlatformService};
use crate::types::RepoRef;
use tracing::debug;

/// Where the credentials for a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// GitHub App ID and private key
    App,
    /// Personal access token from `GITHUB_TOKEN`
    Token,
}

/// Build the App client from configuration
pub fn github_app(config: &GitHubConfig) -> Result<GitHubApp> {
    let (app_id, pem) = config.app_credentials()?;
    GitHubApp::new(app_id, &pem, config.api_url.as_ref())
}

/// Which credentials a single-repository command will use
///
/// App credentials win when an App ID is configured; otherwise a personal
/// token is required.
pub fn auth_source(config: &GitHubConfig) -> Result<AuthSource> {
    if config.app_id.is_some() {
        Ok(AuthSource::App)
    } else if config.token.is_some() {
        Ok(AuthSource::Token)
    } else {
        Err(Error::Auth(
            "no GitHub credentials: configure a GitHub App or set GITHUB_TOKEN".to_string(),
        ))
    }
}

/// Platform service scoped to one repository
pub async fn platform_for_repo(
    config: &GitHubConfig,
    repo: &RepoRef,
) -> Result<Box<dyn PlatformService>> {
    let source = auth_source(config)?;
    debug!(%repo, ?source, "resolving GitHub credentials");

    match source {
        AuthSource::App => {
            let app = github_app(config)?;
            Ok(Box::new(app.service_for_repo(repo).await?))
        }
        AuthSource::Token => {
            let token = config.token.as_deref().unwrap_or_default();
            Ok(Box::new(GitHubService::with_token(
                token,
                config.api_url.as_ref(),
            )?))
        }
    }
}
