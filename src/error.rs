//! Error types for pr-sisyphus

use thiserror::Error;

/// Errors surfaced by the queue, the GitHub gateway and the service shell
#[derive(Debug, Error)]
pub enum Error {
    /// Error returned by octocrab (transport, HTTP status, decoding)
    #[error("GitHub API error: {0}")]
    GitHub(#[from] octocrab::Error),

    /// GitHub API call that failed in a way octocrab does not describe
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository slug could not be parsed
    #[error("invalid repository: {0}")]
    InvalidRepo(String),

    /// Missing or unusable credentials
    #[error("authentication error: {0}")]
    Auth(String),

    /// Webhook delivery rejected
    #[error("webhook error: {0}")]
    Webhook(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (task join failures and the like)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether GitHub answered 404 Not Found
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::GitHub(octocrab::Error::GitHub { source, .. }) => {
                source.status_code.as_u16() == 404
            }
            _ => false,
        }
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
