//! Configuration loading
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual keys. A missing default config file is not an error:
//! every key has a default except the GitHub credentials, which are only
//! checked when a command needs them.

use crate::error::{Error, Result};
use crate::queue::QueueLabels;
use crate::types::MergeMethod;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Directory name under the platform config dir
const CONFIG_DIR: &str = "pr-sisyphus";

/// Config filename
const CONFIG_FILE: &str = "config.toml";

/// Default staleness threshold for the lock label
pub const DEFAULT_STALE_LOCK_MINUTES: i64 = 15;

/// Default sweep fan-out
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default listen address for `sisyphus serve`
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub credentials and endpoint
    pub github: GitHubConfig,
    /// HTTP server
    pub server: ServerConfig,
    /// Queue behaviour
    pub queue: QueueSettings,
    /// Sweep driver
    pub sweep: SweepConfig,
}

/// GitHub credentials and endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub App ID
    pub app_id: Option<u64>,
    /// Path to the App's PEM private key
    pub private_key_path: Option<PathBuf>,
    /// Inline PEM private key (environment only)
    #[serde(skip)]
    pub private_key: Option<String>,
    /// Secret used to sign webhook deliveries
    pub webhook_secret: Option<String>,
    /// API base URL for GitHub Enterprise
    pub api_url: Option<Url>,
    /// Personal access token (environment only), used by `reconcile`
    #[serde(skip)]
    pub token: Option<String>,
}

impl GitHubConfig {
    /// App ID and PEM private key, or an error naming what is missing
    pub fn app_credentials(&self) -> Result<(u64, String)> {
        let app_id = self.app_id.ok_or_else(|| {
            Error::Auth("GitHub App ID not configured (github.app_id or GITHUB_APP_ID)".to_string())
        })?;

        if let Some(ref pem) = self.private_key {
            return Ok((app_id, pem.clone()));
        }

        let path = self.private_key_path.as_ref().ok_or_else(|| {
            Error::Auth(
                "GitHub App private key not configured (github.private_key_path, \
                 GITHUB_PRIVATE_KEY_PATH or GITHUB_PRIVATE_KEY)"
                    .to_string(),
            )
        })?;
        let pem = fs::read_to_string(path).map_err(|e| {
            Error::Auth(format!("failed to read private key {}: {e}", path.display()))
        })?;
        Ok((app_id, pem))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

/// Values the reconciliation engine reads on every pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Reserved label names
    pub labels: QueueLabels,
    /// Lock age (minutes since the PR was last updated) after which the
    /// lock is considered abandoned
    pub stale_lock_minutes: i64,
    /// Merge method used for queued PRs
    pub merge_method: MergeMethod,
    /// Remove trigger and lock labels after a successful merge
    pub cleanup_after_merge: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            labels: QueueLabels::default(),
            stale_lock_minutes: DEFAULT_STALE_LOCK_MINUTES,
            merge_method: MergeMethod::Squash,
            cleanup_after_merge: true,
        }
    }
}

impl QueueSettings {
    /// Staleness threshold as a duration
    ///
    /// Out-of-range values saturate; [`Config::validate`] rejects them first.
    pub fn stale_after(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.stale_lock_minutes).unwrap_or(TimeDelta::MAX)
    }
}

/// Sweep driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Maximum repositories reconciled at once
    pub max_concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Default config file location (`$XDG_CONFIG_HOME/pr-sisyphus/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. The default location is optional.
    /// Environment overrides are applied and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("GITHUB_APP_ID").and_then(|v| v.trim().parse().ok()) {
            self.github.app_id = Some(id);
        }
        if let Some(path) = non_empty("GITHUB_PRIVATE_KEY_PATH") {
            self.github.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(pem) = non_empty("GITHUB_PRIVATE_KEY") {
            // Some deployments flatten the PEM into one line with literal \n
            self.github.private_key = Some(pem.replace("\\n", "\n"));
        }
        if let Some(secret) = non_empty("GITHUB_WEBHOOK_SECRET") {
            self.github.webhook_secret = Some(secret);
        }
        if let Some(url) = non_empty("GITHUB_API_URL").and_then(|v| Url::parse(&v).ok()) {
            self.github.api_url = Some(url);
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(listen) = non_empty("SISYPHUS_LISTEN") {
            self.server.listen = listen;
        }
    }

    /// Reject settings the queue cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.stale_lock_minutes <= 0 {
            return Err(Error::Config(
                "queue.stale_lock_minutes must be positive".to_string(),
            ));
        }
        if TimeDelta::try_minutes(self.queue.stale_lock_minutes).is_none() {
            return Err(Error::Config(format!(
                "queue.stale_lock_minutes is too large: {}",
                self.queue.stale_lock_minutes
            )));
        }
        if self.sweep.max_concurrency == 0 {
            return Err(Error::Config(
                "sweep.max_concurrency must be at least 1".to_string(),
            ));
        }

        let labels = self.queue.labels.all();
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Config("queue label names must not be empty".to_string()));
        }
        let unique: HashSet<_> = labels.iter().collect();
        if unique.len() != labels.len() {
            return Err(Error::Config(
                "queue label names must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}
