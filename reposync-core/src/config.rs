//! Configuration management for reposync
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (REPOSYNC_*)
//! 3. Config file (~/.config/reposync/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Git-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub program: String,

    /// Upper bound for any single git invocation
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Primary branch name expected by the hosting provider
    pub branch: String,

    /// Name of the remote used for pushing
    pub remote: String,

    /// Identity used for commits and rebased commits
    pub author_name: String,
    pub author_email: String,

    /// Message of the commit created from the workspace
    pub commit_message: String,

    /// File written into an empty workspace so it can be committed
    pub placeholder: String,

    /// Extra `key=value` settings passed to every invocation as `git -c`
    pub extra_config: Vec<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            timeout: Duration::from_secs(120),
            branch: "main".to_string(),
            remote: "origin".to_string(),
            author_name: "reposync".to_string(),
            author_email: "reposync@localhost".to_string(),
            commit_message: "Initial commit: generated project".to_string(),
            placeholder: ".gitkeep".to_string(),
            extra_config: Vec::new(),
        }
    }
}

/// Hosting provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider's REST API
    pub api_url: String,

    /// Timeout for a single API request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts for repository creation when the provider is unavailable
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for each later one
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://gitlab.com/api/v4".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    pub provider: ProviderConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/reposync/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reposync").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - REPOSYNC_GIT: Path to git executable
    /// - REPOSYNC_API_URL: Provider API base URL
    /// - REPOSYNC_BRANCH: Primary branch name
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(program) = std::env::var("REPOSYNC_GIT") {
            self.git.program = program;
        }

        if let Ok(api_url) = std::env::var("REPOSYNC_API_URL") {
            self.provider.api_url = api_url;
        }

        if let Ok(branch) = std::env::var("REPOSYNC_BRANCH") {
            self.git.branch = branch;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        api_url: Option<String>,
        git_timeout: Option<Duration>,
    ) -> Self {
        if let Some(url) = api_url {
            self.provider.api_url = url;
        }

        if let Some(timeout) = git_timeout {
            self.git.timeout = timeout;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        api_url: Option<String>,
        git_timeout: Option<Duration>,
    ) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()
            .with_cli_overrides(api_url, git_timeout);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every sync fail
    pub fn validate(&self) -> Result<()> {
        if self.git.branch.trim().is_empty() {
            return Err(Error::Config("git.branch must not be empty".to_string()));
        }
        if self.git.remote.trim().is_empty() {
            return Err(Error::Config("git.remote must not be empty".to_string()));
        }
        if self.git.placeholder.trim().is_empty() || self.git.placeholder.contains('/') {
            return Err(Error::Config(
                "git.placeholder must be a plain file name".to_string(),
            ));
        }
        if self.git.timeout.is_zero() {
            return Err(Error::Config("git.timeout must be positive".to_string()));
        }
        if self.provider.max_attempts == 0 {
            return Err(Error::Config(
                "provider.max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = self.git.extra_config.iter().find(|kv| !kv.contains('=')) {
            return Err(Error::Config(format!(
                "git.extra_config entry '{}' is not key=value",
                bad
            )));
        }
        Ok(())
    }
}
