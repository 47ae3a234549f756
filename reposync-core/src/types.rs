//! Data model shared by every sync component

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::credentials::redact_token;
use crate::error::ErrorKind;
use crate::{Error, Result};

/// A request to publish one workspace as a new remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    /// Owner of the credential used for the provider and the push
    pub user_id: String,
    /// Directory holding the generated project
    pub workspace_path: PathBuf,
    /// Name of the repository to create
    pub repository_name: String,
    /// Description shown by the provider
    pub description: String,
}

impl PushRequest {
    pub fn new(
        user_id: impl Into<String>,
        workspace_path: impl Into<PathBuf>,
        repository_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            workspace_path: workspace_path.into(),
            repository_name: repository_name.into(),
            description: description.into(),
        }
    }

    /// Reject requests no provider would accept
    ///
    /// Names follow the provider's project-name rules: letters, digits, `_`,
    /// `.`, `-`, `+` and spaces, starting with a letter, digit or `_`. The
    /// provider still has the final say when the repository is created.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidRequest("user id is empty".to_string()));
        }

        let name = self.repository_name.as_str();
        if name.trim().is_empty() {
            return Err(Error::InvalidRequest("repository name is empty".to_string()));
        }
        if !name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(Error::InvalidRequest(format!(
                "repository name '{}' must start with a letter, digit or '_'",
                name
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | ' ')))
        {
            return Err(Error::InvalidRequest(format!(
                "repository name '{}' contains invalid character '{}'",
                name, c
            )));
        }

        if self.workspace_path.as_os_str().is_empty() {
            return Err(Error::InvalidRequest("workspace path is empty".to_string()));
        }

        Ok(())
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace_path
    }
}

/// Bearer credential for the hosting provider, read from the user store
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredential {
    pub user_id: String,
    pub bearer_token: String,
}

impl UserCredential {
    pub fn new(user_id: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            bearer_token: bearer_token.into(),
        }
    }
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("user_id", &self.user_id)
            .field("bearer_token", &redact_token(&self.bearer_token))
            .finish()
    }
}

/// A repository created on the hosting provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    /// Provider identifier
    pub id: String,
    /// URL used for git transport
    pub http_url: String,
    /// URL shown to humans
    pub web_url: String,
}

/// Result of staging and committing a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// False when nothing changed since the last commit
    pub created: bool,
}

/// The single value handed back to the caller of a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    /// Web URL of the repository on success, empty otherwise
    pub repository_url: String,
    /// Classified failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Non-fatal problem after a successful push (cleanup failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Repository known at the end of the run, so a retry can skip provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RemoteRepository>,
}

impl SyncOutcome {
    pub fn succeeded(repository: RemoteRepository, warning: Option<String>) -> Self {
        Self {
            success: true,
            message: "Project successfully pushed".to_string(),
            repository_url: repository.web_url.clone(),
            error_kind: None,
            warning,
            repository: Some(repository),
        }
    }

    pub fn failed(error: &Error, repository: Option<RemoteRepository>) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            repository_url: String::new(),
            error_kind: Some(error.kind()),
            warning: None,
            repository,
        }
    }
}
