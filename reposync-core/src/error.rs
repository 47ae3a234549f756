//! Error types for repository synchronization

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reposync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reposync operations
///
/// Every step of a sync either succeeds or fails with one of these variants.
/// Callers branch on [`Error::kind`] rather than on message text.
#[derive(Error, Debug)]
pub enum Error {
    /// A URL that cannot carry a credential (missing or insecure scheme)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The hosting provider rejected the credential
    #[error("Provider rejected the credential: {0}. Reconnect your account and try again.")]
    ProviderAuth(String),

    /// A repository with the requested name already exists
    #[error("Repository '{0}' already exists. Choose a different name.")]
    ProviderConflict(String),

    /// Transient network failure, 5xx response or timeout talking to the provider
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider answered with something we could not classify
    #[error("Provider error: {0}")]
    Provider(String),

    /// Filesystem-level failure in the workspace
    #[error("Workspace IO error: {0}")]
    WorkspaceIo(String),

    /// Upstream history could not be replayed without conflicts
    #[error("Integration conflict: {0}")]
    IntegrationConflict(String),

    /// Push rejected after the single integrate-and-retry
    #[error("Push rejected: {0}")]
    PushRejected(String),

    /// Git failed for an unrecognized reason, or could not be run at all
    #[error("Git error: {0}")]
    SyncTool(String),

    /// The push request itself is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration or secrets error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller aborted the sync
    #[error("Sync cancelled")]
    Cancelled,
}

impl Error {
    /// Classification of this error for callers and outcomes
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Error::ProviderAuth(_) => ErrorKind::ProviderAuth,
            Error::ProviderConflict(_) => ErrorKind::ProviderConflict,
            Error::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Error::Provider(_) => ErrorKind::Provider,
            Error::WorkspaceIo(_) => ErrorKind::WorkspaceIo,
            Error::IntegrationConflict(_) => ErrorKind::IntegrationConflict,
            Error::PushRejected(_) => ErrorKind::PushRejected,
            Error::SyncTool(_) => ErrorKind::SyncTool,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Wrap an IO error with the path it happened on
    pub(crate) fn workspace_io(path: &std::path::Path, err: std::io::Error) -> Self {
        Error::WorkspaceIo(format!("{}: {}", path.display(), err))
    }
}

/// Copyable classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    ProviderAuth,
    ProviderConflict,
    ProviderUnavailable,
    Provider,
    WorkspaceIo,
    IntegrationConflict,
    PushRejected,
    SyncTool,
    InvalidRequest,
    Config,
    Cancelled,
}

impl ErrorKind {
    /// Whether the provisioner retries this kind automatically
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::ProviderUnavailable)
    }
}
