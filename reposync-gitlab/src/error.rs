//! Error types for GitLab operations

use thiserror::Error;

/// Result type for GitLab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to the GitLab API
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure: connect, timeout, TLS, body read
    #[error("GitLab request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Token missing, expired or lacking scope
    #[error("GitLab rejected the token ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Project name or path already used in the namespace
    #[error("GitLab project '{0}' already exists")]
    NameTaken(String),

    /// Any other non-success status
    #[error("GitLab returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Unexpected GitLab response: {0}")]
    Parse(String),

    /// API base URL could not be parsed
    #[error("Invalid GitLab API URL '{0}'")]
    InvalidApiUrl(String),
}

impl Error {
    /// Whether a later attempt could succeed without any change
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<Error> for reposync_core::Error {
    fn from(err: Error) -> Self {
        use reposync_core::Error as Core;

        if err.is_transient() {
            return Core::ProviderUnavailable(err.to_string());
        }
        match err {
            Error::Auth { .. } => Core::ProviderAuth(err.to_string()),
            Error::NameTaken(name) => Core::ProviderConflict(name),
            Error::InvalidApiUrl(_) => Core::Config(err.to_string()),
            other => Core::Provider(other.to_string()),
        }
    }
}
