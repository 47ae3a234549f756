//! Repository creation with a safe retry policy
//!
//! Creating a repository is not idempotent. After an `Unavailable` failure the
//! request may still have succeeded on the provider side, so every retry first
//! looks the repository up and only re-issues the create when it is absent.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::host::RepositoryHost;
use crate::{Error, RemoteRepository, Result, UserCredential};

/// Creates remote repositories through a [`RepositoryHost`]
#[derive(Clone)]
pub struct RepositoryProvisioner {
    host: Arc<dyn RepositoryHost>,
    max_attempts: u32,
    backoff: Duration,
}

impl std::fmt::Debug for RepositoryProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryProvisioner")
            .field("host", &self.host.name())
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl RepositoryProvisioner {
    pub fn new(host: Arc<dyn RepositoryHost>, config: &ProviderConfig) -> Self {
        Self {
            host,
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff,
        }
    }

    /// The underlying host
    pub fn host(&self) -> &Arc<dyn RepositoryHost> {
        &self.host
    }

    /// Delay before attempt `attempt` (2-based)
    fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << (attempt.saturating_sub(2)).min(16))
    }

    /// Create a private, pre-initialized repository
    ///
    /// Auth and conflict failures are returned immediately. Unavailability is
    /// retried with exponential backoff up to the configured attempt count.
    pub async fn create_repository(
        &self,
        credential: &UserCredential,
        name: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteRepository> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.delay_before(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                }

                match self.host.find_repository(credential, name).await {
                    Ok(Some(existing)) => {
                        info!(repository = %name, id = %existing.id, "Repository was created by an earlier attempt");
                        return Ok(existing);
                    }
                    Ok(None) => {}
                    Err(e @ Error::ProviderUnavailable(_)) => {
                        // Cannot tell whether the earlier create landed; do not risk a duplicate
                        warn!(repository = %name, attempt, error = %e, "Lookup before retry failed");
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            info!(provider = self.host.name(), repository = %name, attempt, "Creating repository");
            match self.host.create_repository(credential, name, description).await {
                Ok(repo) => {
                    info!(repository = %name, id = %repo.id, url = %repo.web_url, "Repository created");
                    return Ok(repo);
                }
                Err(e @ Error::ProviderUnavailable(_)) => {
                    warn!(repository = %name, attempt, max_attempts = self.max_attempts, error = %e, "Provider unavailable");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::ProviderUnavailable(format!("could not create repository '{}'", name))
        }))
    }

    /// Look a repository up by name without creating anything
    pub async fn find_repository(
        &self,
        credential: &UserCredential,
        name: &str,
    ) -> Result<Option<RemoteRepository>> {
        self.host.find_repository(credential, name).await
    }
}
