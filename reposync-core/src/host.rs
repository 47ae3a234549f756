//! Seams to the external collaborators: the hosting provider and the user store

use async_trait::async_trait;

use crate::{RemoteRepository, Result, UserCredential};

/// A source-control hosting provider that can create repositories
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Name of this provider, for logs
    fn name(&self) -> &'static str;

    /// Create a private repository initialized with a default file
    ///
    /// Fails with `ProviderAuth`, `ProviderConflict` or `ProviderUnavailable`.
    async fn create_repository(
        &self,
        credential: &UserCredential,
        name: &str,
        description: &str,
    ) -> Result<RemoteRepository>;

    /// Look up one of the user's repositories by exact name
    async fn find_repository(
        &self,
        credential: &UserCredential,
        name: &str,
    ) -> Result<Option<RemoteRepository>>;
}

/// Read-only access to users' provider credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when the user has no credential
    async fn get_credential(&self, user_id: &str) -> Result<Option<UserCredential>>;
}
