//! Reposync Core - publish generated project workspaces as hosted git repositories
//!
//! A sync provisions a repository through a [`RepositoryHost`], commits the
//! workspace, rebases onto the provider's initial commit, pushes, and then
//! empties the workspace for the next project. Every step re-probes disk and
//! remote state, so a failed request can simply be retried.

pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod host;
pub mod provisioner;
pub mod secrets;
pub mod sync;
pub mod types;

pub use config::{Config, GitConfig, ProviderConfig};
pub use credentials::{inject, redact_token, strip_credentials};
pub use error::{Error, ErrorKind, Result};
pub use git::{
    GitRepo, PostPushCleanup, RemoteSyncExecutor, WorkingTreeState, WorkspaceReconciler,
};
pub use host::{CredentialStore, RepositoryHost};
pub use provisioner::RepositoryProvisioner;
pub use secrets::{FileCredentialStore, Secrets};
pub use sync::{SyncPhase, SyncRecord, Synchronizer, WorkspaceLocks};
pub use types::{CommitResult, PushRequest, RemoteRepository, SyncOutcome, UserCredential};

pub use tokio_util::sync::CancellationToken;
