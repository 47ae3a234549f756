//! The caller-facing sync operation
//!
//! Sequences provisioning, commit, remote sync and cleanup for one
//! [`PushRequest`], stopping at the first failure. Nothing in the workspace is
//! deleted before the push is confirmed, and the repository is recorded in the
//! workspace as soon as it is provisioned.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::lock::WorkspaceLocks;
use super::record::SyncRecord;
use super::state::{SyncPhase, SyncStateMachine};
use crate::config::Config;
use crate::credentials::{inject, redact_token};
use crate::git::{
    ensure_directory, GitRepo, PostPushCleanup, RemoteSyncExecutor, TreeProbe, WorkspaceReconciler,
};
use crate::host::{CredentialStore, RepositoryHost};
use crate::provisioner::RepositoryProvisioner;
use crate::{Error, PushRequest, RemoteRepository, Result, SyncOutcome};

/// What is already true about a request before any step runs
#[derive(Debug, Clone)]
pub struct InferredState {
    pub tree: TreeProbe,
    /// Repository to reuse instead of provisioning
    pub repository: Option<RemoteRepository>,
}

/// Runs whole syncs; one instance serves many requests
pub struct Synchronizer {
    credentials: Arc<dyn CredentialStore>,
    provisioner: RepositoryProvisioner,
    reconciler: WorkspaceReconciler,
    executor: RemoteSyncExecutor,
    cleanup: PostPushCleanup,
    locks: WorkspaceLocks,
    remote: String,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("provisioner", &self.provisioner)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

impl Synchronizer {
    pub fn new(
        config: &Config,
        host: Arc<dyn RepositoryHost>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            credentials,
            provisioner: RepositoryProvisioner::new(host, &config.provider),
            reconciler: WorkspaceReconciler::new(&config.git),
            executor: RemoteSyncExecutor::new(&config.git),
            cleanup: PostPushCleanup::new(&config.git),
            locks: WorkspaceLocks::new(),
            remote: config.git.remote.clone(),
        }
    }

    /// Share a lock registry with other synchronizers in the process
    pub fn with_locks(mut self, locks: WorkspaceLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &WorkspaceLocks {
        &self.locks
    }

    /// Publish the request's workspace as a new repository
    pub async fn synchronize(&self, request: &PushRequest) -> SyncOutcome {
        self.synchronize_with(request, None, &CancellationToken::new())
            .await
    }

    /// Like [`synchronize`](Self::synchronize), reusing `existing` instead of
    /// provisioning and observing `cancel` between and during steps
    pub async fn synchronize_with(
        &self,
        request: &PushRequest,
        existing: Option<RemoteRepository>,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        let mut state = SyncStateMachine::new();
        let mut known = existing.clone();

        match self
            .run(request, existing, cancel, &mut state, &mut known)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                state.fail(&e);
                error!(
                    workspace = %request.workspace().display(),
                    repository = %request.repository_name,
                    kind = ?e.kind(),
                    error = %e,
                    "Sync failed; workspace left untouched"
                );
                SyncOutcome::failed(&e, known)
            }
        }
    }

    /// Probe the workspace and pick a repository to reuse, if any
    ///
    /// A caller-supplied repository wins; otherwise a sync record left by an
    /// earlier run for the same user and name is used.
    pub fn infer_state(
        &self,
        request: &PushRequest,
        existing: Option<RemoteRepository>,
    ) -> Result<InferredState> {
        let path = request.workspace();
        let tree = GitRepo::probe(path, &self.remote)?;

        let repository = existing.or_else(|| {
            SyncRecord::load(path)
                .filter(|r| r.matches(&request.user_id, &request.repository_name))
                .map(|r| {
                    info!(repository = %r.repository_name, id = %r.repository.id, "Resuming with previously provisioned repository");
                    r.repository
                })
        });

        info!(
            workspace = %path.display(),
            state = ?tree.state,
            has_remote = tree.remote_url.is_some(),
            rebase_in_progress = tree.rebase_in_progress,
            reuse = repository.is_some(),
            "Inferred workspace state"
        );

        Ok(InferredState { tree, repository })
    }

    async fn run(
        &self,
        request: &PushRequest,
        existing: Option<RemoteRepository>,
        cancel: &CancellationToken,
        state: &mut SyncStateMachine,
        known: &mut Option<RemoteRepository>,
    ) -> Result<SyncOutcome> {
        request.validate()?;
        let path = request.workspace();

        let _guard = self.locks.acquire(path, cancel).await?;
        ensure_directory(path)?;

        let credential = self
            .credentials
            .get_credential(&request.user_id)
            .await?
            .ok_or_else(|| {
                Error::ProviderAuth(format!("no credential stored for user '{}'", request.user_id))
            })?;
        info!(user = %credential.user_id, token = %redact_token(&credential.bearer_token), "Loaded credential");

        let inferred = self.infer_state(request, existing)?;
        check_cancelled(cancel)?;

        let repository = match inferred.repository {
            Some(repo) => {
                state.skip_provisioning()?;
                repo
            }
            None => {
                let repo = self
                    .provisioner
                    .create_repository(
                        &credential,
                        &request.repository_name,
                        &request.description,
                        cancel,
                    )
                    .await?;
                state.transition_to(SyncPhase::RepoProvisioned)?;
                repo
            }
        };
        *known = Some(repository.clone());
        self.remember(request, &repository).await?;
        check_cancelled(cancel)?;

        let commit = self.reconciler.prepare(path, cancel).await?;
        state.transition_to(SyncPhase::WorkspaceCommitted)?;
        info!(created = commit.created, "Workspace committed");
        check_cancelled(cancel)?;

        let authenticated = inject(&repository.http_url, &credential.bearer_token)?;
        let remote_result = self.remote_steps(path, &authenticated, cancel, state).await;
        self.executor.finish(path, remote_result).await?;

        if let Err(e) = SyncRecord::clear(path) {
            warn!(workspace = %path.display(), error = %e, "Failed to remove sync record");
        }

        let warning = self.clean_workspace(path, cancel, state);
        Ok(SyncOutcome::succeeded(repository, warning))
    }

    /// Save a sync record so a retry of `request` reuses `repository`
    ///
    /// Initializes the workspace first if needed. Ignores cancellation, since
    /// the repository already exists on the provider.
    async fn remember(&self, request: &PushRequest, repository: &RemoteRepository) -> Result<()> {
        let path = request.workspace();
        self.reconciler.init(path, &CancellationToken::new()).await?;
        SyncRecord::new(&request.user_id, &request.repository_name, repository.clone()).save(path)
    }

    async fn remote_steps(
        &self,
        path: &Path,
        authenticated_url: &str,
        cancel: &CancellationToken,
        state: &mut SyncStateMachine,
    ) -> Result<()> {
        self.executor
            .configure_remote(path, authenticated_url, cancel)
            .await?;
        state.transition_to(SyncPhase::RemoteConfigured)?;
        check_cancelled(cancel)?;

        self.executor.normalize_branch(path, cancel).await?;
        self.executor.integrate_upstream(path, cancel).await?;
        state.transition_to(SyncPhase::HistoryIntegrated)?;
        check_cancelled(cancel)?;

        self.executor.push(path, cancel).await?;
        state.transition_to(SyncPhase::Pushed)?;
        Ok(())
    }

    /// Empty the workspace after a push; failures become a warning
    fn clean_workspace(
        &self,
        path: &Path,
        cancel: &CancellationToken,
        state: &mut SyncStateMachine,
    ) -> Option<String> {
        if !state.phase().allows_cleanup() {
            return Some(format!("cleanup skipped in phase {}", state.phase()));
        }
        if cancel.is_cancelled() {
            warn!(workspace = %path.display(), "Cancelled after push; workspace contents kept");
            return Some("sync cancelled after push; workspace contents were kept".to_string());
        }

        match self.cleanup.cleanup(path) {
            Ok(_) => match state.transition_to(SyncPhase::CleanedUp) {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            },
            Err(e) => {
                warn!(workspace = %path.display(), error = %e, "Push succeeded but cleanup failed");
                Some(format!("push succeeded but cleanup failed: {}", e))
            }
        }
    }
}
