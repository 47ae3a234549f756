//! Remote configuration, upstream integration and push

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classify::classify;
use super::command::GitRunner;
use super::repo::GitRepo;
use crate::config::GitConfig;
use crate::credentials::{redact_url_credentials, strip_credentials};
use crate::{Error, Result};

/// Links a committed working tree to its remote and pushes it
///
/// Each step probes the working tree first, so any of them can be re-run
/// after a crash or failure.
#[derive(Debug, Clone)]
pub struct RemoteSyncExecutor {
    runner: GitRunner,
    remote: String,
    branch: String,
}

impl RemoteSyncExecutor {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            runner: GitRunner::new(config),
            remote: config.remote.clone(),
            branch: config.branch.clone(),
        }
    }

    /// Remote-tracking ref integrated against, e.g. `origin/main`
    fn upstream(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    /// Configure, normalize, integrate and push in one call
    ///
    /// The remote URL is reset to its credential-free form on every exit path.
    pub async fn sync(
        &self,
        path: &Path,
        authenticated_url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = self.sync_steps(path, authenticated_url, cancel).await;
        self.finish(path, result).await
    }

    async fn sync_steps(
        &self,
        path: &Path,
        authenticated_url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.configure_remote(path, authenticated_url, cancel).await?;
        self.normalize_branch(path, cancel).await?;
        self.integrate_upstream(path, cancel).await?;
        self.push(path, cancel).await
    }

    /// Scrub the credential and combine the step result with the scrub result
    pub async fn finish(&self, path: &Path, result: Result<()>) -> Result<()> {
        let scrubbed = self.scrub_credentials(path).await;
        match (result, scrubbed) {
            (Err(e), Err(scrub_err)) => {
                warn!(workspace = %path.display(), error = %scrub_err, "Failed to remove credential from remote URL");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), scrubbed) => scrubbed,
        }
    }

    /// Point the remote at `url`, adding it if missing and updating it otherwise
    pub async fn configure_remote(
        &self,
        path: &Path,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let existing = GitRepo::open(path)?.remote_url(&self.remote)?;

        match existing {
            Some(current) if current == url => {
                debug!(remote = %self.remote, "Remote already configured");
            }
            Some(current) => {
                info!(
                    remote = %self.remote,
                    from = %redact_url_credentials(&current),
                    to = %redact_url_credentials(url),
                    "Updating existing remote URL"
                );
                self.runner
                    .run_checked(
                        path,
                        "remote set-url",
                        &["remote", "set-url", self.remote.as_str(), url],
                        cancel,
                    )
                    .await?;
            }
            None => {
                info!(remote = %self.remote, url = %redact_url_credentials(url), "Adding remote");
                self.runner
                    .run_checked(
                        path,
                        "remote add",
                        &["remote", "add", self.remote.as_str(), url],
                        cancel,
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Make the current branch the canonical primary branch
    pub async fn normalize_branch(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        let current = GitRepo::open(path)?.current_branch()?;
        if current.as_deref() == Some(self.branch.as_str()) {
            debug!(branch = %self.branch, "Branch already normalized");
            return Ok(());
        }

        info!(from = ?current, to = %self.branch, "Renaming branch");
        self.runner
            .run_checked(
                path,
                "branch -M",
                &["branch", "-M", self.branch.as_str()],
                cancel,
            )
            .await?;
        Ok(())
    }

    /// Replay local commits on top of the remote branch
    ///
    /// Returns `false` when the remote has no such branch yet. Any failure,
    /// including a timeout or cancellation while git is rebasing, aborts the
    /// rebase so the working tree is restored. A content conflict fails with
    /// `IntegrationConflict`.
    pub async fn integrate_upstream(&self, path: &Path, cancel: &CancellationToken) -> Result<bool> {
        if GitRepo::open(path)?.rebase_in_progress() {
            warn!(workspace = %path.display(), "Aborting rebase left over from an earlier run");
            self.runner
                .run_checked(path, "rebase --abort", &["rebase", "--abort"], cancel)
                .await?;
        }

        self.runner
            .run_checked(path, "fetch", &["fetch", self.remote.as_str()], cancel)
            .await?;

        if !GitRepo::open(path)?.has_remote_branch(&self.remote, &self.branch) {
            info!(upstream = %self.upstream(), "Remote branch does not exist yet; nothing to integrate");
            return Ok(false);
        }

        let upstream = self.upstream();
        let output = match self
            .runner
            .run(path, &["rebase", upstream.as_str()], cancel)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                // Killed by timeout or cancellation partway through
                self.abort_rebase(path).await;
                return Err(e);
            }
        };

        if output.success() {
            info!(upstream = %upstream, "Integrated upstream history");
            return Ok(true);
        }

        let failure = classify(&output);
        self.abort_rebase(path).await;
        Err(failure.into_error("rebase", &output))
    }

    /// Put the working tree back the way it was before a rebase started
    ///
    /// Uses a fresh token so it still runs after cancellation.
    async fn abort_rebase(&self, path: &Path) {
        let in_progress = GitRepo::open(path)
            .map(|repo| repo.rebase_in_progress())
            .unwrap_or(false);
        if !in_progress {
            return;
        }

        match self
            .runner
            .run(path, &["rebase", "--abort"], &CancellationToken::new())
            .await
        {
            Ok(out) if out.success() => debug!("Aborted failed rebase"),
            Ok(out) => warn!(error = %out.diagnostic(), "Could not abort rebase"),
            Err(e) => warn!(error = %e, "Could not abort rebase"),
        }
    }

    /// Push the primary branch, re-integrating once if the remote moved
    pub async fn push(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        match self.push_once(path, cancel).await {
            Err(Error::PushRejected(reason)) => {
                warn!(reason = %reason, "Push rejected; integrating upstream and retrying once");
                self.integrate_upstream(path, cancel).await?;
                self.push_once(path, cancel).await
            }
            other => other,
        }
    }

    async fn push_once(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        self.runner
            .run_checked(
                path,
                "push",
                &["push", "-u", self.remote.as_str(), self.branch.as_str()],
                cancel,
            )
            .await?;
        info!(remote = %self.remote, branch = %self.branch, "Pushed");
        Ok(())
    }

    /// Strip any credential from the configured remote URL
    ///
    /// Runs even after cancellation, since it only touches local config.
    pub async fn scrub_credentials(&self, path: &Path) -> Result<()> {
        if !GitRepo::is_initialized(path) {
            return Ok(());
        }

        let Some(current) = GitRepo::open(path)?.remote_url(&self.remote)? else {
            return Ok(());
        };
        let plain = strip_credentials(&current);
        if plain == current {
            return Ok(());
        }

        self.runner
            .run_checked(
                path,
                "remote set-url",
                &["remote", "set-url", self.remote.as_str(), plain.as_str()],
                &CancellationToken::new(),
            )
            .await?;
        debug!(remote = %self.remote, "Removed credential from remote URL");
        Ok(())
    }
}
