//! Turn a workspace directory into a committed working tree

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::{classify, GitFailure};
use super::command::GitRunner;
use super::repo::{GitRepo, GIT_DIR};
use crate::config::GitConfig;
use crate::{CommitResult, Error, Result};

/// Initializes, stages and commits a workspace; safe to call repeatedly
#[derive(Debug, Clone)]
pub struct WorkspaceReconciler {
    runner: GitRunner,
    placeholder: String,
    commit_message: String,
}

impl WorkspaceReconciler {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            runner: GitRunner::new(config),
            placeholder: config.placeholder.clone(),
            commit_message: config.commit_message.clone(),
        }
    }

    /// Run `git init` unless `path` already holds a repository
    ///
    /// Returns whether a repository was created.
    pub async fn init(&self, path: &Path, cancel: &CancellationToken) -> Result<bool> {
        ensure_directory(path)?;

        if GitRepo::is_initialized(path) {
            debug!(workspace = %path.display(), "Git repository already initialized");
            return Ok(false);
        }

        info!(workspace = %path.display(), "Initializing git repository");
        self.runner.run_checked(path, "init", &["init"], cancel).await?;
        Ok(true)
    }

    /// Commit everything under `path`
    ///
    /// Returns `created: false` when the tree is unchanged since the last
    /// commit, which is what a re-run after a partial sync looks like.
    pub async fn prepare(&self, path: &Path, cancel: &CancellationToken) -> Result<CommitResult> {
        self.init(path, cancel).await?;

        if is_empty_workspace(path)? {
            let placeholder = path.join(&self.placeholder);
            std::fs::write(&placeholder, b"").map_err(|e| Error::workspace_io(&placeholder, e))?;
            info!(workspace = %path.display(), file = %self.placeholder, "Wrote placeholder into empty workspace");
        }

        self.runner
            .run_checked(path, "add", &["add", "--all", "."], cancel)
            .await?;

        let output = self
            .runner
            .run(path, &["commit", "-m", self.commit_message.as_str()], cancel)
            .await?;

        if output.success() {
            info!(workspace = %path.display(), "Created commit");
            return Ok(CommitResult { created: true });
        }

        match classify(&output) {
            GitFailure::NothingToCommit => {
                if !GitRepo::open(path)?.has_commits()? {
                    // Everything present is ignored; there is nothing to push
                    return Err(Error::SyncTool(format!(
                        "nothing could be committed in {}: {}",
                        path.display(),
                        output.diagnostic()
                    )));
                }
                info!(workspace = %path.display(), "Nothing changed since the last commit");
                Ok(CommitResult { created: false })
            }
            failure => Err(failure.into_error("commit", &output)),
        }
    }
}

pub(crate) fn ensure_directory(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::workspace_io(path, e))?;
    if !metadata.is_dir() {
        return Err(Error::WorkspaceIo(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(())
}

/// True when nothing but git metadata lives in `path`
pub fn is_empty_workspace(path: &Path) -> Result<bool> {
    let entries = std::fs::read_dir(path).map_err(|e| Error::workspace_io(path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::workspace_io(path, e))?;
        if entry.file_name() != GIT_DIR {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_workspace_detection() {
        let dir = TempDir::new().unwrap();
        assert!(is_empty_workspace(dir.path()).unwrap());

        std::fs::create_dir(dir.path().join(GIT_DIR)).unwrap();
        assert!(is_empty_workspace(dir.path()).unwrap());

        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        assert!(!is_empty_workspace(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_prepare_missing_path() {
        let reconciler = WorkspaceReconciler::new(&GitConfig::default());
        let err = reconciler
            .prepare(Path::new("/nonexistent/ws/12345"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkspaceIo(_)));
    }

    #[tokio::test]
    async fn test_prepare_file_instead_of_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();

        let reconciler = WorkspaceReconciler::new(&GitConfig::default());
        let err = reconciler
            .prepare(&file, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkspaceIo(_)));
    }
}
