//! Emptying a workspace after a confirmed push

use std::path::Path;

use tracing::{info, warn};

use super::repo::{GitRepo, GIT_DIR};
use crate::config::GitConfig;
use crate::{Error, Result};

/// Readies a workspace for the next project once a push has succeeded
///
/// `.git` itself is kept, but the published branch and remote are dropped so
/// the next project starts from an unborn branch with no remote.
#[derive(Debug, Clone)]
pub struct PostPushCleanup {
    remote: String,
    branch: String,
}

impl Default for PostPushCleanup {
    fn default() -> Self {
        Self::new(&GitConfig::default())
    }
}

impl PostPushCleanup {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
        }
    }

    /// Delete every entry under `path` except `.git` and forget the published
    /// history, returning how many top-level entries were removed
    ///
    /// The placeholder file is deleted like any other entry. The next
    /// [`prepare`](super::WorkspaceReconciler::prepare) writes a fresh one if
    /// the workspace is still empty by then.
    pub fn cleanup(&self, path: &Path) -> Result<usize> {
        let removed = remove_contents(path);

        let forgotten = if GitRepo::is_initialized(path) {
            GitRepo::open(path)
                .and_then(|repo| repo.forget_published_history(&self.remote, &self.branch))
        } else {
            Ok(())
        };

        match (removed, forgotten) {
            (Ok(removed), Ok(())) => {
                info!(workspace = %path.display(), removed, "Workspace emptied and detached after push");
                Ok(removed)
            }
            (Err(e), Err(history_err)) => {
                warn!(workspace = %path.display(), error = %history_err, "Failed to reset git history");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
        }
    }
}

fn remove_contents(path: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(path).map_err(|e| Error::workspace_io(path, e))?;
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| Error::workspace_io(path, e))?;
        if entry.file_name() == GIT_DIR {
            continue;
        }

        let entry_path = entry.path();
        // file_type() does not follow symlinks, so a link to a directory is unlinked, not traversed
        let file_type = entry
            .file_type()
            .map_err(|e| Error::workspace_io(&entry_path, e))?;
        let removal = if file_type.is_dir() {
            std::fs::remove_dir_all(&entry_path)
        } else {
            std::fs::remove_file(&entry_path)
        };
        removal.map_err(|e| Error::workspace_io(&entry_path, e))?;

        removed += 1;
    }

    Ok(removed)
}
