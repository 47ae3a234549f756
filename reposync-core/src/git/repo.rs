//! Working-tree probing
//!
//! Every sync step re-derives the state of the workspace from disk instead of
//! trusting anything remembered from an earlier step or an earlier run.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository, RepositoryState};

use crate::{Error, Result};

/// Name of the git metadata directory inside a workspace
pub const GIT_DIR: &str = ".git";

/// What a workspace directory looks like to git
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingTreeState {
    /// No `.git` directory at the workspace root
    Uninitialized,
    /// Initialized, HEAD is unborn
    InitializedNoCommits,
    /// At least one commit on HEAD
    HasLocalCommits,
}

/// Snapshot of a workspace taken by [`GitRepo::probe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeProbe {
    pub state: WorkingTreeState,
    /// URL of the probed remote, if configured
    pub remote_url: Option<String>,
    /// A rebase from a crashed run is still in progress
    pub rebase_in_progress: bool,
}

/// A git repository rooted exactly at a workspace directory
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the repository whose work tree is `path`
    ///
    /// Unlike discovery, this never walks up into a parent repository: a
    /// workspace nested inside another checkout is treated as uninitialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !Self::is_initialized(path) {
            return Err(Error::WorkspaceIo(format!(
                "{} is not a git working tree",
                path.display()
            )));
        }

        let repo = Repository::open(path)
            .map_err(|e| Error::SyncTool(format!("Failed to open {}: {}", path.display(), e)))?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::SyncTool("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Whether `path` itself holds git metadata
    pub fn is_initialized(path: impl AsRef<Path>) -> bool {
        path.as_ref().join(GIT_DIR).exists()
    }

    /// Infer the working-tree state of `path`
    pub fn probe(path: impl AsRef<Path>, remote: &str) -> Result<TreeProbe> {
        let path = path.as_ref();
        if !Self::is_initialized(path) {
            return Ok(TreeProbe {
                state: WorkingTreeState::Uninitialized,
                remote_url: None,
                rebase_in_progress: false,
            });
        }

        let repo = Self::open(path)?;
        let state = if repo.has_commits()? {
            WorkingTreeState::HasLocalCommits
        } else {
            WorkingTreeState::InitializedNoCommits
        };

        Ok(TreeProbe {
            state,
            remote_url: repo.remote_url(remote)?,
            rebase_in_progress: repo.rebase_in_progress(),
        })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `.git` directory
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Whether HEAD points at a commit
    pub fn has_commits(&self) -> Result<bool> {
        match self.repo.head() {
            Ok(head) => Ok(head.target().is_some()),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(false)
            }
            Err(e) => Err(Error::SyncTool(format!("Failed to read HEAD: {}", e))),
        }
    }

    /// URL configured for a remote, `None` if the remote does not exist
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) if e.class() == git2::ErrorClass::Config => Ok(None),
            Err(e) => Err(Error::SyncTool(format!(
                "Failed to read remote '{}': {}",
                name, e
            ))),
        }
    }

    /// Get the current branch name, `None` for a detached HEAD
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // Unborn HEAD still names a branch in .git/HEAD
                let name = self
                    .repo
                    .find_reference("HEAD")
                    .ok()
                    .and_then(|r| r.symbolic_target().map(str::to_string))
                    .and_then(|t| t.strip_prefix("refs/heads/").map(str::to_string));
                return Ok(name);
            }
            Err(e) => return Err(Error::SyncTool(format!("Failed to get HEAD: {}", e))),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Whether a remote-tracking branch exists locally (after a fetch)
    pub fn has_remote_branch(&self, remote: &str, branch: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/remotes/{}/{}", remote, branch))
            .is_ok()
    }

    /// Whether a rebase was interrupted and never finished or aborted
    pub fn rebase_in_progress(&self) -> bool {
        matches!(
            self.repo.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
                | RepositoryState::ApplyMailbox
                | RepositoryState::ApplyMailboxOrRebase
        )
    }

    /// SHA of the HEAD commit
    pub fn head_commit(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(Error::SyncTool(format!("Failed to read HEAD: {}", e))),
        }
    }

    /// Detach the repository from the project it last published
    ///
    /// Deletes the checked-out branch, points HEAD at an unborn `branch`,
    /// removes `remote` with its tracking refs and empties the index. Objects
    /// and the rest of `.git` are left alone.
    pub fn forget_published_history(&self, remote: &str, branch: &str) -> Result<()> {
        let git_err = |what: &str, e: git2::Error| Error::SyncTool(format!("{}: {}", what, e));

        let checked_out = self
            .repo
            .find_reference("HEAD")
            .ok()
            .and_then(|r| r.symbolic_target().map(str::to_string));
        for name in checked_out
            .into_iter()
            .chain(std::iter::once(format!("refs/heads/{}", branch)))
        {
            match self.repo.find_reference(&name) {
                Ok(mut reference) => reference
                    .delete()
                    .map_err(|e| git_err("Failed to delete branch", e))?,
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(git_err("Failed to read branch", e)),
            }
        }
        self.repo
            .set_head(&format!("refs/heads/{}", branch))
            .map_err(|e| git_err("Failed to reset HEAD", e))?;

        // Also drops refs/remotes/<remote>/*
        if self.remote_url(remote)?.is_some() {
            self.repo
                .remote_delete(remote)
                .map_err(|e| git_err("Failed to remove remote", e))?;
        }

        let mut index = self
            .repo
            .index()
            .map_err(|e| git_err("Failed to open index", e))?;
        index.clear().map_err(|e| git_err("Failed to clear index", e))?;
        index.write().map_err(|e| git_err("Failed to write index", e))?;
        Ok(())
    }
}
