//! Git operations for reposync
//!
//! Working-tree probing goes through `git2`; every mutation runs the `git`
//! binary so that transport, credentials and rebase behave exactly as they
//! do for a user at a terminal.

mod classify;
mod cleanup;
mod command;
mod reconcile;
mod remote;
mod repo;

pub use classify::{classify, GitFailure};
pub use cleanup::PostPushCleanup;
pub use command::{GitOutput, GitRunner};
pub(crate) use reconcile::ensure_directory;
pub use reconcile::{is_empty_workspace, WorkspaceReconciler};
pub use remote::RemoteSyncExecutor;
pub use repo::{GitRepo, TreeProbe, WorkingTreeState, GIT_DIR};
