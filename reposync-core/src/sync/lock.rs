//! Per-workspace mutual exclusion
//!
//! Two syncs of the same directory must never overlap. Locks are keyed by the
//! canonical path, so `ws`, `./ws` and a symlink to it share one lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Registry of per-path async locks
#[derive(Debug, Default, Clone)]
pub struct WorkspaceLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

/// Held for the lifetime of one sync; releases the path on drop
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for a path; falls back to the path as given if it cannot be canonicalized
    fn key(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn entry(&self, key: &Path) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::SyncTool("workspace lock registry poisoned".to_string()))?;

        // Drop entries nobody holds or waits on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        Ok(locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Wait for exclusive access to `path`, or give up when cancelled
    pub async fn acquire(&self, path: &Path, cancel: &CancellationToken) -> Result<WorkspaceGuard> {
        let key = Self::key(path);
        let lock = self.entry(&key)?;

        debug!(workspace = %key.display(), "Waiting for workspace lock");
        let guard = tokio::select! {
            guard = lock.lock_owned() => guard,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        debug!(workspace = %key.display(), "Workspace lock acquired");

        Ok(WorkspaceGuard {
            path: key,
            _guard: guard,
        })
    }

    /// Try to lock `path` without waiting
    pub fn try_acquire(&self, path: &Path) -> Result<Option<WorkspaceGuard>> {
        let key = Self::key(path);
        let lock = self.entry(&key)?;
        Ok(lock.try_lock_owned().ok().map(|guard| WorkspaceGuard {
            path: key,
            _guard: guard,
        }))
    }

    /// Number of paths currently tracked
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
