//! On-disk record of a repository provisioned for a workspace
//!
//! Lives inside `.git`, so it is never committed or deleted by cleanup. It lets
//! a retry of the same request reuse the repository instead of creating a
//! second one. It never contains credentials.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::git::GIT_DIR;
use crate::{Error, RemoteRepository, Result};

/// File name of the record inside `.git`
const RECORD_FILE: &str = "reposync.toml";

/// Repository provisioned for a workspace whose push has not completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub user_id: String,
    pub repository_name: String,
    pub repository: RemoteRepository,

    /// When the repository was provisioned
    #[serde(with = "humantime_serde")]
    pub provisioned_at: SystemTime,
}

impl SyncRecord {
    pub fn new(
        user_id: impl Into<String>,
        repository_name: impl Into<String>,
        repository: RemoteRepository,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            repository_name: repository_name.into(),
            repository,
            provisioned_at: SystemTime::now(),
        }
    }

    fn path(workspace: &Path) -> PathBuf {
        workspace.join(GIT_DIR).join(RECORD_FILE)
    }

    /// Whether this record belongs to the given user and repository name
    pub fn matches(&self, user_id: &str, repository_name: &str) -> bool {
        self.user_id == user_id && self.repository_name == repository_name
    }

    /// Load the record for a workspace, `None` if there is none
    ///
    /// An unreadable or corrupt record is treated as absent.
    pub fn load(workspace: &Path) -> Option<Self> {
        let contents = fs::read_to_string(Self::path(workspace)).ok()?;
        match toml::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(workspace = %workspace.display(), error = %e, "Ignoring unreadable sync record");
                None
            }
        }
    }

    /// Write the record; requires an initialized working tree
    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::path(workspace);
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::WorkspaceIo(format!("Failed to serialize sync record: {}", e)))?;

        fs::write(&path, contents).map_err(|e| Error::workspace_io(&path, e))
    }

    /// Remove the record for a workspace, if any
    pub fn clear(workspace: &Path) -> Result<()> {
        let path = Self::path(workspace);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::workspace_io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> RemoteRepository {
        RemoteRepository {
            id: "9".into(),
            http_url: "https://host/user/demo.git".into(),
            web_url: "https://host/user/demo".into(),
        }
    }

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(GIT_DIR)).unwrap();

        assert!(SyncRecord::load(dir.path()).is_none());

        let record = SyncRecord::new("alice", "demo", repo());
        record.save(dir.path()).unwrap();

        let loaded = SyncRecord::load(dir.path()).unwrap();
        assert!(loaded.matches("alice", "demo"));
        assert!(!loaded.matches("bob", "demo"));
        assert!(!loaded.matches("alice", "other"));
        assert_eq!(loaded.repository, repo());

        SyncRecord::clear(dir.path()).unwrap();
        assert!(SyncRecord::load(dir.path()).is_none());
        // Clearing twice is fine
        SyncRecord::clear(dir.path()).unwrap();
    }

    #[test]
    fn test_corrupt_record_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(GIT_DIR)).unwrap();
        fs::write(dir.path().join(GIT_DIR).join(RECORD_FILE), "not = [valid").unwrap();
        assert!(SyncRecord::load(dir.path()).is_none());
    }

    #[test]
    fn test_save_without_git_dir_fails() {
        let dir = TempDir::new().unwrap();
        let err = SyncRecord::new("alice", "demo", repo())
            .save(dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::WorkspaceIo(_)));
    }
}
