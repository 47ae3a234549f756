//! Secrets management for reposync
//!
//! Provider tokens are stored separately from configuration to avoid accidental
//! sharing. The secrets file is located at `~/.config/reposync/secrets.toml` and
//! must have restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variable (REPOSYNC_TOKEN), applies to every user
//! 2. Secrets file, per user under `[users.<id>]`

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::redact_token;
use crate::host::CredentialStore;
use crate::{Error, Result, UserCredential};

/// Environment variable that overrides every stored token
pub const TOKEN_ENV: &str = "REPOSYNC_TOKEN";

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Per-user provider credentials
    pub users: HashMap<String, UserSecrets>,
}

/// Secrets for one user
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserSecrets {
    /// Provider access token (OAuth or personal access token)
    pub token: Option<String>,
}

impl std::fmt::Debug for UserSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSecrets")
            .field("token", &self.token.as_deref().map(redact_token))
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        let secrets_path = Self::default_secrets_path();

        if let Some(path) = secrets_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            let mode = metadata.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        for user in secrets.users.values_mut() {
            if let Some(ref mut token) = user.token {
                *token = token.trim().to_string();
            }
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/reposync/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reposync").join("secrets.toml"))
    }

    /// Get a user's token with environment variable override
    ///
    /// Priority: REPOSYNC_TOKEN env var > secrets file
    pub fn token_for(&self, user_id: &str) -> Option<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!(user_id, "Using provider token from {}", TOKEN_ENV);
                return Some(token);
            }
        }

        self.stored_token(user_id)
    }

    /// Token from the secrets file only
    pub fn stored_token(&self, user_id: &str) -> Option<String> {
        self.users
            .get(user_id)
            .and_then(|u| u.token.as_deref())
            .filter(|t| !t.is_empty())
            .map(|t| {
                debug!(user_id, token = %redact_token(t), "Using provider token from secrets file");
                t.to_string()
            })
    }

    /// Create a template secrets file at the default location
    ///
    /// Creates parent directories if needed and sets secure permissions
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("{}: {}", parent.display(), e)))?;
        }

        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# reposync secrets
# This file contains sensitive credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)

# One table per user id. The token needs the `api` and `write_repository` scopes.
[users.example]
token = ""
"#;

        std::fs::write(&path, template)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your tokens");

        Ok(path)
    }
}

/// Credential store backed by the secrets file
#[derive(Debug, Clone, Default)]
pub struct FileCredentialStore {
    secrets: Secrets,
}

impl FileCredentialStore {
    pub fn new(secrets: Secrets) -> Self {
        Self { secrets }
    }

    /// Load from the default secrets location
    pub fn load() -> Result<Self> {
        Ok(Self::new(Secrets::load()?))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_credential(&self, user_id: &str) -> Result<Option<UserCredential>> {
        Ok(self
            .secrets
            .token_for(user_id)
            .map(|token| UserCredential::new(user_id, token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_secrets() {
        let secrets = Secrets::default();
        assert!(secrets.users.is_empty());
        assert!(secrets.stored_token("anyone").is_none());
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[users.alice]
token = "glpat-xxxxxxxxxxxx"

[users.bob]
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(
            secrets.stored_token("alice"),
            Some("glpat-xxxxxxxxxxxx".to_string())
        );
        assert_eq!(secrets.stored_token("bob"), None);
        assert_eq!(secrets.stored_token("carol"), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let user = UserSecrets {
            token: Some("glpat-verysecret".to_string()),
        };
        let debug = format!("{:?}", user);
        assert!(!debug.contains("verysecret"));
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[users.alice]\ntoken = \"test\"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o644);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let result = Secrets::load_from_file(&file.path().to_path_buf());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted_and_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[users.alice]\ntoken = \"  glpat_test  \"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let secrets = Secrets::load_from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(secrets.stored_token("alice"), Some("glpat_test".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_unknown_user() {
        let store = FileCredentialStore::new(Secrets::default());
        // REPOSYNC_TOKEN may be set in the environment; only assert when it is not
        if std::env::var(TOKEN_ENV).is_err() {
            assert!(store.get_credential("nobody").await.unwrap().is_none());
        }
    }
}
