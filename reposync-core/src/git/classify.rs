//! Translation of git failures into the sync error taxonomy
//!
//! This is the only place that looks at git's message text. Git runs with
//! `LC_ALL=C`, so the patterns below are stable English strings.

use super::command::GitOutput;
use crate::credentials::redact_url_credentials;
use crate::Error;

/// Recognized kinds of git failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitFailure {
    /// `git commit` with an unchanged index
    NothingToCommit,
    /// Push refused because the remote moved
    NonFastForward,
    /// Content conflict during rebase
    Conflict,
    /// Remote refused the credential
    AuthenticationFailed,
    /// Network failure or missing remote
    RemoteUnreachable,
    /// The workspace itself could not be read or written
    LocalIo,
    /// Anything else
    Unrecognized,
}

const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "http basic: access denied",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "returned error: 401",
    "returned error: 403",
    "permission denied (publickey",
];

// Checked after the remote-auth forms above
const LOCAL_IO_PATTERNS: &[&str] = &[
    "unable to index file",
    "insufficient permission",
    "open(\"",
    "permission denied",
    "unable to create",
    "unable to write",
    "read-only file system",
    "no space left on device",
];

const UNREACHABLE_PATTERNS: &[&str] = &[
    "could not resolve host",
    "connection refused",
    "connection timed out",
    "operation timed out",
    "failed to connect",
    "does not appear to be a git repository",
    "could not read from remote repository",
    "unable to access",
];

const CONFLICT_PATTERNS: &[&str] = &[
    "conflict (",
    "merge conflict in",
    "could not apply",
    "resolve all conflicts manually",
];

const REJECTED_PATTERNS: &[&str] = &[
    "non-fast-forward",
    "[rejected]",
    "fetch first",
    "updates were rejected",
];

const NOTHING_TO_COMMIT_PATTERNS: &[&str] = &[
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// Classify a failed git invocation by its output
pub fn classify(output: &GitOutput) -> GitFailure {
    let text = output.combined().to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| text.contains(p));

    // A server-side hook refusal is not a concurrent update
    if text.contains("[remote rejected]") {
        return GitFailure::Unrecognized;
    }

    if has(AUTH_PATTERNS) {
        GitFailure::AuthenticationFailed
    } else if has(LOCAL_IO_PATTERNS) {
        GitFailure::LocalIo
    } else if has(CONFLICT_PATTERNS) {
        GitFailure::Conflict
    } else if has(REJECTED_PATTERNS) {
        GitFailure::NonFastForward
    } else if has(UNREACHABLE_PATTERNS) {
        GitFailure::RemoteUnreachable
    } else if has(NOTHING_TO_COMMIT_PATTERNS) {
        GitFailure::NothingToCommit
    } else {
        GitFailure::Unrecognized
    }
}

impl GitFailure {
    /// Convert into a taxonomy error for the step that failed
    pub fn into_error(self, step: &str, output: &GitOutput) -> Error {
        let diagnostic = output.diagnostic();
        match self {
            GitFailure::NonFastForward => Error::PushRejected(diagnostic),
            GitFailure::Conflict => Error::IntegrationConflict(diagnostic),
            GitFailure::AuthenticationFailed => Error::ProviderAuth(diagnostic),
            GitFailure::RemoteUnreachable => {
                Error::ProviderUnavailable(format!("git {}: {}", step, diagnostic))
            }
            GitFailure::LocalIo => Error::WorkspaceIo(format!("git {}: {}", step, diagnostic)),
            GitFailure::NothingToCommit | GitFailure::Unrecognized => Error::SyncTool(format!(
                "git {} failed ({}): {}",
                step,
                output
                    .code
                    .map_or_else(|| "killed".to_string(), |c| format!("exit {}", c)),
                diagnostic
            )),
        }
    }
}

impl GitOutput {
    /// Redacted, trimmed text worth showing to a user
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        let text = if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        };
        redact_url_credentials(text)
    }
}
