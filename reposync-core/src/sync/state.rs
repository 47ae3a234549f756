//! Sync phase state machine
//!
//! Tracks where a single orchestration run is, and refuses transitions the
//! pipeline never makes. `Failed` is reachable from every non-terminal phase.

use std::fmt;

use crate::{Error, ErrorKind, Result};

/// Phase of one sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Start,
    RepoProvisioned,
    WorkspaceCommitted,
    RemoteConfigured,
    HistoryIntegrated,
    Pushed,
    /// Terminal success
    CleanedUp,
    /// Terminal failure
    Failed(ErrorKind),
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::CleanedUp | SyncPhase::Failed(_))
    }

    /// Whether content in the workspace may be deleted in this phase
    pub fn allows_cleanup(&self) -> bool {
        matches!(self, SyncPhase::Pushed)
    }

    /// Successor on the happy path
    fn next(&self) -> Option<SyncPhase> {
        match self {
            SyncPhase::Start => Some(SyncPhase::RepoProvisioned),
            SyncPhase::RepoProvisioned => Some(SyncPhase::WorkspaceCommitted),
            SyncPhase::WorkspaceCommitted => Some(SyncPhase::RemoteConfigured),
            SyncPhase::RemoteConfigured => Some(SyncPhase::HistoryIntegrated),
            SyncPhase::HistoryIntegrated => Some(SyncPhase::Pushed),
            SyncPhase::Pushed => Some(SyncPhase::CleanedUp),
            SyncPhase::CleanedUp | SyncPhase::Failed(_) => None,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Failed(kind) => write!(f, "Failed({:?})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Current phase of a run plus the rules for leaving it
#[derive(Debug, Clone)]
pub struct SyncStateMachine {
    phase: SyncPhase,
    /// Repository was supplied by the caller or a sync record
    provisioning_skipped: bool,
}

impl Default for SyncStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateMachine {
    pub fn new() -> Self {
        Self {
            phase: SyncPhase::Start,
            provisioning_skipped: false,
        }
    }

    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    pub fn provisioning_skipped(&self) -> bool {
        self.provisioning_skipped
    }

    pub fn can_transition_to(&self, to: &SyncPhase) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        if matches!(to, SyncPhase::Failed(_)) {
            return true;
        }
        self.phase.next().as_ref() == Some(to)
    }

    /// Advance to `to`, logging the transition
    pub fn transition_to(&mut self, to: SyncPhase) -> Result<()> {
        if !self.can_transition_to(&to) {
            return Err(Error::SyncTool(format!(
                "invalid sync transition from {} to {}",
                self.phase, to
            )));
        }

        tracing::info!(from = %self.phase, to = %to, "Sync phase transition");
        self.phase = to;
        Ok(())
    }

    /// `Start -> RepoProvisioned` for a repository that already exists
    pub fn skip_provisioning(&mut self) -> Result<()> {
        self.transition_to(SyncPhase::RepoProvisioned)?;
        self.provisioning_skipped = true;
        Ok(())
    }

    /// Enter `Failed` with the error's kind
    pub fn fail(&mut self, error: &Error) {
        if !self.phase.is_terminal() {
            tracing::warn!(from = %self.phase, kind = ?error.kind(), "Sync failed");
            self.phase = SyncPhase::Failed(error.kind());
        }
    }
}
