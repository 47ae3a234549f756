//! Orchestration of a full workspace sync

mod lock;
mod orchestrator;
mod record;
mod state;

pub use lock::{WorkspaceGuard, WorkspaceLocks};
pub use orchestrator::{InferredState, Synchronizer};
pub use record::SyncRecord;
pub use state::{SyncPhase, SyncStateMachine};
