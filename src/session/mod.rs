// src/session/mod.rs

//! Client-side exam session: the state machine, its two persistence
//! channels, reload recovery and the task that drives it.

pub mod checkpoint;
pub mod driver;
pub mod machine;
pub mod recovery;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{Checkpoint, FileStore, KeyValueStore, LocalCheckpoint, MemoryStore};
pub use driver::{SessionCommand, SessionDriver, SessionHandle, SessionView};
pub use machine::{ExamPlan, ExamSession, PlannedQuestion, SyncReport};
pub use recovery::{RecoveryDecision, RecoveryNegotiator, RecoverySummary, decide};
pub use sync::{HttpSyncTransport, RemoteSync, SyncTransport};
