// src/session/recovery.rs

use crate::{
    models::session::SessionStatus,
    session::{checkpoint::Checkpoint, machine::ExamSession},
    utils::time::{format_remaining, format_timestamp},
};

/// Outcome of looking at whatever checkpoint a reload found.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryDecision {
    StartFresh,
    Offer(Checkpoint),
}

/// Whether a loaded checkpoint is worth offering back to the user.
///
/// Nothing, or an attempt that was already submitted, means a fresh start.
/// Age is not considered.
pub fn decide(checkpoint: Option<Checkpoint>) -> RecoveryDecision {
    match checkpoint {
        None => RecoveryDecision::StartFresh,
        Some(checkpoint) if checkpoint.status == SessionStatus::Submitted => {
            RecoveryDecision::StartFresh
        }
        Some(checkpoint) => RecoveryDecision::Offer(checkpoint),
    }
}

/// What the restore prompt shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverySummary {
    pub answered: usize,
    pub remaining: String,
    pub saved_at: String,
    pub status: SessionStatus,
}

impl RecoverySummary {
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            answered: checkpoint.answers.len(),
            remaining: format_remaining(checkpoint.time_left),
            saved_at: format_timestamp(checkpoint.saved_at),
            status: checkpoint.status,
        }
    }
}

/// Reconciles a freshly mounted session with a prior checkpoint.
///
/// While a decision is pending the session refuses every mutation; the UI
/// gates on `ExamSession::is_recovering`.
#[derive(Debug)]
pub struct RecoveryNegotiator {
    pending: Option<Checkpoint>,
}

impl RecoveryNegotiator {
    /// Loads the checkpoint of `session`. When there is nothing to offer the
    /// session is released fresh immediately.
    pub fn mount(session: &mut ExamSession) -> Self {
        session.enter_recovery();

        let loaded = session.local_checkpoint().load();
        let submitted_leftover = matches!(&loaded, Some(c) if c.status == SessionStatus::Submitted);

        match decide(loaded) {
            RecoveryDecision::StartFresh => {
                if submitted_leftover {
                    session.local_checkpoint().clear();
                }
                session.release_fresh();
                Self { pending: None }
            }
            RecoveryDecision::Offer(checkpoint) => {
                tracing::info!(
                    "Found unfinished attempt for {} saved at {}",
                    session.identity(),
                    checkpoint.saved_at
                );
                Self {
                    pending: Some(checkpoint),
                }
            }
        }
    }

    /// A restore prompt must be shown.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn summary(&self) -> Option<RecoverySummary> {
        self.pending.as_ref().map(RecoverySummary::from_checkpoint)
    }

    /// Resumes exactly where the checkpoint left off.
    pub fn accept(self, session: &mut ExamSession) -> bool {
        match self.pending {
            Some(checkpoint) => {
                session.restore_from(checkpoint);
                true
            }
            None => false,
        }
    }

    /// Throws the checkpoint away and starts clean.
    pub fn decline(self, session: &mut ExamSession) {
        if self.pending.is_some() {
            tracing::info!("Discarding unfinished attempt for {}", session.identity());
            session.local_checkpoint().clear();
        }
        session.release_fresh();
    }
}
