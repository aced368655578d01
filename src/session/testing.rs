// src/session/testing.rs

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::SessionSettings,
    error::SyncError,
    models::{
        question::QuestionKind,
        session::{RemoteSyncRecord, SessionIdentity},
    },
    session::{
        checkpoint::MemoryStore,
        machine::{ExamPlan, ExamSession, PlannedQuestion},
        sync::SyncTransport,
    },
};

/// Transport that records what it was given.
#[derive(Default)]
pub struct FakeTransport {
    pushed: Mutex<Vec<RemoteSyncRecord>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<RemoteSyncRecord> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTransport for FakeTransport {
    async fn push(
        &self,
        _identity: &SessionIdentity,
        record: &RemoteSyncRecord,
    ) -> Result<(), SyncError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Network("connection refused".to_string()));
        }
        self.pushed.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// `count` single-choice questions named `q1..=q{count}`.
pub fn plan(duration_seconds: u32, count: usize) -> ExamPlan {
    ExamPlan {
        duration_seconds,
        questions: (1..=count)
            .map(|i| PlannedQuestion {
                id: format!("q{}", i),
                kind: QuestionKind::SingleChoice,
            })
            .collect(),
    }
}

pub fn session(plan: ExamPlan) -> (ExamSession, Arc<MemoryStore>, Arc<FakeTransport>) {
    session_with(plan, Arc::new(FakeTransport::new()))
}

pub fn session_with(
    plan: ExamPlan,
    transport: Arc<FakeTransport>,
) -> (ExamSession, Arc<MemoryStore>, Arc<FakeTransport>) {
    let store = Arc::new(MemoryStore::new());
    let session = ExamSession::new(
        SessionIdentity::new("exam-under-test"),
        plan,
        store.clone(),
        transport.clone(),
        &SessionSettings::default(),
    );
    (session, store, transport)
}

/// A session over an existing store, as after a reload.
pub fn session_on(plan: ExamPlan, store: Arc<MemoryStore>) -> (ExamSession, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let session = ExamSession::new(
        SessionIdentity::new("exam-under-test"),
        plan,
        store,
        transport.clone(),
        &SessionSettings::default(),
    );
    (session, transport)
}
