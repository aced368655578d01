// src/session/machine.rs

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::{
    config::SessionSettings,
    error::SyncError,
    models::{
        answer::{AnswerMap, AnswerValue},
        question::{QuestionKind, QuestionSet},
        session::{RemoteSyncRecord, SessionIdentity, SessionStatus},
    },
    session::{
        checkpoint::{CHECKPOINT_VERSION, Checkpoint, KeyValueStore, LocalCheckpoint},
        sync::{RemoteSync, SyncTransport},
    },
    utils::time::{Clock, SystemClock},
};

/// What the state machine needs to know about an exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamPlan {
    pub duration_seconds: u32,
    pub questions: Vec<PlannedQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuestion {
    pub id: String,
    pub kind: QuestionKind,
}

impl ExamPlan {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    fn kind_of(&self, question_id: &str) -> Option<QuestionKind> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.kind)
    }
}

impl From<&QuestionSet> for ExamPlan {
    fn from(set: &QuestionSet) -> Self {
        Self {
            duration_seconds: set.duration_seconds,
            questions: set
                .questions
                .iter()
                .map(|q| PlannedQuestion {
                    id: q.id.clone(),
                    kind: q.kind,
                })
                .collect(),
        }
    }
}

/// Restartable quiet-period timer for answer checkpoints.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Bounded remote send. Runs to completion or gives up with `Timeout`.
async fn send_within(
    remote: &RemoteSync,
    record: &RemoteSyncRecord,
    limit: Duration,
) -> Result<(), SyncError> {
    match tokio::time::timeout(limit, remote.send(record)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Sync gave up after {:?}", limit);
            Err(SyncError::Timeout)
        }
    }
}

/// Outcome of a periodic send, handed back via [`ExamSession::settle_sync`].
#[derive(Debug)]
pub struct SyncReport {
    generation: u64,
    result: Result<(), SyncError>,
}

/// The single authority over one exam attempt.
///
/// Every mutator checks its precondition and silently ignores the call when
/// it does not hold, so late timer ticks or stray UI events can never touch
/// a terminal attempt. Mutators report whether they applied.
pub struct ExamSession {
    identity: SessionIdentity,
    plan: ExamPlan,
    status: SessionStatus,
    time_left: u32,
    answers: AnswerMap,
    pointer: usize,
    session_start: Option<DateTime<Utc>>,
    recovering: bool,
    answers_dirty: bool,
    // Bumped on every answer change; a sync only clears `answers_dirty`
    // when nothing changed since its record was taken.
    generation: u64,
    debounce: Debouncer,
    checkpoint: LocalCheckpoint,
    remote: RemoteSync,
    clock: Arc<dyn Clock>,
    final_sync_timeout: Duration,
    request_timeout: Duration,
}

impl ExamSession {
    pub fn new(
        identity: SessionIdentity,
        plan: ExamPlan,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn SyncTransport>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            checkpoint: LocalCheckpoint::new(store, identity.clone()),
            remote: RemoteSync::new(transport, identity.clone()),
            identity,
            status: SessionStatus::NotStarted,
            time_left: plan.duration_seconds,
            plan,
            answers: AnswerMap::new(),
            pointer: 0,
            session_start: None,
            recovering: false,
            answers_dirty: false,
            generation: 0,
            debounce: Debouncer::new(settings.checkpoint_debounce),
            clock: Arc::new(SystemClock),
            final_sync_timeout: settings.final_sync_timeout,
            request_timeout: settings.request_timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn plan(&self) -> &ExamPlan {
        &self.plan
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering
    }

    /// Answers changed since the last successful sync.
    pub fn has_unsynced_answers(&self) -> bool {
        self.answers_dirty
    }

    pub fn question_count(&self) -> usize {
        self.plan.question_count()
    }

    pub fn local_checkpoint(&self) -> &LocalCheckpoint {
        &self.checkpoint
    }

    /// When the pending answer checkpoint is due, if one is pending.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce.deadline
    }

    fn accepts_input(&self) -> bool {
        !self.recovering && self.status == SessionStatus::InProgress
    }

    /// Snapshot of the current state, built at call time.
    pub fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            answers: self.answers.clone(),
            time_left: self.time_left,
            status: self.status,
            session_start: self.session_start,
            pointer: self.pointer,
            saved_at: self.clock.now(),
        }
    }

    pub fn sync_record(&self) -> RemoteSyncRecord {
        RemoteSyncRecord {
            answers: self.answers.clone(),
            time_left: self.time_left,
            status: self.status,
            sent_at: self.clock.now(),
        }
    }

    /// Immediate checkpoint write. Also satisfies any pending debounced one.
    fn write_checkpoint(&mut self) {
        self.debounce.cancel();
        self.checkpoint.save(&self.snapshot());
    }

    pub fn start(&mut self) -> bool {
        if self.recovering || self.status != SessionStatus::NotStarted {
            tracing::debug!("Ignoring start of {} in {}", self.identity, self.status);
            return false;
        }

        self.status = SessionStatus::InProgress;
        self.session_start = Some(self.clock.now());
        self.time_left = self.plan.duration_seconds;
        self.write_checkpoint();

        tracing::info!(
            "Exam {} started with {}s on the clock",
            self.identity,
            self.time_left
        );
        true
    }

    /// Upserts an answer. The shape must match the question kind.
    pub fn set_answer(&mut self, question_id: impl Into<String>, value: AnswerValue) -> bool {
        let question_id = question_id.into();
        if !self.accepts_input() {
            tracing::debug!("Ignoring answer to {} in {}", question_id, self.status);
            return false;
        }

        match self.plan.kind_of(&question_id) {
            Some(kind) if kind == value.kind() && value.is_well_formed() => {}
            Some(kind) => {
                tracing::warn!(
                    "Rejecting {} answer for {} question {}",
                    value.kind(),
                    kind,
                    question_id
                );
                return false;
            }
            None => {
                tracing::warn!("Rejecting answer for unknown question {}", question_id);
                return false;
            }
        }

        self.answers.insert(question_id, value);
        self.answers_dirty = true;
        self.generation += 1;
        self.debounce.schedule(Instant::now());
        true
    }

    /// Writes the debounced checkpoint if its quiet period has elapsed.
    pub fn flush_due_checkpoint(&mut self) -> bool {
        if !self.debounce.take_due(Instant::now()) {
            return false;
        }
        if self.status == SessionStatus::InProgress {
            self.checkpoint.save(&self.snapshot());
        }
        true
    }

    /// Writes a pending debounced checkpoint right away (teardown).
    pub fn flush_pending_checkpoint(&mut self) {
        if self.debounce.deadline.is_some() && self.status == SessionStatus::InProgress {
            self.write_checkpoint();
        }
        self.debounce.cancel();
    }

    /// One second off the clock.
    ///
    /// Reaching zero ends the attempt as `TimeUp`: a final sync is sent and
    /// the checkpoint removed. Every whole minute forces a checkpoint write.
    pub async fn tick(&mut self) -> bool {
        if !self.accepts_input() || self.time_left == 0 {
            return false;
        }

        self.time_left -= 1;

        if self.time_left == 0 {
            tracing::info!("Time is up for {}", self.identity);
            self.finish(SessionStatus::TimeUp).await;
        } else if self.time_left % 60 == 0 {
            self.write_checkpoint();
        }
        true
    }

    pub fn navigate(&mut self, index: usize) -> bool {
        if self.recovering || self.status.is_terminal() || index >= self.question_count() {
            tracing::debug!("Ignoring navigation to {} in {}", index, self.status);
            return false;
        }

        self.pointer = index;
        if self.status == SessionStatus::InProgress {
            self.write_checkpoint();
        }
        true
    }

    /// Submission intent. Changes nothing; tells the caller whether a
    /// confirmation should be shown.
    pub fn request_submit(&self) -> bool {
        self.accepts_input()
    }

    /// Ends the attempt as `Submitted`. A failed final sync does not keep the
    /// attempt open.
    pub async fn confirm_submit(&mut self) -> bool {
        if !self.accepts_input() {
            tracing::debug!("Ignoring submit of {} in {}", self.identity, self.status);
            return false;
        }

        tracing::info!(
            "Submitting {} with {} answers and {}s left",
            self.identity,
            self.answers.len(),
            self.time_left
        );
        self.finish(SessionStatus::Submitted).await;
        true
    }

    async fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        self.debounce.cancel();

        let record = self.sync_record();
        match send_within(&self.remote, &record, self.final_sync_timeout).await {
            Ok(()) => self.answers_dirty = false,
            Err(e) => tracing::warn!(
                "Final sync of {} lost ({}), ending as {} anyway",
                self.identity,
                e,
                status
            ),
        }

        self.checkpoint.clear();
    }

    /// Snapshots the current state into a self-contained send, bounded by
    /// the request timeout. `None` unless the attempt is running.
    ///
    /// The returned future borrows nothing, so a driver can run it off its
    /// own task and report back through [`settle_sync`](Self::settle_sync).
    pub fn periodic_sync(&self) -> Option<impl Future<Output = SyncReport> + Send + use<>> {
        if !self.accepts_input() {
            return None;
        }

        let remote = self.remote.clone();
        let record = self.sync_record();
        let generation = self.generation;
        let limit = self.request_timeout;
        Some(async move {
            SyncReport {
                generation,
                result: send_within(&remote, &record, limit).await,
            }
        })
    }

    /// Applies the outcome of a periodic send. A failed push forces a local
    /// checkpoint write so the state is at least durable on this device.
    pub fn settle_sync(&mut self, report: SyncReport) -> bool {
        match report.result {
            Ok(()) => {
                if report.generation == self.generation {
                    self.answers_dirty = false;
                }
                true
            }
            Err(_) => {
                if self.accepts_input() {
                    self.write_checkpoint();
                }
                false
            }
        }
    }

    /// Periodic push awaited in place.
    pub async fn sync_now(&mut self) -> bool {
        let Some(job) = self.periodic_sync() else {
            return false;
        };
        let report = job.await;
        self.settle_sync(report)
    }

    /// Page hide/unload. Writes the checkpoint synchronously and fires a
    /// detached sync. Returns whether the user should be asked to confirm
    /// leaving.
    pub fn page_hide(&mut self) -> bool {
        if !self.accepts_input() {
            return false;
        }

        self.write_checkpoint();
        self.remote.send_detached(self.sync_record());
        true
    }

    pub(crate) fn enter_recovery(&mut self) {
        self.recovering = true;
    }

    /// Leaves recovery with default state.
    pub(crate) fn release_fresh(&mut self) {
        self.recovering = false;
        self.status = SessionStatus::NotStarted;
        self.time_left = self.plan.duration_seconds;
        self.answers.clear();
        self.pointer = 0;
        self.session_start = None;
        self.answers_dirty = false;
        self.debounce.cancel();
    }

    /// Leaves recovery with the checkpoint's state, bypassing `start`.
    pub(crate) fn restore_from(&mut self, checkpoint: Checkpoint) {
        self.recovering = false;
        self.status = checkpoint.status;
        self.time_left = checkpoint.time_left;
        self.answers = checkpoint.answers;
        self.session_start = checkpoint.session_start;
        self.pointer = if checkpoint.pointer < self.question_count() {
            checkpoint.pointer
        } else {
            0
        };
        // The server may be behind whatever was saved locally.
        self.answers_dirty = !self.answers.is_empty();
        self.generation += 1;
        self.debounce.cancel();

        if self.status.is_terminal() {
            self.checkpoint.clear();
        }

        tracing::info!(
            "Restored {} ({}, {} answers, {}s left)",
            self.identity,
            self.status,
            self.answers.len(),
            self.time_left
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{FakeTransport, plan, session};

    fn choice(value: &str) -> AnswerValue {
        AnswerValue::SingleChoice(value.to_string())
    }

    #[tokio::test]
    async fn test_start_enters_progress_and_checkpoints() {
        let (mut s, store, _) = session(plan(90, 3));

        assert!(s.start());
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(s.time_left(), 90);
        assert!(s.session_start().is_some());
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            s.local_checkpoint().load().map(|c| c.status),
            Some(SessionStatus::InProgress)
        );

        assert!(!s.start());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_mutations_before_start_are_ignored() {
        let (mut s, store, _) = session(plan(90, 3));

        assert!(!s.set_answer("q1", choice("A")));
        assert!(!s.tick().await);
        assert!(!s.confirm_submit().await);
        assert!(!s.request_submit());
        assert!(s.answers().is_empty());
        assert_eq!(s.time_left(), 90);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_timer_is_monotonic_and_floors_at_zero() {
        let (mut s, _, _) = session(plan(150, 1));
        s.start();

        let mut previous = s.time_left();
        for _ in 0..200 {
            s.tick().await;
            assert!(s.time_left() <= previous);
            previous = s.time_left();
        }
        assert_eq!(s.time_left(), 0);
        assert_eq!(s.status(), SessionStatus::TimeUp);
    }

    #[tokio::test]
    async fn test_minute_boundary_forces_checkpoint() {
        let (mut s, store, _) = session(plan(122, 1));
        s.start();
        let after_start = store.write_count();

        s.tick().await; // 121
        assert_eq!(store.write_count(), after_start);
        s.tick().await; // 120
        assert_eq!(store.write_count(), after_start + 1);
        assert_eq!(s.local_checkpoint().load().map(|c| c.time_left), Some(120));
    }

    #[tokio::test]
    async fn test_time_up_is_terminal() {
        let (mut s, _, transport) = session(plan(2, 1));
        s.start();

        s.tick().await;
        assert_eq!(s.status(), SessionStatus::InProgress);
        s.tick().await;
        assert_eq!(s.status(), SessionStatus::TimeUp);

        assert!(!s.tick().await);
        assert_eq!(s.time_left(), 0);

        let pushed = transport.pushed();
        assert_eq!(pushed.last().map(|r| r.status), Some(SessionStatus::TimeUp));
        assert!(s.local_checkpoint().load().is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_is_immutable() {
        let (mut s, _, _) = session(plan(600, 3));
        s.start();
        s.set_answer("q1", choice("A"));
        s.navigate(1);
        assert!(s.confirm_submit().await);

        let answers = s.answers().clone();
        let time_left = s.time_left();

        assert!(!s.set_answer("q2", choice("B")));
        assert!(!s.set_answer("q1", choice("C")));
        assert!(!s.tick().await);
        assert!(!s.navigate(2));
        assert!(!s.confirm_submit().await);
        assert!(!s.page_hide());

        assert_eq!(s.answers(), &answers);
        assert_eq!(s.time_left(), time_left);
        assert_eq!(s.pointer(), 1);
        assert_eq!(s.status(), SessionStatus::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_burst_coalesces_into_one_write() {
        let (mut s, store, _) = session(plan(600, 3));
        s.start();
        let after_start = store.write_count();

        s.set_answer("q1", choice("A"));
        tokio::time::advance(Duration::from_millis(700)).await;
        s.set_answer("q1", choice("B"));
        tokio::time::advance(Duration::from_millis(700)).await;
        s.set_answer("q1", choice("C"));

        // Window restarted by the third answer: not due yet.
        tokio::time::advance(Duration::from_millis(1_900)).await;
        assert!(!s.flush_due_checkpoint());
        assert_eq!(store.write_count(), after_start);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(s.flush_due_checkpoint());
        assert!(!s.flush_due_checkpoint());

        assert_eq!(store.write_count(), after_start + 1);
        let saved = s.local_checkpoint().load().unwrap();
        assert_eq!(saved.answers.get("q1"), Some(&choice("C")));
    }

    #[tokio::test]
    async fn test_answer_shape_is_validated() {
        let (mut s, _, _) = session(plan(600, 3));
        s.start();

        assert!(!s.set_answer("q1", AnswerValue::FreeText("A".to_string())));
        assert!(!s.set_answer("q9", choice("A")));
        assert!(s.answers().is_empty());
        assert!(!s.has_unsynced_answers());

        assert!(s.set_answer("q1", choice("A")));
        assert!(s.has_unsynced_answers());
    }

    #[tokio::test]
    async fn test_navigate_bounds_and_checkpoint() {
        let (mut s, store, _) = session(plan(600, 3));
        s.start();
        let after_start = store.write_count();

        assert!(!s.navigate(3));
        assert_eq!(s.pointer(), 0);
        assert!(s.navigate(2));
        assert_eq!(store.write_count(), after_start + 1);
        assert_eq!(s.local_checkpoint().load().map(|c| c.pointer), Some(2));
    }

    #[tokio::test]
    async fn test_request_submit_changes_nothing() {
        let (mut s, store, transport) = session(plan(600, 3));
        s.start();
        let writes = store.write_count();

        assert!(s.request_submit());
        assert_eq!(s.status(), SessionStatus::InProgress);
        assert_eq!(store.write_count(), writes);
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_submit_is_optimistic_when_server_is_down() {
        let (mut s, _, transport) = session(plan(600, 3));
        s.start();
        s.set_answer("q2", choice("B"));
        transport.set_failing(true);

        assert!(s.confirm_submit().await);
        assert_eq!(s.status(), SessionStatus::Submitted);
        assert_eq!(transport.attempts(), 1);
        assert!(s.local_checkpoint().load().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_final_sync_is_bounded() {
        let (mut s, _, transport) = session(plan(600, 3));
        s.start();
        transport.set_delay(Duration::from_secs(60));

        assert!(s.confirm_submit().await);
        assert_eq!(s.status(), SessionStatus::Submitted);
        assert!(s.local_checkpoint().load().is_none());
    }

    #[tokio::test]
    async fn test_failed_sync_falls_back_to_checkpoint() {
        let (mut s, store, transport) = session(plan(600, 3));
        s.start();
        s.set_answer("q1", choice("A"));
        let writes = store.write_count();
        transport.set_failing(true);

        assert!(!s.sync_now().await);
        assert_eq!(store.write_count(), writes + 1);
        assert!(s.debounce_deadline().is_none());
        assert!(s.has_unsynced_answers());

        transport.set_failing(false);
        assert!(s.sync_now().await);
        assert!(!s.has_unsynced_answers());
        assert_eq!(transport.pushed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_periodic_sync_gives_up_and_checkpoints() {
        let (mut s, store, transport) = session(plan(600, 3));
        s.start();
        s.set_answer("q1", choice("A"));
        let writes = store.write_count();
        transport.set_delay(Duration::from_secs(60));

        let started = Instant::now();
        assert!(!s.sync_now().await);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(store.write_count(), writes + 1);
        assert!(s.has_unsynced_answers());
    }

    #[tokio::test]
    async fn test_answer_during_sync_stays_unsynced() {
        let (mut s, _, transport) = session(plan(600, 3));
        s.start();
        s.set_answer("q1", choice("A"));

        let job = s.periodic_sync().unwrap();
        s.set_answer("q2", choice("B"));
        let report = job.await;

        assert!(s.settle_sync(report));
        assert!(s.has_unsynced_answers());
        assert_eq!(transport.pushed()[0].answers.len(), 1);
        assert!(s.sync_now().await);
        assert!(!s.has_unsynced_answers());
    }

    #[tokio::test]
    async fn test_late_failure_after_submit_writes_nothing() {
        let (mut s, store, transport) = session(plan(600, 3));
        s.start();
        transport.set_failing(true);
        let job = s.periodic_sync().unwrap();
        assert!(s.confirm_submit().await);
        let writes = store.write_count();

        let report = job.await;
        assert!(!s.settle_sync(report));
        assert_eq!(store.write_count(), writes);
        assert!(s.local_checkpoint().load().is_none());
        assert!(s.periodic_sync().is_none());
    }

    #[tokio::test]
    async fn test_sync_resends_full_state() {
        let (mut s, _, transport) = session(plan(600, 3));
        s.start();
        s.set_answer("q1", choice("A"));
        s.sync_now().await;
        s.set_answer("q2", choice("B"));
        s.sync_now().await;

        let pushed = transport.pushed();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[1].answers.len(), 2);
    }

    #[tokio::test]
    async fn test_page_hide_flushes_and_prompts() {
        let (mut s, store, transport) = session(plan(600, 3));
        assert!(!s.page_hide());

        s.start();
        s.set_answer("q3", choice("D"));
        let writes = store.write_count();

        assert!(s.page_hide());
        assert_eq!(store.write_count(), writes + 1);
        assert!(s.debounce_deadline().is_none());

        for _ in 0..10 {
            if transport.attempts() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let transport = std::sync::Arc::new(FakeTransport::new());
        let (mut s, _, _) = crate::session::testing::session_with(plan(5400, 3), transport);

        s.start();
        s.set_answer("q1", choice("B"));
        for _ in 0..60 {
            s.tick().await;
        }

        assert_eq!(s.time_left(), 5340);
        assert_eq!(s.answers().len(), 1);
        assert_eq!(s.answers().get("q1"), Some(&choice("B")));
        let saved = s.local_checkpoint().load().unwrap();
        assert_eq!(saved.time_left, 5340);
        assert_eq!(saved.answers.get("q1"), Some(&choice("B")));

        s.confirm_submit().await;
        assert_eq!(s.status(), SessionStatus::Submitted);
        assert!(s.local_checkpoint().load().is_none());
    }

    #[tokio::test]
    async fn test_epochs_come_from_the_clock() {
        use crate::utils::time::ManualClock;
        use chrono::TimeZone;

        let started = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(started));
        let (s, _, transport) = session(plan(600, 2));
        let mut s = s.with_clock(clock.clone());

        s.start();
        assert_eq!(s.session_start(), Some(started));

        clock.advance(chrono::Duration::seconds(30));
        s.set_answer("q2", choice("A"));
        assert!(s.sync_now().await);
        assert_eq!(transport.pushed()[0].sent_at, started + chrono::Duration::seconds(30));
        assert_eq!(s.snapshot().saved_at, started + chrono::Duration::seconds(30));
        assert_eq!(s.snapshot().session_start, Some(started));
    }
}
