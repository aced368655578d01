// src/session/driver.rs

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{self, Instant, Interval},
};

use crate::models::{
    answer::{AnswerMap, AnswerValue},
    session::{SessionIdentity, SessionStatus},
};

use super::machine::{ExamSession, SyncReport};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// User actions forwarded by the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Answer {
        question_id: String,
        value: AnswerValue,
    },
    Navigate(usize),
    RequestSubmit,
    ConfirmSubmit,
    PageHide,
}

/// What the rendering layer draws from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub identity: SessionIdentity,
    pub status: SessionStatus,
    pub time_left: u32,
    pub answers: AnswerMap,
    pub pointer: usize,
    pub is_recovering: bool,
    /// A submit was requested and awaits confirmation.
    pub confirm_pending: bool,
    /// The last page hide happened mid-exam; ask before leaving.
    pub leave_prompt: bool,
}

impl SessionView {
    fn of(session: &ExamSession) -> Self {
        Self {
            identity: session.identity().clone(),
            status: session.status(),
            time_left: session.time_left(),
            answers: session.answers().clone(),
            pointer: session.pointer(),
            is_recovering: session.is_recovering(),
            confirm_pending: false,
            leave_prompt: false,
        }
    }
}

enum Message {
    Command(SessionCommand),
    Teardown,
}

/// Owner side of a running session.
pub struct SessionHandle {
    messages: mpsc::UnboundedSender<Message>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<ExamSession>,
}

impl SessionHandle {
    /// Queues a command. `false` once the session has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.messages.send(Message::Command(command)).is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Stops the driver after the queued commands, cancelling its timers,
    /// flushing a pending answer checkpoint and sending the current state
    /// once more (bounded by the request timeout). Hands the session back.
    pub async fn teardown(self) -> Option<ExamSession> {
        let _ = self.messages.send(Message::Teardown);
        Self::join(self.task).await
    }

    /// Waits for the session to end on its own (submit or time up).
    pub async fn finished(self) -> Option<ExamSession> {
        Self::join(self.task).await
    }

    async fn join(task: JoinHandle<ExamSession>) -> Option<ExamSession> {
        match task.await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!("Session driver task failed: {}", e);
                None
            }
        }
    }
}

/// Runs one session on a single task: the per-second tick, the answer
/// debounce and user commands are all serialized here.
///
/// Periodic sends run on their own tasks so a slow server never holds up the
/// loop. At most one is in flight; its outcome comes back through the loop.
pub struct SessionDriver {
    session: ExamSession,
    sync_period: Duration,
    ticker: Option<Interval>,
    sync: Option<Interval>,
    in_flight: JoinSet<SyncReport>,
    view: watch::Sender<SessionView>,
}

impl SessionDriver {
    pub fn spawn(session: ExamSession, sync_period: Duration) -> SessionHandle {
        let (messages, inbox) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(SessionView::of(&session));

        let driver = SessionDriver {
            session,
            sync_period,
            ticker: None,
            sync: None,
            in_flight: JoinSet::new(),
            view,
        };
        let task = tokio::spawn(driver.run(inbox));

        SessionHandle {
            messages,
            view: view_rx,
            task,
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) -> ExamSession {
        self.arm_timers();

        loop {
            if self.session.status().is_terminal() {
                break;
            }

            let debounce_at = self.session.debounce_deadline();
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(Message::Command(command)) => self.apply(command).await,
                    Some(Message::Teardown) | None => {
                        self.session.flush_pending_checkpoint();
                        self.in_flight.abort_all();
                        self.session.sync_now().await;
                        break;
                    }
                },
                _ = next_tick(&mut self.ticker) => {
                    self.session.tick().await;
                    self.publish(|_| {});
                }
                _ = next_tick(&mut self.sync) => self.start_sync(),
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok(report) => {
                            self.session.settle_sync(report);
                        }
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => tracing::error!(
                            "Sync task for {} failed: {}",
                            self.session.identity(),
                            e
                        ),
                    }
                }
                _ = time::sleep_until(debounce_at.unwrap_or_else(far_future)), if debounce_at.is_some() => {
                    self.session.flush_due_checkpoint();
                }
            }

            self.arm_timers();
        }

        self.ticker = None;
        self.sync = None;
        // Superseded by the final send; the server ignores older records anyway.
        self.in_flight.abort_all();
        self.publish(|_| {});
        tracing::info!(
            "Session driver for {} stopped in {}",
            self.session.identity(),
            self.session.status()
        );
        self.session
    }

    async fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start => {
                self.session.start();
                self.publish(|_| {});
            }
            SessionCommand::Answer { question_id, value } => {
                self.session.set_answer(question_id, value);
                self.publish(|_| {});
            }
            SessionCommand::Navigate(index) => {
                self.session.navigate(index);
                self.publish(|_| {});
            }
            SessionCommand::RequestSubmit => {
                let pending = self.session.request_submit();
                self.publish(|view| view.confirm_pending = pending);
            }
            SessionCommand::ConfirmSubmit => {
                self.session.confirm_submit().await;
                self.publish(|_| {});
            }
            SessionCommand::PageHide => {
                let prompt = self.session.page_hide();
                self.publish(|view| view.leave_prompt = prompt);
            }
        }
    }

    fn start_sync(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::debug!(
                "Previous sync of {} still in flight, skipping this one",
                self.session.identity()
            );
            return;
        }
        if let Some(job) = self.session.periodic_sync() {
            self.in_flight.spawn(job);
        }
    }

    /// Timers exist exactly while the attempt is running.
    fn arm_timers(&mut self) {
        if self.session.status() == SessionStatus::InProgress && !self.session.is_recovering() {
            if self.ticker.is_none() {
                self.ticker = Some(time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD));
            }
            if self.sync.is_none() {
                self.sync = Some(time::interval_at(
                    Instant::now() + self.sync_period,
                    self.sync_period,
                ));
            }
        } else {
            self.ticker = None;
            self.sync = None;
        }
    }

    fn publish(&self, adjust: impl FnOnce(&mut SessionView)) {
        let previous = self.view.borrow().clone();
        let mut view = SessionView::of(&self.session);
        // Prompts persist until something clears them.
        view.confirm_pending = previous.confirm_pending && view.status == SessionStatus::InProgress;
        view.leave_prompt = previous.leave_prompt && view.status == SessionStatus::InProgress;
        adjust(&mut view);
        self.view.send_replace(view);
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}
