// src/models/session.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::answer::AnswerMap;

/// Opaque key of one exam attempt (exam/version or topic id).
/// Every local storage key and remote endpoint is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key the local checkpoint lives under.
    pub fn storage_key(&self) -> String {
        format!("exam-session:{}", self.0)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an attempt.
///
/// `NotStarted -> InProgress` is the only entry edge. `Submitted` and
/// `TimeUp` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    InProgress,
    Submitted,
    TimeUp,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::TimeUp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Submitted => "submitted",
            SessionStatus::TimeUp => "time_up",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_started" => Some(SessionStatus::NotStarted),
            "in_progress" => Some(SessionStatus::InProgress),
            "submitted" => Some(SessionStatus::Submitted),
            "time_up" => Some(SessionStatus::TimeUp),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload pushed to the server. Always the full answer map, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSyncRecord {
    pub answers: AnswerMap,
    pub time_left: u32,
    pub status: SessionStatus,
    pub sent_at: DateTime<Utc>,
}

/// Represents the 'session_progress' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    pub identity: String,
    pub answers: Json<AnswerMap>,
    pub time_left: i64,
    pub status: String,
    pub sent_at_ms: i64,
}

/// Last progress the server accepted for an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub identity: SessionIdentity,
    pub answers: AnswerMap,
    pub time_left: u32,
    pub status: SessionStatus,
    pub sent_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for ProgressResponse {
    type Error = String;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown session status '{}'", row.status))?;
        let sent_at = DateTime::from_timestamp_millis(row.sent_at_ms)
            .ok_or_else(|| format!("sent_at out of range: {}", row.sent_at_ms))?;
        let time_left = u32::try_from(row.time_left)
            .map_err(|_| format!("time_left out of range: {}", row.time_left))?;
        Ok(ProgressResponse {
            identity: SessionIdentity::new(row.identity),
            answers: row.answers.0,
            time_left,
            status,
            sent_at,
        })
    }
}
