// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate exam identity)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Failure of the on-device key-value store backing the checkpoint.
/// Never surfaced to the user; the checkpoint layer logs and moves on.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),

    // Store disabled, quota exhausted, lock poisoned.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "storage io error: {}", err),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

/// Failure of a single remote sync send.
#[derive(Debug)]
pub enum SyncError {
    // Request never got an HTTP answer.
    Network(String),

    // Server answered with a non-success status.
    Rejected(u16, String),

    // No answer within the request or final-send budget.
    Timeout,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(msg) => write!(f, "sync network error: {}", msg),
            SyncError::Rejected(status, msg) => write!(f, "sync rejected ({}): {}", status, msg),
            SyncError::Timeout => write!(f, "sync timed out"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Failure of the initial question-set fetch. The only gating error:
/// no exam is offered when this happens.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    // The exam does not exist.
    NotFound(String),

    // Network or server trouble; retrying later may help.
    Transient(String),

    // The server answered with something we cannot run an exam from.
    Invalid(String),
}

impl FetchError {
    /// Message suitable for showing in place of the exam.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NotFound(identity) => format!("Exam '{}' does not exist.", identity),
            FetchError::Transient(_) => {
                "The exam could not be loaded right now. Check your connection and try again."
                    .to_string()
            }
            FetchError::Invalid(_) => "The exam data is damaged and cannot be opened.".to_string(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(identity) => write!(f, "exam not found: {}", identity),
            FetchError::Transient(msg) => write!(f, "transient fetch error: {}", msg),
            FetchError::Invalid(msg) => write!(f, "invalid exam payload: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}
