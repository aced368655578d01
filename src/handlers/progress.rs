// src/handlers/progress.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::session::{ProgressResponse, ProgressRow, RemoteSyncRecord, SessionStatus},
};

async fn exam_exists(pool: &SqlitePool, identity: &str) -> Result<bool, AppError> {
    let found: Option<(String,)> = sqlx::query_as("SELECT identity FROM exams WHERE identity = ?")
        .bind(identity)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn fetch_progress(
    pool: &SqlitePool,
    identity: &str,
) -> Result<Option<ProgressResponse>, AppError> {
    let row = sqlx::query_as::<_, ProgressRow>(
        r#"
        SELECT identity, answers, time_left, status, sent_at_ms
        FROM session_progress
        WHERE identity = ?
        "#,
    )
    .bind(identity)
    .fetch_optional(pool)
    .await?;

    row.map(ProgressResponse::try_from)
        .transpose()
        .map_err(AppError::InternalServerError)
}

/// Accepts a full-state progress record from the client.
///
/// Upsert semantics, so repeating a record changes nothing. Two guards keep
/// the stored row from moving backwards:
/// * a terminal status (`submitted`, `time_up`) is never overwritten;
/// * a record sent earlier than the stored one is ignored.
///
/// Returns whatever progress is stored after the call.
pub async fn put_progress(
    State(pool): State<SqlitePool>,
    Path(identity): Path<String>,
    Json(record): Json<RemoteSyncRecord>,
) -> Result<impl IntoResponse, AppError> {
    if !exam_exists(&pool, &identity).await? {
        return Err(AppError::NotFound(format!("Exam '{}' not found", identity)));
    }
    if record.status == SessionStatus::NotStarted {
        return Err(AppError::BadRequest(
            "Progress of an exam that has not started cannot be recorded".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO session_progress (identity, answers, time_left, status, sent_at_ms)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(identity) DO UPDATE SET
            answers = excluded.answers,
            time_left = excluded.time_left,
            status = excluded.status,
            sent_at_ms = excluded.sent_at_ms,
            updated_at = CURRENT_TIMESTAMP
        WHERE session_progress.status NOT IN ('submitted', 'time_up')
          AND excluded.sent_at_ms >= session_progress.sent_at_ms
        "#,
    )
    .bind(&identity)
    .bind(sqlx::types::Json(&record.answers))
    .bind(i64::from(record.time_left))
    .bind(record.status.as_str())
    .bind(record.sent_at.timestamp_millis())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert progress of {}: {:?}", identity, e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        tracing::debug!("Progress for {} superseded, kept stored row", identity);
    }

    let stored = fetch_progress(&pool, &identity)
        .await?
        .ok_or_else(|| AppError::InternalServerError("progress vanished after upsert".to_string()))?;

    Ok(Json(stored))
}

/// Returns the last progress recorded for an exam.
pub async fn get_progress(
    State(pool): State<SqlitePool>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let stored = fetch_progress(&pool, &identity)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No progress recorded for '{}'", identity)))?;

    Ok(Json(stored))
}
