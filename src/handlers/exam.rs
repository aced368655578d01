// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateExamRequest, ExamRow, Question, QuestionRow, QuestionSet},
        session::SessionIdentity,
    },
};

/// Loads an exam and its ordered questions.
pub(crate) async fn load_question_set(
    pool: &SqlitePool,
    identity: &str,
) -> Result<QuestionSet, AppError> {
    let exam = sqlx::query_as::<_, ExamRow>(
        "SELECT identity, title, duration_minutes FROM exams WHERE identity = ?",
    )
    .bind(identity)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Exam '{}' not found", identity)))?;

    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, kind, prompt, choices
        FROM questions
        WHERE exam_identity = ?
        ORDER BY position
        "#,
    )
    .bind(identity)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions of {}: {:?}", identity, e);
        AppError::InternalServerError(e.to_string())
    })?;

    let questions = rows
        .into_iter()
        .map(Question::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::InternalServerError)?;

    let duration_seconds = u32::try_from(exam.duration_minutes * 60)
        .map_err(|_| AppError::InternalServerError("exam duration out of range".to_string()))?;

    Ok(QuestionSet {
        identity: SessionIdentity::new(exam.identity),
        title: exam.title,
        duration_seconds,
        question_count: questions.len(),
        questions,
    })
}

/// Returns an exam: ordered questions, duration in seconds, question count.
pub async fn get_exam(
    State(pool): State<SqlitePool>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let set = load_question_set(&pool, &identity).await?;
    Ok(Json(set))
}

/// Creates an exam with its questions in one transaction.
///
/// * 400 on validation failure (lengths, duplicate ids, choice questions
///   without choices).
/// * 409 if the identity is taken.
pub async fn create_exam(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    payload.check_questions().map_err(AppError::BadRequest)?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO exams (identity, title, duration_minutes) VALUES (?, ?, ?)")
        .bind(&payload.identity)
        .bind(&payload.title)
        .bind(payload.duration_minutes)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if duplicate {
                AppError::Conflict(format!("Exam '{}' already exists", payload.identity))
            } else {
                tracing::error!("Failed to create exam: {:?}", e);
                AppError::from(e)
            }
        })?;

    for (position, question) in payload.questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO questions (exam_identity, id, position, kind, prompt, choices)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.identity)
        .bind(&question.id)
        .bind(position as i64)
        .bind(question.kind.as_str())
        .bind(&question.prompt)
        .bind(sqlx::types::Json(&question.choices))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Created exam {} with {} questions",
        payload.identity,
        payload.questions.len()
    );

    let set = load_question_set(&pool, &payload.identity).await?;
    Ok((StatusCode::CREATED, Json(set)))
}
