// src/models/question.rs

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::session::SessionIdentity;

/// Question type. Decides which `AnswerValue` shape is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultiSelect,
    FreeText,
    Numeric,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultiSelect => "multi_select",
            QuestionKind::FreeText => "free_text",
            QuestionKind::Numeric => "numeric",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "single_choice" => Some(QuestionKind::SingleChoice),
            "multi_select" => Some(QuestionKind::MultiSelect),
            "free_text" => Some(QuestionKind::FreeText),
            "numeric" => Some(QuestionKind::Numeric),
            _ => None,
        }
    }

    /// Choice questions must ship with at least one option.
    pub fn needs_choices(self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::MultiSelect)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question as delivered to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub choices: Vec<String>,
}

/// An exam as delivered to the client: ordered questions plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub identity: SessionIdentity,
    pub title: String,
    pub duration_seconds: u32,
    pub question_count: usize,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Checks the metadata agrees with the payload.
    pub fn is_consistent(&self) -> bool {
        self.duration_seconds > 0
            && self.question_count == self.questions.len()
            && self.question_count > 0
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct ExamRow {
    pub identity: String,
    pub title: String,
    pub duration_minutes: i64,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: String,

    /// Stored as the `QuestionKind::as_str` text.
    pub kind: String,

    pub prompt: String,

    /// Stored as a JSON array in the database.
    pub choices: Json<Vec<String>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = String;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = QuestionKind::parse(&row.kind)
            .ok_or_else(|| format!("unknown question kind '{}' on question {}", row.kind, row.id))?;
        Ok(Question {
            id: row.id,
            kind,
            prompt: row.prompt,
            choices: row.choices.0,
        })
    }
}

/// DTO for creating a new exam together with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 128))]
    pub identity: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration_minutes: i64,
    #[validate(length(min = 1, max = 500), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

impl CreateExamRequest {
    /// Cross-field checks the derive cannot express.
    pub fn check_questions(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(format!("Duplicate question id '{}'", question.id));
            }
            if question.kind.needs_choices() && question.choices.is_empty() {
                return Err(format!("Question '{}' needs at least one choice", question.id));
            }
        }
        Ok(())
    }
}

/// DTO for a single question inside `CreateExamRequest`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    pub kind: QuestionKind,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    #[serde(default)]
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<String>,
}

fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    if choices.len() > 26 {
        return Err(validator::ValidationError::new("too_many_choices"));
    }
    for choice in choices {
        if choice.is_empty() || choice.len() > 500 {
            return Err(validator::ValidationError::new("invalid_choice_length"));
        }
    }
    Ok(())
}
