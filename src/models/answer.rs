// src/models/answer.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::question::QuestionKind;

/// A single answer, tagged by the kind of question it answers.
///
/// Serialized as `{"kind": "single_choice", "value": "B"}` so that both the
/// local checkpoint and the sync payload can reject mismatched shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Identifier of the chosen option.
    SingleChoice(String),
    FreeText(String),
    /// Chosen option identifiers, in selection order.
    MultiSelect(Vec<String>),
    Numeric(f64),
}

impl AnswerValue {
    /// The question kind this answer shape belongs to.
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerValue::SingleChoice(_) => QuestionKind::SingleChoice,
            AnswerValue::FreeText(_) => QuestionKind::FreeText,
            AnswerValue::MultiSelect(_) => QuestionKind::MultiSelect,
            AnswerValue::Numeric(_) => QuestionKind::Numeric,
        }
    }

    /// Non-finite numbers cannot survive a JSON round trip.
    pub fn is_well_formed(&self) -> bool {
        match self {
            AnswerValue::Numeric(n) => n.is_finite(),
            _ => true,
        }
    }
}

/// Question id to answer. Key order carries no meaning.
pub type AnswerMap = HashMap<String, AnswerValue>;
