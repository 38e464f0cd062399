use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("correct answer is empty")]
    EmptyAnswer,

    #[error("category is empty")]
    EmptyCategory,
}

/// A trivia question as served to players.
///
/// Immutable after load; the catalog is read-only at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    correct_answer: String,
    options: Vec<String>,
    category: String,
}

impl Question {
    /// Build a question from stored fields.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if text, answer, or category is blank.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        correct_answer: impl Into<String>,
        options: Vec<String>,
        category: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        let correct_answer = correct_answer.into();
        let category = category.into();

        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if correct_answer.trim().is_empty() {
            return Err(QuestionError::EmptyAnswer);
        }
        if category.trim().is_empty() {
            return Err(QuestionError::EmptyCategory);
        }

        Ok(Self {
            id,
            text,
            correct_answer,
            options,
            category,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Id-less catalog record used for bulk import at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSeed {
    pub text: String,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub category: String,
}
