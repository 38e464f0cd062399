use chrono::{DateTime, Duration, Utc};

use crate::model::{Question, QuestionId};

/// The one in-flight question for a user.
///
/// Owned exclusively by the session table. Lives from question delivery
/// until the answer is submitted, the question is skipped, or the sweeper
/// abandons it on timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    question_id: QuestionId,
    correct_answer: String,
    question_text: String,
    category: String,
    last_activity: DateTime<Utc>,
}

impl ActiveSession {
    #[must_use]
    pub fn new(question: &Question, now: DateTime<Utc>) -> Self {
        Self {
            question_id: question.id(),
            correct_answer: question.correct_answer().to_owned(),
            question_text: question.text().to_owned(),
            category: question.category().to_owned(),
            last_activity: now,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Refresh the activity timestamp after a user action.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// True once the session has been idle strictly longer than `timeout`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    /// Exact comparison against the stored answer, after trimming
    /// surrounding whitespace and case-folding. No fuzzy matching.
    #[must_use]
    pub fn answer_matches(&self, raw: &str) -> bool {
        raw.trim().to_lowercase() == self.correct_answer.to_lowercase()
    }
}
