use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use trivia_core::model::{
    LeaderboardEntry, Question, QuestionId, QuestionSeed, UserId, UserStats,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read-only (at runtime) repository of trivia questions plus the per-user
/// answered history that drives selection.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Pick one question the user has not answered yet, uniformly at random
    /// over the eligible set, optionally restricted to an exact category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn find_random_unanswered(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> Result<Option<Question>, StorageError>;

    /// Total number of questions in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn count_questions(&self) -> Result<u64, StorageError>;

    /// Bulk-insert the catalog. Run once at startup when the store is empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any insert fails.
    async fn import_catalog(&self, seeds: &[QuestionSeed]) -> Result<(), StorageError>;

    /// Distinct categories, sorted, for display.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn list_categories(&self) -> Result<Vec<String>, StorageError>;
}

/// Per-user cumulative counters and answered-question facts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create the user's stats row with zeroed counters if absent. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn ensure_user(&self, user_id: UserId) -> Result<(), StorageError>;

    /// Record one resolved answer: bump exactly one outcome counter plus the
    /// total, and append the answered-question fact. One atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user row does not exist, or
    /// other storage errors; nothing is persisted on failure.
    async fn record_answer(
        &self,
        user_id: UserId,
        question_id: QuestionId,
        was_correct: bool,
    ) -> Result<(), StorageError>;

    /// Fetch the user's counters, if they have any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn get_user_stats(&self, user_id: UserId) -> Result<Option<UserStats>, StorageError>;

    /// Top users by correct answers, descending; ties broken by ascending
    /// user id so the order is deterministic for a fixed snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn top_users(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError>;
}

#[derive(Default)]
struct InMemoryState {
    questions: Vec<Question>,
    next_question_id: u64,
    users: HashMap<UserId, UserStats>,
    answered: HashSet<(UserId, QuestionId)>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn find_random_unanswered(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> Result<Option<Question>, StorageError> {
        let state = self.guard()?;
        let candidates: Vec<&Question> = state
            .questions
            .iter()
            .filter(|q| !state.answered.contains(&(user_id, q.id())))
            .filter(|q| category.is_none_or(|c| q.category() == c))
            .collect();

        Ok(candidates.choose(&mut rand::rng()).map(|q| (*q).clone()))
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let state = self.guard()?;
        Ok(state.questions.len() as u64)
    }

    async fn import_catalog(&self, seeds: &[QuestionSeed]) -> Result<(), StorageError> {
        let mut state = self.guard()?;
        for seed in seeds {
            state.next_question_id += 1;
            let id = QuestionId::new(state.next_question_id);
            let question = Question::new(
                id,
                seed.text.clone(),
                seed.correct_answer.clone(),
                seed.options.clone(),
                seed.category.clone(),
            )
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
            state.questions.push(question);
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        let state = self.guard()?;
        let mut categories: Vec<String> = state
            .questions
            .iter()
            .map(|q| q.category().to_owned())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn ensure_user(&self, user_id: UserId) -> Result<(), StorageError> {
        let mut state = self.guard()?;
        state
            .users
            .entry(user_id)
            .or_insert_with(|| UserStats::new_empty(user_id));
        Ok(())
    }

    async fn record_answer(
        &self,
        user_id: UserId,
        question_id: QuestionId,
        was_correct: bool,
    ) -> Result<(), StorageError> {
        let mut state = self.guard()?;
        let Some(stats) = state.users.get_mut(&user_id) else {
            return Err(StorageError::NotFound);
        };
        stats.record(was_correct);
        state.answered.insert((user_id, question_id));
        Ok(())
    }

    async fn get_user_stats(&self, user_id: UserId) -> Result<Option<UserStats>, StorageError> {
        let state = self.guard()?;
        Ok(state.users.get(&user_id).copied())
    }

    async fn top_users(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let state = self.guard()?;
        let mut entries: Vec<LeaderboardEntry> = state
            .users
            .values()
            .map(|s| LeaderboardEntry {
                user_id: s.user_id(),
                correct_count: s.correct_count(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.correct_count
                .cmp(&a.correct_count)
                .then(a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

/// Aggregates the two stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { questions, users }
    }
}
