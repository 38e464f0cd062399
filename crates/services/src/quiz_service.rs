use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use storage::repository::{QuestionRepository, UserRepository};
use trivia_core::Clock;
use trivia_core::model::{ActiveSession, LeaderboardEntry, Question, UserId, UserStats};

use crate::error::QuizError;
use crate::session_table::SessionTable;
use crate::user_locks::UserLocks;

/// Default number of rows returned by `leaderboard`.
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

/// Tunables for the session lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct QuizConfig {
    /// Idle time after which the sweeper abandons a session.
    pub session_timeout: Duration,
    /// Pause between sweeper passes.
    pub sweep_interval: std::time::Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::seconds(180),
            sweep_interval: std::time::Duration::from_secs(10),
        }
    }
}

/// Result of `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh question was installed as the user's active session.
    Started(Question),
    /// The user already has an in-flight question; nothing changed.
    AlreadyActive { question_text: String },
    /// Every eligible question has been answered; the user stays session-less.
    Exhausted,
}

/// Result of `submit_answer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect { correct_answer: String },
    NoActiveSession,
}

/// Result of `skip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The old question was dropped and the next one installed.
    Next(Question),
    /// The old question was dropped and nothing is left to serve.
    Exhausted,
    NoActiveSession,
}

/// Session lifecycle controller.
///
/// Tracks one in-flight question per user, resolves answers against the
/// stores, and scores each question exactly once. Every operation serializes
/// per user by holding that user's lock for its full duration; skipped and
/// timed-out questions are free and stay eligible for future selection.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    sessions: Arc<SessionTable>,
    locks: Arc<UserLocks>,
    questions: Arc<dyn QuestionRepository>,
    users: Arc<dyn UserRepository>,
    config: QuizConfig,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<SessionTable>,
        locks: Arc<UserLocks>,
        questions: Arc<dyn QuestionRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            clock,
            sessions,
            locks,
            questions,
            users,
            config: QuizConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: QuizConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> QuizConfig {
        self.config
    }

    /// Start a quiz for the user, optionally restricted to a category.
    ///
    /// Idempotent while a session is active: returns `AlreadyActive` with the
    /// pending question text and mutates nothing, not even the activity
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if a store call fails; the session table
    /// is left exactly as it was before the call.
    pub async fn start(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> Result<StartOutcome, QuizError> {
        let _guard = self.locks.lock(user_id).await;

        if let Some(session) = self.sessions.get(user_id) {
            return Ok(StartOutcome::AlreadyActive {
                question_text: session.question_text().to_owned(),
            });
        }

        self.users.ensure_user(user_id).await?;

        let category = category.map(normalize_category);
        let Some(question) = self
            .questions
            .find_random_unanswered(user_id, category.as_deref())
            .await?
        else {
            return Ok(StartOutcome::Exhausted);
        };

        self.install(user_id, &question)?;
        info!(
            user = user_id.value(),
            question = question.id().value(),
            category = question.category(),
            "session started"
        );
        Ok(StartOutcome::Started(question))
    }

    /// Resolve the user's pending question against `raw_answer`.
    ///
    /// Comparison is exact after trim and case-fold. The stats update and the
    /// answered-question fact are one persistent unit; the session is removed
    /// only after that unit commits, so a store failure leaves the question
    /// pending and unscored. The activity refresh from the attempt is kept in
    /// that case, holding the sweep window open for a retry.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the persistent write fails.
    pub async fn submit_answer(
        &self,
        user_id: UserId,
        raw_answer: &str,
    ) -> Result<AnswerOutcome, QuizError> {
        let _guard = self.locks.lock(user_id).await;

        let Some(session) = self.sessions.get(user_id) else {
            return Ok(AnswerOutcome::NoActiveSession);
        };

        self.sessions.touch(user_id, self.clock.now());

        let was_correct = session.answer_matches(raw_answer);
        self.users
            .record_answer(user_id, session.question_id(), was_correct)
            .await?;
        self.sessions.remove(user_id);

        info!(
            user = user_id.value(),
            question = session.question_id().value(),
            was_correct,
            "answer recorded, session closed"
        );

        Ok(if was_correct {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Incorrect {
                correct_answer: session.correct_answer().to_owned(),
            }
        })
    }

    /// Drop the pending question without scoring it and serve the next one.
    ///
    /// The skipped question is not recorded as answered and remains eligible
    /// for future selection.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if a store call fails; the old session
    /// stays in place in that case.
    pub async fn skip(&self, user_id: UserId) -> Result<SkipOutcome, QuizError> {
        let _guard = self.locks.lock(user_id).await;

        let Some(old) = self.sessions.get(user_id) else {
            return Ok(SkipOutcome::NoActiveSession);
        };

        self.users.ensure_user(user_id).await?;
        let next = self.questions.find_random_unanswered(user_id, None).await?;

        // Store reads are done; only now is the old session dropped.
        self.sessions.remove(user_id);
        info!(
            user = user_id.value(),
            question = old.question_id().value(),
            "session skipped"
        );

        match next {
            None => Ok(SkipOutcome::Exhausted),
            Some(question) => {
                self.install(user_id, &question)?;
                info!(
                    user = user_id.value(),
                    question = question.id().value(),
                    "session started after skip"
                );
                Ok(SkipOutcome::Next(question))
            }
        }
    }

    /// The user's cumulative counters, if they have played before.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the store cannot be queried.
    pub async fn stats(&self, user_id: UserId) -> Result<Option<UserStats>, QuizError> {
        Ok(self.users.get_user_stats(user_id).await?)
    }

    /// Top users by correct answers; deterministic order for a fixed
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the store cannot be queried.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, QuizError> {
        Ok(self.users.top_users(limit).await?)
    }

    /// Distinct question categories, for display.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the store cannot be queried.
    pub async fn categories(&self) -> Result<Vec<String>, QuizError> {
        Ok(self.questions.list_categories().await?)
    }

    fn install(&self, user_id: UserId, question: &Question) -> Result<(), QuizError> {
        self.sessions
            .put(user_id, ActiveSession::new(question, self.clock.now()))
            .map_err(|_| QuizError::SessionConflict)
    }
}

/// Capitalized-first-letter normalization, matching user input like `lore`
/// against the stored `Lore`.
#[must_use]
pub fn normalize_category(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use storage::catalog::default_catalog;
    use storage::repository::{InMemoryRepository, StorageError};
    use trivia_core::model::{QuestionId, QuestionSeed};
    use trivia_core::time::{fixed_clock, fixed_now};

    /// Delegating user store that can be flipped into a failure mode.
    struct FlakyUsers {
        inner: InMemoryRepository,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl UserRepository for FlakyUsers {
        async fn ensure_user(&self, user_id: UserId) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("store down".into()));
            }
            self.inner.ensure_user(user_id).await
        }

        async fn record_answer(
            &self,
            user_id: UserId,
            question_id: QuestionId,
            was_correct: bool,
        ) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("store down".into()));
            }
            self.inner.record_answer(user_id, question_id, was_correct).await
        }

        async fn get_user_stats(
            &self,
            user_id: UserId,
        ) -> Result<Option<UserStats>, StorageError> {
            self.inner.get_user_stats(user_id).await
        }

        async fn top_users(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
            self.inner.top_users(limit).await
        }
    }

    fn seed(text: &str, answer: &str, category: &str) -> QuestionSeed {
        QuestionSeed {
            text: text.to_owned(),
            correct_answer: answer.to_owned(),
            options: vec![answer.to_owned(), "other".to_owned()],
            category: category.to_owned(),
        }
    }

    async fn service_with(seeds: &[QuestionSeed]) -> (QuizService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        repo.import_catalog(seeds).await.unwrap();
        let service = QuizService::new(
            fixed_clock(),
            Arc::new(SessionTable::new()),
            Arc::new(UserLocks::new()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (service, repo)
    }

    async fn full_service() -> (QuizService, InMemoryRepository) {
        service_with(&default_catalog()).await
    }

    #[tokio::test]
    async fn start_is_idempotent_while_active() {
        let (service, _repo) = full_service().await;
        let user = UserId::new(1);

        let StartOutcome::Started(question) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        for _ in 0..3 {
            let outcome = service.start(user, None).await.unwrap();
            assert_eq!(
                outcome,
                StartOutcome::AlreadyActive {
                    question_text: question.text().to_owned()
                }
            );
        }

        // Still exactly one session, stats untouched.
        let stats = service.stats(user).await.unwrap().unwrap();
        assert_eq!(stats.quizzes_taken(), 0);
    }

    #[tokio::test]
    async fn correct_answer_scores_exactly_once() {
        let (service, _repo) = full_service().await;
        let user = UserId::new(1);

        let StartOutcome::Started(question) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        let sloppy = format!("  {}  ", question.correct_answer().to_uppercase());
        let outcome = service.submit_answer(user, &sloppy).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Correct);

        let stats = service.stats(user).await.unwrap().unwrap();
        assert_eq!(stats.correct_count(), 1);
        assert_eq!(stats.incorrect_count(), 0);
        assert_eq!(stats.quizzes_taken(), 1);

        // Session is gone; a second submit has nothing to resolve.
        let outcome = service.submit_answer(user, "again").await.unwrap();
        assert_eq!(outcome, AnswerOutcome::NoActiveSession);
    }

    #[tokio::test]
    async fn incorrect_answer_reveals_the_right_one() {
        let (service, _repo) = full_service().await;
        let user = UserId::new(1);

        let StartOutcome::Started(question) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        let outcome = service
            .submit_answer(user, "definitely wrong")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Incorrect {
                correct_answer: question.correct_answer().to_owned()
            }
        );

        let stats = service.stats(user).await.unwrap().unwrap();
        assert_eq!(stats.correct_count(), 0);
        assert_eq!(stats.incorrect_count(), 1);
        assert_eq!(stats.quizzes_taken(), 1);
    }

    #[tokio::test]
    async fn empty_answer_is_a_plain_miss() {
        let (service, _repo) = full_service().await;
        let user = UserId::new(1);

        service.start(user, None).await.unwrap();
        let outcome = service.submit_answer(user, "   ").await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Incorrect { .. }));
    }

    #[tokio::test]
    async fn skip_is_free_and_keeps_the_question_eligible() {
        let (service, _repo) =
            service_with(&[seed("Only question", "Answer", "Lore")]).await;
        let user = UserId::new(1);

        let StartOutcome::Started(first) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        // One question in the catalog: a free skip must serve it again.
        let SkipOutcome::Next(next) = service.skip(user).await.unwrap() else {
            panic!("expected the next question");
        };
        assert_eq!(next.id(), first.id());

        let stats = service.stats(user).await.unwrap().unwrap();
        assert_eq!(stats.quizzes_taken(), 0);
    }

    #[tokio::test]
    async fn skip_without_session_is_a_no_op() {
        let (service, _repo) = full_service().await;
        let outcome = service.skip(UserId::new(1)).await.unwrap();
        assert_eq!(outcome, SkipOutcome::NoActiveSession);
    }

    #[tokio::test]
    async fn catalog_exhaustion_ends_without_a_session() {
        let (service, _repo) = service_with(&[seed("Q", "A", "Lore")]).await;
        let user = UserId::new(1);

        service.start(user, None).await.unwrap();
        service.submit_answer(user, "A").await.unwrap();

        assert_eq!(service.start(user, None).await.unwrap(), StartOutcome::Exhausted);

        // An incorrect answer also consumes the question.
        let user2 = UserId::new(2);
        service.start(user2, None).await.unwrap();
        service.submit_answer(user2, "wrong").await.unwrap();
        assert_eq!(service.start(user2, None).await.unwrap(), StartOutcome::Exhausted);
    }

    #[tokio::test]
    async fn category_filter_normalizes_and_exhausts_per_category() {
        let (service, _repo) = service_with(&[
            seed("L1", "A1", "Lore"),
            seed("L2", "A2", "Lore"),
            seed("B1", "A3", "Band"),
        ])
        .await;
        let user = UserId::new(1);

        for _ in 0..2 {
            let StartOutcome::Started(question) =
                service.start(user, Some("lOrE")).await.unwrap()
            else {
                panic!("expected a lore question");
            };
            assert_eq!(question.category(), "Lore");
            service
                .submit_answer(user, question.correct_answer())
                .await
                .unwrap();
        }

        assert_eq!(
            service.start(user, Some("lore")).await.unwrap(),
            StartOutcome::Exhausted
        );
        assert!(matches!(
            service.start(user, None).await.unwrap(),
            StartOutcome::Started(_)
        ));
    }

    #[tokio::test]
    async fn store_failure_leaves_the_session_pending() {
        let repo = InMemoryRepository::new();
        repo.import_catalog(&default_catalog()).await.unwrap();
        let users = Arc::new(FlakyUsers {
            inner: repo.clone(),
            fail: AtomicBool::new(false),
        });
        let sessions = Arc::new(SessionTable::new());
        let service = QuizService::new(
            fixed_clock(),
            Arc::clone(&sessions),
            Arc::new(UserLocks::new()),
            Arc::new(repo.clone()),
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );
        let user = UserId::new(1);

        let StartOutcome::Started(question) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        users.fail.store(true, Ordering::SeqCst);
        let err = service
            .submit_answer(user, question.correct_answer())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Storage(_)));

        // Nothing was scored and the question is still pending.
        assert!(sessions.get(user).is_some());
        let stats = repo.get_user_stats(user).await.unwrap().unwrap();
        assert_eq!(stats.quizzes_taken(), 0);

        // A fresh user command is the retry mechanism.
        users.fail.store(false, Ordering::SeqCst);
        let outcome = service
            .submit_answer(user, question.correct_answer())
            .await
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::Correct);
        let stats = repo.get_user_stats(user).await.unwrap().unwrap();
        assert_eq!(stats.quizzes_taken(), 1);
        assert!(sessions.get(user).is_none());
    }

    #[tokio::test]
    async fn failed_submit_still_refreshes_activity() {
        let repo = InMemoryRepository::new();
        repo.import_catalog(&default_catalog()).await.unwrap();
        let users = Arc::new(FlakyUsers {
            inner: repo.clone(),
            fail: AtomicBool::new(false),
        });
        let sessions = Arc::new(SessionTable::new());
        let locks = Arc::new(UserLocks::new());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());

        // Two controllers over the same state, a minute apart.
        let start_service = QuizService::new(
            fixed_clock(),
            Arc::clone(&sessions),
            Arc::clone(&locks),
            Arc::clone(&questions),
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );
        let later = fixed_now() + Duration::seconds(60);
        let submit_service = QuizService::new(
            Clock::fixed(later),
            Arc::clone(&sessions),
            Arc::clone(&locks),
            questions,
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );
        let user = UserId::new(1);

        start_service.start(user, None).await.unwrap();
        assert_eq!(sessions.get(user).unwrap().last_activity(), fixed_now());

        users.fail.store(true, Ordering::SeqCst);
        assert!(submit_service.submit_answer(user, "anything").await.is_err());

        // The question is still pending and the attempt kept the sweep
        // window open.
        let session = sessions.get(user).unwrap();
        assert_eq!(session.last_activity(), later);
    }

    #[tokio::test]
    async fn store_failure_during_skip_keeps_the_old_session() {
        let repo = InMemoryRepository::new();
        repo.import_catalog(&default_catalog()).await.unwrap();
        let users = Arc::new(FlakyUsers {
            inner: repo.clone(),
            fail: AtomicBool::new(false),
        });
        let sessions = Arc::new(SessionTable::new());
        let service = QuizService::new(
            fixed_clock(),
            Arc::clone(&sessions),
            Arc::new(UserLocks::new()),
            Arc::new(repo.clone()),
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );
        let user = UserId::new(1);

        let StartOutcome::Started(question) = service.start(user, None).await.unwrap() else {
            panic!("expected a question");
        };

        users.fail.store(true, Ordering::SeqCst);
        assert!(service.skip(user).await.is_err());
        assert_eq!(
            sessions.get(user).unwrap().question_id(),
            question.id()
        );
    }

    #[tokio::test]
    async fn leaderboard_is_deterministic() {
        let (service, repo) = full_service().await;

        for (id, correct) in [(5_u64, 1_u32), (3, 2), (4, 2)] {
            let user = UserId::new(id);
            repo.ensure_user(user).await.unwrap();
            for q in 0..correct {
                repo.record_answer(user, QuestionId::new(u64::from(q) + 1), true)
                    .await
                    .unwrap();
            }
        }

        let board = service.leaderboard(DEFAULT_LEADERBOARD_LIMIT).await.unwrap();
        let ids: Vec<u64> = board.iter().map(|e| e.user_id.value()).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn stats_absent_until_first_start() {
        let (service, _repo) = full_service().await;
        let user = UserId::new(1);

        assert!(service.stats(user).await.unwrap().is_none());
        service.start(user, None).await.unwrap();
        let stats = service.stats(user).await.unwrap().unwrap();
        assert_eq!(stats.quizzes_taken(), 0);
    }

    #[test]
    fn category_normalization_is_single_capitalize() {
        assert_eq!(normalize_category("lore"), "Lore");
        assert_eq!(normalize_category("LORE"), "Lore");
        assert_eq!(normalize_category("  band "), "Band");
        assert_eq!(normalize_category(""), "");
        // Multi-word names get the same single rule, nothing smarter.
        assert_eq!(normalize_category("trench era"), "Trench era");
    }

    #[tokio::test]
    async fn start_in_missing_category_is_exhausted() {
        let (service, _repo) = service_with(&[seed("Q", "A", "Lore")]).await;
        let outcome = service.start(UserId::new(1), Some("history")).await.unwrap();
        assert_eq!(outcome, StartOutcome::Exhausted);
    }
}
