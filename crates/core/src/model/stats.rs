use thiserror::Error;

use crate::model::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatsError {
    #[error("quizzes_taken ({taken}) does not match correct + incorrect ({sum})")]
    CountMismatch { taken: u32, sum: u32 },
}

/// Cumulative per-user counters.
///
/// Invariant: `quizzes_taken == correct_count + incorrect_count` after every
/// completed answer resolution. Skips and timeouts do not touch these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    user_id: UserId,
    correct_count: u32,
    incorrect_count: u32,
    quizzes_taken: u32,
}

impl UserStats {
    /// Zeroed counters for a user seen for the first time.
    #[must_use]
    pub fn new_empty(user_id: UserId) -> Self {
        Self {
            user_id,
            correct_count: 0,
            incorrect_count: 0,
            quizzes_taken: 0,
        }
    }

    /// Rehydrate stats from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::CountMismatch` if the counters do not align.
    pub fn from_persisted(
        user_id: UserId,
        correct_count: u32,
        incorrect_count: u32,
        quizzes_taken: u32,
    ) -> Result<Self, StatsError> {
        let sum = correct_count + incorrect_count;
        if sum != quizzes_taken {
            return Err(StatsError::CountMismatch {
                taken: quizzes_taken,
                sum,
            });
        }

        Ok(Self {
            user_id,
            correct_count,
            incorrect_count,
            quizzes_taken,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn quizzes_taken(&self) -> u32 {
        self.quizzes_taken
    }

    /// Apply one resolved answer, bumping exactly one outcome counter and
    /// the total.
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.correct_count = self.correct_count.saturating_add(1);
        } else {
            self.incorrect_count = self.incorrect_count.saturating_add(1);
        }
        self.quizzes_taken = self.quizzes_taken.saturating_add(1);
    }

    /// Fraction of correct answers in percent; 0.0 before any quiz.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.quizzes_taken == 0 {
            return 0.0;
        }
        f64::from(self.correct_count) / f64::from(self.quizzes_taken) * 100.0
    }
}

/// One leaderboard row: user plus their correct-answer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub correct_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_counters_aligned() {
        let mut stats = UserStats::new_empty(UserId::new(1));
        stats.record(true);
        stats.record(false);
        stats.record(true);

        assert_eq!(stats.correct_count(), 2);
        assert_eq!(stats.incorrect_count(), 1);
        assert_eq!(stats.quizzes_taken(), 3);
    }

    #[test]
    fn from_persisted_rejects_mismatch() {
        let err = UserStats::from_persisted(UserId::new(1), 2, 1, 5).unwrap_err();
        assert_eq!(err, StatsError::CountMismatch { taken: 5, sum: 3 });
    }

    #[test]
    fn win_rate_handles_zero_quizzes() {
        let stats = UserStats::new_empty(UserId::new(1));
        assert!((stats.win_rate() - 0.0).abs() < f64::EPSILON);

        let stats = UserStats::from_persisted(UserId::new(1), 1, 1, 2).unwrap();
        assert!((stats.win_rate() - 50.0).abs() < f64::EPSILON);
    }
}
