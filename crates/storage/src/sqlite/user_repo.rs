use trivia_core::model::{LeaderboardEntry, QuestionId, UserId, UserStats};

use super::{
    SqliteRepository,
    mapping::{map_leaderboard_row, map_stats_row, question_id_to_i64, user_id_to_i64},
};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn ensure_user(&self, user_id: UserId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (user_id)
            VALUES (?1)
            ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn record_answer(
        &self,
        user_id: UserId,
        question_id: QuestionId,
        was_correct: bool,
    ) -> Result<(), StorageError> {
        let uid = user_id_to_i64(user_id)?;
        let qid = question_id_to_i64(question_id)?;

        // Counter bump and answered fact commit together or not at all.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let update = if was_correct {
            r"
            UPDATE users
            SET correct_count = correct_count + 1, quizzes_taken = quizzes_taken + 1
            WHERE user_id = ?1
            "
        } else {
            r"
            UPDATE users
            SET incorrect_count = incorrect_count + 1, quizzes_taken = quizzes_taken + 1
            WHERE user_id = ?1
            "
        };

        let result = sqlx::query(update)
            .bind(uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back.
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            INSERT INTO answered_questions (user_id, question_id)
            VALUES (?1, ?2)
            ",
        )
        .bind(uid)
        .bind(qid)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn get_user_stats(&self, user_id: UserId) -> Result<Option<UserStats>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, correct_count, incorrect_count, quizzes_taken
            FROM users
            WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_stats_row).transpose()
    }

    async fn top_users(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, correct_count
            FROM users
            ORDER BY correct_count DESC, user_id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_leaderboard_row).collect()
    }
}
