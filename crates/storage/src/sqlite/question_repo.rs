use trivia_core::model::{Question, QuestionSeed, UserId};

use super::{
    SqliteRepository,
    mapping::{map_question_row, ser, user_id_to_i64},
};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn find_random_unanswered(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> Result<Option<Question>, StorageError> {
        // RANDOM() ordering keeps the pick uniform over the eligible rows.
        let row = if let Some(category) = category {
            sqlx::query(
                r"
                SELECT id, question_text, correct_answer, options_json, category
                FROM questions
                WHERE id NOT IN (
                    SELECT question_id FROM answered_questions WHERE user_id = ?1
                )
                  AND category = ?2
                ORDER BY RANDOM()
                LIMIT 1
                ",
            )
            .bind(user_id_to_i64(user_id)?)
            .bind(category)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query(
                r"
                SELECT id, question_text, correct_answer, options_json, category
                FROM questions
                WHERE id NOT IN (
                    SELECT question_id FROM answered_questions WHERE user_id = ?1
                )
                ORDER BY RANDOM()
                LIMIT 1
                ",
            )
            .bind(user_id_to_i64(user_id)?)
            .fetch_optional(&self.pool)
            .await
        }
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        u64::try_from(count).map_err(ser)
    }

    async fn import_catalog(&self, seeds: &[QuestionSeed]) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for seed in seeds {
            let options_json = serde_json::to_string(&seed.options).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO questions (question_text, correct_answer, options_json, category)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(&seed.text)
            .bind(&seed.correct_answer)
            .bind(options_json)
            .bind(&seed.category)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn list_categories(&self) -> Result<Vec<String>, StorageError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM questions ORDER BY category")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(rows)
    }
}
