use sqlx::Row;
use trivia_core::model::{LeaderboardEntry, Question, QuestionId, UserId, UserStats};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let options_json: String = row.try_get("options_json").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;

    Question::new(
        id,
        row.try_get::<String, _>("question_text").map_err(ser)?,
        row.try_get::<String, _>("correct_answer").map_err(ser)?,
        options,
        row.try_get::<String, _>("category").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_stats_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserStats, StorageError> {
    let user_id = user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;
    let correct = i64_to_u32("correct_count", row.try_get("correct_count").map_err(ser)?)?;
    let incorrect = i64_to_u32(
        "incorrect_count",
        row.try_get("incorrect_count").map_err(ser)?,
    )?;
    let taken = i64_to_u32("quizzes_taken", row.try_get("quizzes_taken").map_err(ser)?)?;

    UserStats::from_persisted(user_id, correct, incorrect, taken).map_err(ser)
}

pub(crate) fn map_leaderboard_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LeaderboardEntry, StorageError> {
    Ok(LeaderboardEntry {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        correct_count: i64_to_u32("correct_count", row.try_get("correct_count").map_err(ser)?)?,
    })
}
