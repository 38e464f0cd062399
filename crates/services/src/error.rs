//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by the quiz lifecycle controller.
///
/// Expected control outcomes (no active session, already active, catalog
/// exhausted) are not errors; they are variants on the operation results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    /// A session insert hit an existing one. Unreachable while callers hold
    /// the per-user lock across the operation.
    #[error("user already has an active session")]
    SessionConflict,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
