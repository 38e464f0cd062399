#![forbid(unsafe_code)]

pub mod error;
pub mod quiz_service;
pub mod session_table;
pub mod sweeper;
pub mod user_locks;

pub use trivia_core::Clock;

pub use error::QuizError;
pub use quiz_service::{
    AnswerOutcome, QuizConfig, QuizService, SkipOutcome, StartOutcome, normalize_category,
};
pub use session_table::{SessionConflict, SessionTable};
pub use sweeper::{Sweeper, SweeperHandle};
pub use user_locks::UserLocks;
