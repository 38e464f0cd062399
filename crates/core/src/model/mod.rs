mod ids;
mod question;
mod session;
mod stats;

pub use ids::{ParseIdError, QuestionId, UserId};
pub use question::{Question, QuestionError, QuestionSeed};
pub use session::ActiveSession;
pub use stats::{LeaderboardEntry, StatsError, UserStats};
