//! Database repositories
//!
//! One repository per table, each a trait plus an sqlx implementation that
//! dispatches on the configured driver.

pub mod ai_model;
pub mod session;
pub mod story;
pub mod user;

pub use ai_model::{AiModelRepository, SqlxAiModelRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use story::{SqlxStoryRepository, StoryRepository};
pub use user::{SqlxUserRepository, UserRepository};
