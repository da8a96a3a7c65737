//! Data models
//!
//! Database entities and the input types services accept.

mod ai_model;
mod session;
mod story;
mod user;

pub use ai_model::{AiModelConfig, AiProvider, ApiKeyChange, AvailableModel, UpsertAiModelInput};
pub use session::Session;
pub use story::{CreateStoryInput, ListParams, Story, UpdateStoryInput, DEFAULT_EMOTIONAL_IMPACT};
pub use user::{CreateUserInput, Theme, UpdateUserInput, User};
