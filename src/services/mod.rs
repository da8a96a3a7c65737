//! Services layer - Business logic
//!
//! Services own validation and business rules and sit between the HTTP
//! handlers and the repositories.

pub mod ai_model;
pub mod analysis;
pub mod password;
pub mod secret;
pub mod story;
pub mod user;

pub use ai_model::{AiModelService, AiModelServiceError};
pub use analysis::{
    Analysis, AnalysisError, AnalysisService, HttpInferenceClient, InferenceClient,
    ProviderResolver,
};
pub use password::{hash_password, verify_password};
pub use secret::{SecretCodec, SecretError};
pub use story::{StoryService, StoryServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
