//! AI model configuration service
//!
//! Reads and writes a user's provider/model choice. API keys are encrypted
//! before they reach the repository and are never handed back in plaintext.

use crate::db::repositories::AiModelRepository;
use crate::models::{AiModelConfig, ApiKeyChange, UpsertAiModelInput};
use crate::services::secret::{SecretCodec, SecretError};
use anyhow::Context;
use std::sync::Arc;

pub const MAX_MODEL_NAME_LENGTH: usize = 100;

/// Error types for AI model configuration operations
#[derive(Debug, thiserror::Error)]
pub enum AiModelServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Failed to encrypt API key: {0}")]
    Secret(#[from] SecretError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// AI model configuration service
pub struct AiModelService {
    repo: Arc<dyn AiModelRepository>,
    codec: SecretCodec,
}

impl AiModelService {
    pub fn new(repo: Arc<dyn AiModelRepository>, codec: SecretCodec) -> Self {
        Self { repo, codec }
    }

    /// The user's stored configuration, if any
    pub async fn get(&self, user_id: i64) -> Result<Option<AiModelConfig>, AiModelServiceError> {
        let config = self
            .repo
            .get_by_user(user_id)
            .await
            .context("Failed to get AI model configuration")?;
        Ok(config)
    }

    /// Create or replace the user's configuration
    pub async fn upsert(
        &self,
        user_id: i64,
        input: UpsertAiModelInput,
    ) -> Result<AiModelConfig, AiModelServiceError> {
        let model_name = input.model_name.trim();
        if model_name.is_empty() || model_name.chars().count() > MAX_MODEL_NAME_LENGTH {
            return Err(AiModelServiceError::ValidationError(format!(
                "Model name must be between 1 and {} characters",
                MAX_MODEL_NAME_LENGTH
            )));
        }

        let encrypted = match input.api_key {
            ApiKeyChange::Keep => self
                .get(user_id)
                .await?
                .and_then(|existing| existing.api_key),
            ApiKeyChange::Clear => None,
            ApiKeyChange::Set(key) => Some(self.codec.encrypt(&key)?),
        };

        let provider = input.provider.to_string();
        let saved = self
            .repo
            .upsert(user_id, &provider, model_name, encrypted.as_deref())
            .await
            .context("Failed to save AI model configuration")?;

        tracing::info!(
            user_id,
            provider = %saved.provider,
            model = %saved.model_name,
            has_api_key = saved.has_api_key(),
            "AI model configuration saved"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAiModelRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{AiProvider, User};

    const SECRET: &str = "unit-test-secret-that-is-long-enough";

    async fn setup_test_service() -> (AiModelService, SqlxAiModelRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("cfg@example.com".to_string(), "h".to_string(), None))
            .await
            .unwrap();

        let service = AiModelService::new(
            SqlxAiModelRepository::boxed(pool.clone()),
            SecretCodec::new(SECRET).unwrap(),
        );
        (service, SqlxAiModelRepository::new(pool), user.id)
    }

    fn input(provider: AiProvider, model: &str, api_key: ApiKeyChange) -> UpsertAiModelInput {
        UpsertAiModelInput {
            provider,
            model_name: model.to_string(),
            api_key,
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (service, _, user_id) = setup_test_service().await;
        assert!(service.get(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_key_stored_encrypted() {
        let (service, repo, user_id) = setup_test_service().await;
        service
            .upsert(
                user_id,
                input(AiProvider::External, "gpt-4o-mini", ApiKeyChange::Set("sk-abc".to_string())),
            )
            .await
            .unwrap();

        let stored = repo.get_by_user(user_id).await.unwrap().unwrap();
        let ciphertext = stored.api_key.unwrap();
        assert_ne!(ciphertext, "sk-abc");
        assert_eq!(SecretCodec::new(SECRET).unwrap().decrypt(&ciphertext).unwrap(), "sk-abc");
    }

    #[tokio::test]
    async fn test_keep_and_clear_api_key() {
        let (service, _, user_id) = setup_test_service().await;
        service
            .upsert(
                user_id,
                input(AiProvider::External, "gpt-4o-mini", ApiKeyChange::Set("sk-abc".to_string())),
            )
            .await
            .unwrap();

        let kept = service
            .upsert(user_id, input(AiProvider::External, "gpt-4o", ApiKeyChange::Keep))
            .await
            .unwrap();
        assert_eq!(kept.model_name, "gpt-4o");
        assert!(kept.has_api_key());

        let cleared = service
            .upsert(user_id, input(AiProvider::Ollama, "llama3", ApiKeyChange::Clear))
            .await
            .unwrap();
        assert_eq!(cleared.provider, "ollama");
        assert!(!cleared.has_api_key());
    }

    #[tokio::test]
    async fn test_model_name_required() {
        let (service, _, user_id) = setup_test_service().await;
        let result = service
            .upsert(user_id, input(AiProvider::Ollama, "   ", ApiKeyChange::Keep))
            .await;
        assert!(matches!(result, Err(AiModelServiceError::ValidationError(_))));
    }
}
