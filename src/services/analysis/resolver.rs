//! Provider resolution
//!
//! Decides which provider, model, and credential an analysis runs with: the
//! user's stored configuration when present, the server defaults otherwise.

use super::AnalysisError;
use crate::config::AiConfig;
use crate::db::repositories::AiModelRepository;
use crate::services::secret::SecretCodec;
use anyhow::Context;
use std::fmt;
use std::sync::Arc;

/// Where a resolved provider came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    UserConfig,
    Defaults,
}

/// Provider, model, and plaintext key for one analysis.
///
/// `provider` is unparsed; an unknown value is rejected by the orchestrator.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub source: ProviderSource,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

pub struct ProviderResolver {
    repo: Arc<dyn AiModelRepository>,
    codec: SecretCodec,
    default_provider: String,
    default_model: String,
}

impl ProviderResolver {
    pub fn new(repo: Arc<dyn AiModelRepository>, codec: SecretCodec, config: &AiConfig) -> Self {
        Self {
            repo,
            codec,
            default_provider: config.default_provider.clone(),
            default_model: config.default_model.clone(),
        }
    }

    pub async fn resolve(&self, user_id: i64) -> Result<ResolvedProvider, AnalysisError> {
        let stored = self
            .repo
            .get_by_user(user_id)
            .await
            .context("Failed to load AI model configuration")?;

        let Some(config) = stored else {
            return Ok(ResolvedProvider {
                provider: self.default_provider.clone(),
                model: self.default_model.clone(),
                api_key: None,
                source: ProviderSource::Defaults,
            });
        };

        // An undecryptable key counts as missing; the credential check reports it.
        let api_key = match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(sealed) => match self.codec.decrypt(sealed) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(user_id, "Stored API key could not be decrypted: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(ResolvedProvider {
            provider: config.provider,
            model: config.model_name,
            api_key,
            source: ProviderSource::UserConfig,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAiModelRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    const SECRET: &str = "resolver-test-secret-of-enough-length";

    async fn setup() -> (ProviderResolver, SqlxAiModelRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("r@example.com".to_string(), "h".to_string(), None))
            .await
            .unwrap();

        let resolver = ProviderResolver::new(
            SqlxAiModelRepository::boxed(pool.clone()),
            SecretCodec::new(SECRET).unwrap(),
            &AiConfig::default(),
        );
        (resolver, SqlxAiModelRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_defaults_without_config() {
        let (resolver, _, user_id) = setup().await;
        let resolved = resolver.resolve(user_id).await.unwrap();

        assert_eq!(resolved.provider, "ollama");
        assert_eq!(resolved.model, "llama3");
        assert!(resolved.api_key.is_none());
        assert_eq!(resolved.source, ProviderSource::Defaults);
    }

    #[tokio::test]
    async fn test_user_config_with_decrypted_key() {
        let (resolver, repo, user_id) = setup().await;
        let sealed = SecretCodec::new(SECRET).unwrap().encrypt("sk-user").unwrap();
        repo.upsert(user_id, "external", "gpt-4o-mini", Some(&sealed)).await.unwrap();

        let resolved = resolver.resolve(user_id).await.unwrap();
        assert_eq!(resolved.provider, "external");
        assert_eq!(resolved.model, "gpt-4o-mini");
        assert_eq!(resolved.api_key.as_deref(), Some("sk-user"));
        assert_eq!(resolved.source, ProviderSource::UserConfig);
    }

    #[tokio::test]
    async fn test_key_sealed_under_other_secret_is_dropped() {
        let (resolver, repo, user_id) = setup().await;
        let sealed = SecretCodec::new("some-previous-server-secret-value!!")
            .unwrap()
            .encrypt("sk-old")
            .unwrap();
        repo.upsert(user_id, "external", "gpt-4o", Some(&sealed)).await.unwrap();

        let resolved = resolver.resolve(user_id).await.unwrap();
        assert!(resolved.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let resolved = ResolvedProvider {
            provider: "external".to_string(),
            model: "m".to_string(),
            api_key: Some("sk-secret".to_string()),
            source: ProviderSource::UserConfig,
        };
        let printed = format!("{:?}", resolved);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
