//! Story analysis pipeline
//!
//! One linear pass per request:
//!
//! ```text
//! resolver -> credential check -> prompt -> inference client -> normalizer
//! ```
//!
//! [`AnalysisService::analyze`] returns the first error encountered or the
//! final [`Analysis`]; persisting it on the story is the caller's job. Nothing
//! is retried or cached, and no state is shared between in-flight analyses
//! apart from the HTTP connection pool inside the client.

pub mod client;
pub mod normalize;
pub mod prompt;
pub mod resolver;

pub use client::{HttpInferenceClient, InferenceClient, InferenceRequest};
pub use resolver::{ProviderResolver, ProviderSource, ResolvedProvider};

use crate::config::{AiConfig, ResponseFormat};
use crate::models::{AiProvider, AvailableModel};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything that can go wrong while analyzing a story
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The provider needs an API key and none is stored
    #[error("An API key is required for the {0} provider")]
    CredentialRequired(AiProvider),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("The AI service did not respond within {0} seconds")]
    Timeout(u64),

    #[error("Failed to connect to the AI service: {0}")]
    Transport(String),

    #[error("The AI service returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Failed to parse the AI service's response: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result of a successful analysis
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// Cleaned prose
    Text(String),
    /// JSON object emitted by the model in structured mode
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl Analysis {
    /// Form stored in the story's `analysis` column
    pub fn to_stored(&self) -> String {
        match self {
            Analysis::Text(text) => text.clone(),
            Analysis::Structured(map) => serde_json::Value::Object(map.clone()).to_string(),
        }
    }
}

/// Story analysis orchestrator
pub struct AnalysisService {
    resolver: ProviderResolver,
    client: Arc<dyn InferenceClient>,
    format: ResponseFormat,
}

impl AnalysisService {
    pub fn new(
        resolver: ProviderResolver,
        client: Arc<dyn InferenceClient>,
        config: &AiConfig,
    ) -> Self {
        Self {
            resolver,
            client,
            format: config.response_format,
        }
    }

    /// Analyze `story_text` with the provider configured for `user_id`
    pub async fn analyze(&self, user_id: i64, story_text: &str) -> Result<Analysis, AnalysisError> {
        let resolved = self.resolver.resolve(user_id).await?;

        let provider: AiProvider = resolved.provider.parse().map_err(|_| {
            tracing::warn!(user_id, provider = %resolved.provider, "Unsupported provider configured");
            AnalysisError::UnsupportedProvider(resolved.provider.clone())
        })?;

        if provider.requires_api_key() && resolved.api_key.is_none() {
            tracing::warn!(user_id, %provider, "Analysis refused: no API key stored");
            return Err(AnalysisError::CredentialRequired(provider));
        }

        let prompt = prompt::build_prompt(story_text, self.format);
        let request = InferenceRequest {
            provider,
            model: &resolved.model,
            prompt: &prompt,
            api_key: resolved.api_key.as_deref(),
            format: self.format,
        };

        let started = Instant::now();
        let result = self
            .client
            .generate(&request)
            .await
            .and_then(|raw| normalize::normalize(provider, &raw, self.format));
        let elapsed_ms = elapsed_millis(started.elapsed());

        match &result {
            Ok(_) => tracing::info!(
                user_id,
                %provider,
                model = %resolved.model,
                source = ?resolved.source,
                elapsed_ms,
                "Story analysis completed"
            ),
            Err(e) => tracing::warn!(
                user_id,
                %provider,
                model = %resolved.model,
                elapsed_ms,
                "Story analysis failed: {}",
                e
            ),
        }

        result
    }

    /// Models installed on the local model server
    pub async fn available_models(&self) -> Result<Vec<AvailableModel>, AnalysisError> {
        self.client.list_models().await
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`
fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AiModelRepository, SqlxAiModelRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use crate::services::secret::SecretCodec;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SECRET: &str = "analysis-test-secret-long-enough!!";

    /// Records every request and answers with a canned body
    struct RecordingClient {
        calls: AtomicUsize,
        last: Mutex<Option<(AiProvider, String, Option<String>, String)>>,
        reply: Result<String, fn() -> AnalysisError>,
    }

    impl RecordingClient {
        fn replying(body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply: Ok(body.to_string()),
            })
        }

        fn failing(err: fn() -> AnalysisError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply: Err(err),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for RecordingClient {
        async fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((
                request.provider,
                request.model.to_string(),
                request.api_key.map(str::to_string),
                request.prompt.to_string(),
            ));
            match &self.reply {
                Ok(body) => Ok(body.clone()),
                Err(make) => Err(make()),
            }
        }

        async fn list_models(&self) -> Result<Vec<AvailableModel>, AnalysisError> {
            Ok(vec![])
        }
    }

    async fn setup(
        client: Arc<RecordingClient>,
        format: ResponseFormat,
    ) -> (AnalysisService, SqlxAiModelRepository, SecretCodec, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("writer@example.com".to_string(), "h".to_string(), None))
            .await
            .unwrap();

        let codec = SecretCodec::new(SECRET).unwrap();
        let config = AiConfig {
            response_format: format,
            ..AiConfig::default()
        };
        let resolver = ProviderResolver::new(
            SqlxAiModelRepository::boxed(pool.clone()),
            codec.clone(),
            &config,
        );
        let service = AnalysisService::new(resolver, client, &config);

        (service, SqlxAiModelRepository::new(pool), codec, user.id)
    }

    fn ollama_body(response: &str) -> String {
        serde_json::json!({ "model": "llama3", "response": response, "done": true }).to_string()
    }

    #[tokio::test]
    async fn test_defaults_used_without_user_config() {
        let client = RecordingClient::replying(&ollama_body("Calm and reflective."));
        let (service, _, _, user_id) = setup(client.clone(), ResponseFormat::Text).await;

        let analysis = service.analyze(user_id, "I forgot my keys at the office").await.unwrap();
        assert_eq!(analysis, Analysis::Text("Calm and reflective.".to_string()));

        let (provider, model, api_key, prompt) = client.last.lock().unwrap().clone().unwrap();
        assert_eq!(provider, AiProvider::Ollama);
        assert_eq!(model, "llama3");
        assert!(api_key.is_none());
        assert!(prompt.contains("I forgot my keys at the office"));
    }

    #[tokio::test]
    async fn test_external_without_key_never_calls_client() {
        let client = RecordingClient::replying("unused");
        let (service, repo, _, user_id) = setup(client.clone(), ResponseFormat::Text).await;
        repo.upsert(user_id, "external", "gpt-4o-mini", None).await.unwrap();

        let result = service.analyze(user_id, "I forgot my keys at the office").await;

        assert!(matches!(
            result,
            Err(AnalysisError::CredentialRequired(AiProvider::External))
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_external_with_key_passes_decrypted_key() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Wry humour." } }]
        })
        .to_string();
        let client = RecordingClient::replying(&body);
        let (service, repo, codec, user_id) = setup(client.clone(), ResponseFormat::Text).await;
        let sealed = codec.encrypt("sk-test-123").unwrap();
        repo.upsert(user_id, "external", "gpt-4o-mini", Some(&sealed)).await.unwrap();

        let analysis = service.analyze(user_id, "I forgot my keys at the office").await.unwrap();
        assert_eq!(analysis.to_stored(), "Wry humour.");

        let (provider, model, api_key, _) = client.last.lock().unwrap().clone().unwrap();
        assert_eq!(provider, AiProvider::External);
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(api_key.as_deref(), Some("sk-test-123"));
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let client = RecordingClient::replying("unused");
        let (service, repo, _, user_id) = setup(client.clone(), ResponseFormat::Text).await;
        repo.upsert(user_id, "carrier-pigeon", "coo", None).await.unwrap();

        let result = service.analyze(user_id, "I forgot my keys at the office").await;
        assert!(matches!(result, Err(AnalysisError::UnsupportedProvider(p)) if p == "carrier-pigeon"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reasoning_stripped_from_result() {
        let client = RecordingClient::replying(&ollama_body(
            "<think>The user lost keys, so...</think>\n\n  A small, relatable mishap.  ",
        ));
        let (service, _, _, user_id) = setup(client, ResponseFormat::Text).await;

        let analysis = service.analyze(user_id, "I forgot my keys at the office").await.unwrap();
        assert_eq!(analysis.to_stored(), "A small, relatable mishap.");
    }

    #[tokio::test]
    async fn test_non_json_in_structured_mode_is_parse_error() {
        let client = RecordingClient::replying(&ollama_body("Sorry, I can only answer in prose."));
        let (service, _, _, user_id) = setup(client, ResponseFormat::Json).await;

        let result = service.analyze(user_id, "I forgot my keys at the office").await;
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[tokio::test]
    async fn test_structured_mode_returns_object() {
        let client = RecordingClient::replying(&ollama_body(
            r#"{"emotional_tone":"rueful","key_themes":["forgetfulness"],"readability":"easy","sentiment_score":0.2}"#,
        ));
        let (service, _, _, user_id) = setup(client.clone(), ResponseFormat::Json).await;

        let analysis = service.analyze(user_id, "I forgot my keys at the office").await.unwrap();
        match analysis {
            Analysis::Structured(map) => assert_eq!(map["emotional_tone"], "rueful"),
            other => panic!("expected structured analysis, got {:?}", other),
        }

        let (_, _, _, prompt) = client.last.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("sentiment_score"));
    }

    #[tokio::test]
    async fn test_client_errors_propagate() {
        let client = RecordingClient::failing(|| AnalysisError::Timeout(120));
        let (service, _, _, user_id) = setup(client, ResponseFormat::Text).await;

        let result = service.analyze(user_id, "I forgot my keys at the office").await;
        assert!(matches!(result, Err(AnalysisError::Timeout(120))));
    }

    #[test]
    fn test_structured_to_stored_is_json() {
        let mut map = serde_json::Map::new();
        map.insert("readability".to_string(), serde_json::json!("easy"));
        assert_eq!(Analysis::Structured(map).to_stored(), r#"{"readability":"easy"}"#);
    }

    #[test]
    fn test_elapsed_millis_saturates() {
        assert_eq!(elapsed_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(elapsed_millis(Duration::MAX), u64::MAX);
    }
}
