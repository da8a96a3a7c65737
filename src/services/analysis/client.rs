//! Inference client
//!
//! Talks to the two supported backends over HTTP:
//!
//! - `ollama`: `POST {ollama_url}/api/generate`, no credential
//! - `external`: `POST {external_api_url}/chat/completions` with a bearer key
//!
//! Returns the raw response body; extracting the model output is the
//! normalizer's job.

use super::AnalysisError;
use crate::config::{AiConfig, ResponseFormat};
use crate::models::{AiProvider, AvailableModel};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Timeout for listing installed models
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 500;

/// One inference call
pub struct InferenceRequest<'a> {
    pub provider: AiProvider,
    pub model: &'a str,
    pub prompt: &'a str,
    pub api_key: Option<&'a str>,
    pub format: ResponseFormat,
}

/// Outbound model calls
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send the prompt and return the raw response body
    async fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, AnalysisError>;

    /// List models installed on the local model server
    async fn list_models(&self) -> Result<Vec<AvailableModel>, AnalysisError>;
}

/// reqwest-backed [`InferenceClient`]
pub struct HttpInferenceClient {
    http: reqwest::Client,
    ollama_url: String,
    external_api_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<AvailableModel>,
}

impl HttpInferenceClient {
    pub fn new(config: &AiConfig) -> Result<Self, AnalysisError> {
        Self::with_endpoints(
            &config.ollama_url,
            &config.external_api_url,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn with_endpoints(
        ollama_url: &str,
        external_api_url: &str,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("storycraft/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
            external_api_url: external_api_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn generate_ollama(&self, request: &InferenceRequest<'_>) -> Result<String, AnalysisError> {
        let mut body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
        });
        if request.format == ResponseFormat::Json {
            body["format"] = json!("json");
        }

        let response = self
            .http
            .post(format!("{}/api/generate", self.ollama_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        self.read_body(response).await
    }

    async fn generate_external(
        &self,
        request: &InferenceRequest<'_>,
    ) -> Result<String, AnalysisError> {
        let api_key = request
            .api_key
            .ok_or(AnalysisError::CredentialRequired(AiProvider::External))?;

        let mut body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if request.format == ResponseFormat::Json {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.external_api_url))
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        self.read_body(response).await
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, AnalysisError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(AnalysisError::UpstreamStatus {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(text)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Timeout(self.timeout.as_secs())
        } else {
            AnalysisError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, AnalysisError> {
        tracing::debug!(
            provider = %request.provider,
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            "Sending inference request"
        );

        match request.provider {
            AiProvider::Ollama => self.generate_ollama(request).await,
            AiProvider::External => self.generate_external(request).await,
        }
    }

    async fn list_models(&self) -> Result<Vec<AvailableModel>, AnalysisError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.ollama_url))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(LIST_MODELS_TIMEOUT.as_secs())
                } else {
                    AnalysisError::Transport(e.to_string())
                }
            })?;

        let body = self.read_body(response).await?;
        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|e| AnalysisError::Parse(e.to_string()))?;
        Ok(tags.models)
    }
}
