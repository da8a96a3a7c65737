//! Per-user AI model configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inference backends a story can be analyzed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Local Ollama server, no credential
    Ollama,
    /// OpenAI-compatible chat completions API
    External,
}

impl AiProvider {
    pub fn requires_api_key(&self) -> bool {
        matches!(self, AiProvider::External)
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProvider::Ollama => write!(f, "ollama"),
            AiProvider::External => write!(f, "external"),
        }
    }
}

impl FromStr for AiProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(AiProvider::Ollama),
            "external" => Ok(AiProvider::External),
            _ => Err(anyhow::anyhow!("Unsupported provider: {}", s)),
        }
    }
}

/// Stored AI configuration, one row per user.
///
/// `provider` stays a plain string so rows written by older versions still
/// load; it is parsed when an analysis runs. `api_key` holds ciphertext only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModelConfig {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub model_name: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AiModelConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// What to do with the stored API key on update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiKeyChange {
    /// Leave the stored key as is
    #[default]
    Keep,
    /// Remove the stored key
    Clear,
    /// Replace with this plaintext key
    Set(String),
}

impl ApiKeyChange {
    /// Map an optional request field: absent keeps, empty clears
    pub fn from_request(value: Option<String>) -> Self {
        match value {
            None => ApiKeyChange::Keep,
            Some(key) if key.trim().is_empty() => ApiKeyChange::Clear,
            Some(key) => ApiKeyChange::Set(key.trim().to_string()),
        }
    }
}

/// Input for creating or replacing a user's AI configuration
#[derive(Debug, Clone)]
pub struct UpsertAiModelInput {
    pub provider: AiProvider,
    pub model_name: String,
    pub api_key: ApiKeyChange,
}

/// Model installed on the local Ollama server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableModel {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
}
