//! Configuration management
//!
//! Configuration is loaded from `config.yml` and then overridden by
//! `STORYCRAFT_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file yields a runnable development setup.
//!
//! The resulting [`Config`] is immutable after startup and handed to each
//! component when it is constructed.

use serde::{Deserialize, Serialize};

/// Secret used when none is configured. Only suitable for local development.
pub const DEVELOPMENT_SECRET_KEY: &str = "storycraft-development-secret-change-me-now";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins, comma-separated
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl ServerConfig {
    /// Split the configured origin string into individual origins
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origin
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/storycraft.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Server secret used to derive the API key encryption key
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Lifetime of a login session in days
    #[serde(default = "default_session_expiration_days")]
    pub session_expiration_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            session_expiration_days: default_session_expiration_days(),
        }
    }
}

impl SecurityConfig {
    /// Whether the built-in development secret is still in use
    pub fn uses_development_secret(&self) -> bool {
        self.secret_key == DEVELOPMENT_SECRET_KEY
    }
}

fn default_secret_key() -> String {
    DEVELOPMENT_SECRET_KEY.to_string()
}

fn default_session_expiration_days() -> i64 {
    8
}

/// Output format requested from the language model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form prose, stored as-is after cleanup
    #[default]
    Text,
    /// A JSON object with fixed keys, stored serialized
    Json,
}

/// AI inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider used when a user has no configuration of their own
    #[serde(default = "default_ai_provider")]
    pub default_provider: String,
    /// Model used when a user has no configuration of their own
    #[serde(default = "default_ai_model")]
    pub default_model: String,
    /// Base URL of the local model server
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Base URL of the OpenAI-compatible external API
    #[serde(default = "default_external_api_url")]
    pub external_api_url: String,
    /// Timeout for a single inference request
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_ai_provider(),
            default_model: default_ai_model(),
            ollama_url: default_ollama_url(),
            external_api_url: default_external_api_url(),
            timeout_seconds: default_ai_timeout(),
            response_format: ResponseFormat::default(),
        }
    }
}

fn default_ai_provider() -> String {
    "ollama".to_string()
}

fn default_ai_model() -> String {
    "llama3".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_external_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_timeout() -> u64 {
    120
}

/// First superuser, created at startup when both fields are set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate
    ///
    /// Recognised variables: `STORYCRAFT_SERVER_HOST`, `STORYCRAFT_SERVER_PORT`,
    /// `STORYCRAFT_SERVER_CORS_ORIGIN`, `STORYCRAFT_DATABASE_DRIVER`,
    /// `STORYCRAFT_DATABASE_URL`, `STORYCRAFT_SECRET_KEY`,
    /// `STORYCRAFT_SESSION_EXPIRATION_DAYS`, `STORYCRAFT_AI_DEFAULT_PROVIDER`,
    /// `STORYCRAFT_AI_DEFAULT_MODEL`, `STORYCRAFT_AI_OLLAMA_URL`,
    /// `STORYCRAFT_AI_EXTERNAL_API_URL`, `STORYCRAFT_AI_TIMEOUT_SECONDS`,
    /// `STORYCRAFT_AI_RESPONSE_FORMAT`, `STORYCRAFT_ADMIN_EMAIL`,
    /// `STORYCRAFT_ADMIN_PASSWORD`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.secret_key.chars().count() < 32 {
            return Err(ConfigError::ValidationError(
                "security.secret_key must be at least 32 characters".to_string(),
            ));
        }
        if self.security.session_expiration_days <= 0 {
            return Err(ConfigError::ValidationError(
                "security.session_expiration_days must be positive".to_string(),
            ));
        }
        if self.ai.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "ai.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        match self.ai.default_provider.parse::<crate::models::AiProvider>() {
            Err(_) => {
                return Err(ConfigError::ValidationError(format!(
                    "ai.default_provider '{}' is not a known provider",
                    self.ai.default_provider
                )));
            }
            // There is no server-wide API key to fall back on
            Ok(provider) if provider.requires_api_key() => {
                return Err(ConfigError::ValidationError(format!(
                    "ai.default_provider '{}' needs a per-user API key and cannot be the default",
                    provider
                )));
            }
            Ok(_) => {}
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("STORYCRAFT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STORYCRAFT_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("STORYCRAFT_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("STORYCRAFT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("STORYCRAFT_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("STORYCRAFT_SECRET_KEY") {
            self.security.secret_key = secret;
        }
        if let Ok(days) = std::env::var("STORYCRAFT_SESSION_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.security.session_expiration_days = days;
            }
        }

        if let Ok(provider) = std::env::var("STORYCRAFT_AI_DEFAULT_PROVIDER") {
            self.ai.default_provider = provider;
        }
        if let Ok(model) = std::env::var("STORYCRAFT_AI_DEFAULT_MODEL") {
            self.ai.default_model = model;
        }
        if let Ok(url) = std::env::var("STORYCRAFT_AI_OLLAMA_URL") {
            self.ai.ollama_url = url;
        }
        if let Ok(url) = std::env::var("STORYCRAFT_AI_EXTERNAL_API_URL") {
            self.ai.external_api_url = url;
        }
        if let Ok(timeout) = std::env::var("STORYCRAFT_AI_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.ai.timeout_seconds = timeout;
            }
        }
        if let Ok(format) = std::env::var("STORYCRAFT_AI_RESPONSE_FORMAT") {
            match format.to_lowercase().as_str() {
                "text" => self.ai.response_format = ResponseFormat::Text,
                "json" => self.ai.response_format = ResponseFormat::Json,
                _ => {}
            }
        }

        if let Ok(email) = std::env::var("STORYCRAFT_ADMIN_EMAIL") {
            self.admin.email = Some(email);
        }
        if let Ok(password) = std::env::var("STORYCRAFT_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
