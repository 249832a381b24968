//! Configuration loading, validation, and management for Recruitr.
//!
//! Loads configuration from `~/.recruitr/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.recruitr/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// ATS data service settings
    #[serde(default)]
    pub graphql: GraphQlConfig,

    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Orchestration settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4-turbo".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GraphQlConfig {
    #[serde(default = "default_graphql_endpoint")]
    pub endpoint: String,

    /// Service secret used in batch mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
}

fn default_graphql_endpoint() -> String {
    "http://localhost:8080/v1/graphql".into()
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            endpoint: default_graphql_endpoint(),
            admin_secret: None,
        }
    }
}

impl std::fmt::Debug for GraphQlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlConfig")
            .field("endpoint", &self.endpoint)
            .field("admin_secret", &redact(&self.admin_secret))
            .finish()
    }
}

/// Which key-value backend holds session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Transcript lifetime; 0 disables expiry
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_secs: u64,

    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".into()
}
fn default_conversation_ttl() -> u64 {
    86_400
}
fn default_credential_ttl() -> u64 {
    3_600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            conversation_ttl_secs: default_conversation_ttl(),
            credential_ttl_secs: default_credential_ttl(),
        }
    }
}

/// Where tool calls get their credential from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// The session's cached bearer token.
    #[default]
    Interactive,
    /// The configured admin secret.
    Batch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mode: AgentMode,

    /// Tool rounds allowed per turn before the session is reset
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Timeout for outbound HTTP calls (LLM and GraphQL)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_rounds() -> u32 {
    5
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            max_rounds: default_max_rounds(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// HS256 key for bearer JWTs. Without it every bearer token is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_signing_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jwt_signing_key: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_signing_key", &redact(&self.jwt_signing_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recruitr/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// - `RECRUITR_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `RECRUITR_MODEL`, `RECRUITR_LLM_URL`
    /// - `GRAPHQL_ENDPOINT`, `HASURA_ADMIN_SECRET`
    /// - `REDIS_URL`, or `REDIS_HOST` + `REDIS_PORT`; either selects the Redis backend
    /// - `JWT_SIGNING_KEY`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("RECRUITR_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("RECRUITR_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("RECRUITR_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Some(endpoint) = lookup("GRAPHQL_ENDPOINT") {
            self.graphql.endpoint = endpoint;
        }
        if let Some(secret) = lookup("HASURA_ADMIN_SECRET") {
            self.graphql.admin_secret = Some(secret);
        }

        let redis_url = lookup("REDIS_URL").or_else(|| {
            lookup("REDIS_HOST").map(|host| {
                let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".into());
                format!("redis://{host}:{port}")
            })
        });
        if let Some(url) = redis_url {
            self.store.backend = StoreBackend::Redis;
            self.store.redis_url = url;
        }

        if let Some(key) = lookup("JWT_SIGNING_KEY") {
            self.gateway.jwt_signing_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recruitr")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.request_timeout_secs must be > 0".into(),
            ));
        }

        if self.graphql.endpoint.is_empty() {
            return Err(ConfigError::ValidationError("graphql.endpoint is empty".into()));
        }

        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
