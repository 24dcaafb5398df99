//! Configuration for the coach server and the terminal client.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::acquisition::{DEFAULT_CHAT_WINDOW, MAX_RETRIES, RetryPolicy};
use crate::coach::CoachSettings;
use crate::server::{LlmConfig, LlmProvider};

/// Root of `nara_chess.toml`.
#[derive(Debug, Clone, Default, Getters, Serialize, Deserialize)]
pub struct Config {
    /// Backend settings.
    #[serde(default)]
    server: ServerConfig,
    /// Terminal client settings.
    #[serde(default)]
    client: ClientConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(provider = ?config.server.llm_provider, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Mutable access to the server section, for CLI overrides.
    pub fn server_mut(&mut self) -> &mut ServerConfig {
        &mut self.server
    }

    /// Mutable access to the client section, for CLI overrides.
    pub fn client_mut(&mut self) -> &mut ClientConfig {
        &mut self.client
    }
}

/// Settings for the oracle proxy backend.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// Browser origin allowed by CORS.
    #[serde(default = "default_allowed_origin")]
    allowed_origin: String,

    /// LLM provider (gemini, openai or anthropic).
    #[serde(default = "default_provider")]
    llm_provider: LlmProvider,

    /// LLM model name; empty selects the provider's default.
    #[serde(default)]
    llm_model: String,

    /// Maximum tokens for LLM responses.
    #[serde(default = "default_max_tokens")]
    llm_max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    temperature: f32,

    /// Deadline for one LLM call.
    #[serde(default = "default_oracle_timeout_secs")]
    oracle_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,
}

#[instrument]
fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[instrument]
fn default_port() -> u16 {
    42069
}

#[instrument]
fn default_allowed_origin() -> String {
    "http://localhost:5173".to_string()
}

#[instrument]
fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}

#[instrument]
fn default_max_tokens() -> u32 {
    2048
}

#[instrument]
fn default_temperature() -> f32 {
    0.4
}

#[instrument]
fn default_oracle_timeout_secs() -> u64 {
    60
}

#[instrument]
fn default_max_body_bytes() -> usize {
    1 << 20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
            llm_provider: default_provider(),
            llm_model: String::new(),
            llm_max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Overrides the bind address.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Overrides the bind port.
    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Overrides the LLM provider.
    pub fn set_llm_provider(&mut self, provider: LlmProvider) {
        self.llm_provider = provider;
    }

    /// Deadline for one LLM call.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    /// Model to use, falling back to the provider default.
    pub fn effective_model(&self) -> String {
        if self.llm_model.trim().is_empty() {
            self.llm_provider.default_model().to_string()
        } else {
            self.llm_model.clone()
        }
    }

    /// Creates LLM configuration from this server config.
    /// Requires GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY.
    #[instrument(skip(self), fields(provider = ?self.llm_provider))]
    pub fn create_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        debug!("Creating LLM config");
        let var = self.llm_provider.api_key_var();
        let api_key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::new(format!("{} environment variable not set", var)))?;

        Ok(LlmConfig::new(
            self.llm_provider,
            api_key,
            self.effective_model(),
            self.llm_max_tokens,
            self.temperature,
        ))
    }
}

/// Settings for the terminal client.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Coach backend URL.
    #[serde(default = "default_server_url")]
    server_url: String,

    /// Failed oracle attempts allowed per turn.
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Pause between attempts.
    #[serde(default = "default_retry_delay_ms")]
    retry_delay_ms: u64,

    /// Chat entries sent with each request.
    #[serde(default = "default_chat_window")]
    chat_window: usize,

    /// Client-side HTTP deadline, above the server's LLM deadline.
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

#[instrument]
fn default_server_url() -> String {
    format!("http://{}:{}", default_host(), default_port())
}

#[instrument]
fn default_max_retries() -> u32 {
    MAX_RETRIES
}

#[instrument]
fn default_retry_delay_ms() -> u64 {
    1000
}

#[instrument]
fn default_chat_window() -> usize {
    DEFAULT_CHAT_WINDOW
}

#[instrument]
fn default_request_timeout_secs() -> u64 {
    90
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            chat_window: default_chat_window(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Overrides the backend URL.
    pub fn set_server_url(&mut self, url: impl Into<String>) {
        self.server_url = url.into();
    }

    /// HTTP deadline for one oracle request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Controller settings derived from this config.
    pub fn coach_settings(&self) -> CoachSettings {
        CoachSettings {
            retry: RetryPolicy::new(
                self.max_retries.max(1),
                Duration::from_millis(self.retry_delay_ms),
            ),
            chat_window: self.chat_window,
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
