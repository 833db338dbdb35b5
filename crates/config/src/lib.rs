//! Configuration loading, validation, and management for MacroSage.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at startup. API keys never appear in
//! Debug output.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `macrosage.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Upstream data provider configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm", &self.llm)
            .field("database", &self.database)
            .field("gateway", &self.gateway)
            .field("agent", &self.agent)
            .field("upstream", &self.upstream)
            .finish()
    }
}

/// Reasoning backend settings (OpenAI-compatible chat completions).
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "macrosage.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
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
        }
    }
}

/// Agent loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on reasoning rounds per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// How many recent conversation rows to load as context
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Character budget for assembled history
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// Per-tool-call timeout in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_history_limit() -> u32 {
    10
}
fn default_context_budget() -> usize {
    12_000
}
fn default_tool_timeout() -> u64 {
    15
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_limit: default_history_limit(),
            context_budget_chars: default_context_budget(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

/// Upstream data provider endpoints and credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_fred_base_url")]
    pub fred_base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fred_api_key: Option<String>,

    #[serde(default = "default_news_base_url")]
    pub news_base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_api_key: Option<String>,

    #[serde(default = "default_exchange_base_url")]
    pub exchange_base_url: String,

    /// Per-request timeout for upstream HTTP calls, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_fred_base_url() -> String {
    "https://api.stlouisfed.org/fred".into()
}
fn default_news_base_url() -> String {
    "https://newsapi.org/v2".into()
}
fn default_exchange_base_url() -> String {
    "https://api.exchangerate-api.com/v4".into()
}
fn default_upstream_timeout() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            fred_base_url: default_fred_base_url(),
            fred_api_key: None,
            news_base_url: default_news_base_url(),
            news_api_key: None,
            exchange_base_url: default_exchange_base_url(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("fred_base_url", &self.fred_base_url)
            .field("fred_api_key", &redact(&self.fred_api_key))
            .field("news_base_url", &self.news_base_url)
            .field("news_api_key", &redact(&self.news_api_key))
            .field("exchange_base_url", &self.exchange_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (`./macrosage.toml`), with
    /// environment variable overrides applied afterwards:
    /// - `MACROSAGE_API_KEY` / `OPENAI_API_KEY` — LLM key
    /// - `MACROSAGE_MODEL`, `MACROSAGE_BASE_URL`
    /// - `FRED_API_KEY`, `NEWS_API_KEY`
    /// - `MACROSAGE_DB_PATH`, `MACROSAGE_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("macrosage.toml"))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path. Missing file means
    /// defaults.
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

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = std::env::var("MACROSAGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("MACROSAGE_MODEL") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("MACROSAGE_BASE_URL") {
            self.llm.base_url = url;
        }
        if self.upstream.fred_api_key.is_none() {
            self.upstream.fred_api_key = std::env::var("FRED_API_KEY").ok();
        }
        if self.upstream.news_api_key.is_none() {
            self.upstream.news_api_key = std::env::var("NEWS_API_KEY").ok();
        }
        if let Ok(path) = std::env::var("MACROSAGE_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(port) = std::env::var("MACROSAGE_PORT")
            && let Ok(port) = port.parse()
        {
            self.gateway.port = port;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_tokens must be > 0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }
        if self.agent.context_budget_chars < 1000 {
            return Err(ConfigError::ValidationError(
                "agent.context_budget_chars must be at least 1000".into(),
            ));
        }
        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_llm_key(&self) -> bool {
        self.llm.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            database: DatabaseConfig::default(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            upstream: UpstreamConfig::default(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/macrosage.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gateway]\nport = 9999").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9999);
        assert_eq!(config.agent.max_iterations, 5);
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-super-secret".into());
        config.upstream.fred_api_key = Some("fred-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(!debug.contains("fred-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
