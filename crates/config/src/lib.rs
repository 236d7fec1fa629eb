//! Configuration loading, validation, and management for grokcli.
//!
//! Loads configuration from `~/.grokcli/config.toml` with environment
//! variable overrides. Validates all settings at startup, before any agent
//! is constructed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the xAI API key.
pub const XAI_API_KEY_ENV: &str = "XAI_API_KEY";
/// Environment variable holding the OpenAI API key used by `--dev`.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// The root configuration structure.
///
/// Maps directly to `~/.grokcli/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// xAI API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used in normal mode
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Replaces the built-in system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Request parameters to strip in addition to the per-model defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_params: Vec<String>,

    /// Development profile (`--dev`)
    #[serde(default)]
    pub dev: DevConfig,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentSettings,

    /// Rate-limit retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Conversation compaction policy
    #[serde(default)]
    pub compaction: CompactionSettings,

    /// Tool behavior
    #[serde(default)]
    pub tools: ToolSettings,
}

fn default_model() -> String {
    "grok-4-0709".into()
}
fn default_base_url() -> String {
    "https://api.x.ai/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|s| s.len()))
            .field("unsupported_params", &self.unsupported_params)
            .field("dev", &self.dev)
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("compaction", &self.compaction)
            .field("tools", &self.tools)
            .finish()
    }
}

/// The cheaper OpenAI model used while developing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_dev_model")]
    pub model: String,

    #[serde(default = "default_dev_base_url")]
    pub base_url: String,
}

fn default_dev_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_dev_base_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            model: default_dev_model(),
            base_url: default_dev_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model/tool round-trips per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock cap per user turn in seconds; 0 disables it
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_turn_timeout_secs() -> u64 {
    300
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            turn_timeout_secs: default_turn_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_jitter_ms() -> u64 {
    250
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Live-history size (estimated tokens) that triggers a summary
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Most recent turns kept verbatim after compaction
    #[serde(default = "default_retain_messages")]
    pub retain_messages: usize,
}

fn default_true() -> bool {
    true
}
fn default_token_limit() -> usize {
    2000
}
fn default_retain_messages() -> usize {
    6
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            token_limit: default_token_limit(),
            retain_messages: default_retain_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Max characters of before/after snippets in `edit_file` results
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_snippet_chars() -> usize {
    200
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            snippet_chars: default_snippet_chars(),
        }
    }
}

/// Credentials and endpoint selected for this session.
#[derive(Clone)]
pub struct ProviderProfile {
    /// Provider name used in logs ("xai" or "openai")
    pub name: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default location, applying environment
    /// variable overrides.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
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
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(XAI_API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("GROKCLI_MODEL") {
            self.model = model;
        }
        if let Some(url) = non_empty("GROKCLI_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Pick credentials and endpoint for the session.
    ///
    /// In dev mode the OpenAI key from `lookup` is mandatory; otherwise the
    /// `--api-key` flag wins over the configured/env key. A missing key is a
    /// configuration error surfaced before the agent is built.
    pub fn resolve_profile(
        &self,
        dev: bool,
        api_key_flag: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderProfile, ConfigError> {
        if dev {
            let api_key = lookup(OPENAI_API_KEY_ENV)
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingApiKey(format!(
                        "Development mode requires the {OPENAI_API_KEY_ENV} environment variable. \
                         Get it from https://platform.openai.com/api-keys"
                    ))
                })?;
            return Ok(ProviderProfile {
                name: "openai".into(),
                api_key,
                model: self.dev.model.clone(),
                base_url: self.dev.base_url.clone(),
            });
        }

        let api_key = api_key_flag
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                ConfigError::MissingApiKey(format!(
                    "API key is required. Provide it via --api-key or the {XAI_API_KEY_ENV} \
                     environment variable. Get it from https://x.ai/api"
                ))
            })?;

        Ok(ProviderProfile {
            name: "xai".into(),
            api_key,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
        })
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".grokcli")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.compaction.retain_messages == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.retain_messages must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            unsupported_params: Vec::new(),
            dev: DevConfig::default(),
            agent: AgentSettings::default(),
            retry: RetrySettings::default(),
            compaction: CompactionSettings::default(),
            tools: ToolSettings::default(),
        }
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

    #[error("{0}")]
    MissingApiKey(String),
}
