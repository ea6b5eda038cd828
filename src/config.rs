//! Configuration loading and management for esum.
//!
//! Loads settings from `esum.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so running without a config file only needs an API key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the working directory and `~/.config/esum/`.
pub const CONFIG_FILE: &str = "esum.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM provider, currently only "gemini"
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per model call, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after every failed attempt
    pub backoff_ms: u64,
    /// Chapters summarised at the same time
    pub concurrency: usize,
}

/// What to do with a chapter that references a document missing from the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingDocumentPolicy {
    /// Fail the whole run
    #[default]
    Abort,
    /// Drop the chapter and log a warning
    Skip,
}

/// What to do with a chapter whose summary still fails after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailedSummaryPolicy {
    /// Fail the whole run
    #[default]
    Abort,
    /// Keep the chapter with a placeholder in place of its summary
    Placeholder,
}

/// Summarisation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Soft word limit passed to the model for every chapter
    pub word_limit: u32,
    pub missing_document: MissingDocumentPolicy,
    pub failed_summary: FailedSummaryPolicy,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from the default location (esum.toml in cwd or home).
    ///
    /// Falls back to defaults when neither file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override API keys from environment variables
    fn apply_env(&mut self) {
        let from_env = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Some(key) = from_env {
            self.api.gemini_key = Some(key);
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        let home_config = dirs::home_dir()?
            .join(".config")
            .join("esum")
            .join(CONFIG_FILE);
        home_config.exists().then_some(home_config)
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.agent.provider.as_str() {
            "gemini" => self
                .api
                .gemini_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }

    /// Per-request timeout for model calls, never shorter than one second
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.agent.timeout_secs.max(1))
    }

    /// Initial retry delay for model calls
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.agent.backoff_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            max_attempts: 3,
            backoff_ms: 1000,
            concurrency: 1,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            word_limit: 300,
            missing_document: MissingDocumentPolicy::default(),
            failed_summary: FailedSummaryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.agent.provider, "gemini");
        assert_eq!(config.agent.model, "gemini-2.0-flash");
        assert_eq!(config.agent.concurrency, 1);
        assert_eq!(config.summary.word_limit, 300);
        assert_eq!(config.summary.missing_document, MissingDocumentPolicy::Abort);
        assert_eq!(config.summary.failed_summary, FailedSummaryPolicy::Abort);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
[agent]
model = "gemini-2.5-flash"
concurrency = 4

[summary]
word_limit = 150
missing_document = "skip"
failed_summary = "placeholder"
"#,
        )
        .unwrap();

        assert_eq!(config.agent.model, "gemini-2.5-flash");
        assert_eq!(config.agent.concurrency, 4);
        assert_eq!(config.agent.max_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.summary.word_limit, 150);
        assert_eq!(config.summary.missing_document, MissingDocumentPolicy::Skip);
        assert_eq!(config.summary.failed_summary, FailedSummaryPolicy::Placeholder);
    }

    #[test]
    fn zero_timeout_is_raised_to_one_second() {
        let config = Config::from_toml("[agent]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = Config::from_toml("[summary]\nmissing_document = \"ignore\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn api_key_requires_supported_provider() {
        let mut config = Config::default();
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::MissingApiKey(provider)) if provider == "gemini"
        ));

        config.api.gemini_key = Some("secret".to_string());
        assert_eq!(config.api_key().unwrap(), "secret");

        config.agent.provider = "openai".to_string();
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::UnsupportedProvider(provider)) if provider == "openai"
        ));
    }
}
