//! Text generation models.
//!
//! Everything that talks to an LLM goes through [`TextModel`], a plain
//! prompt-in/text-out capability. The Gemini client is built once from the
//! config and handed to the pipeline, so tests can swap in their own model.

use crate::config::{Config, ConfigError};
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM returned an empty response (possibly refused)")]
    EmptyResponse,
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// A generative text model: one prompt in, one reply out.
pub trait TextModel {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, ModelError>> + Send;
}

/// Gemini-backed [`TextModel`].
pub struct GeminiTextModel {
    client: GeminiClient,
}

impl GeminiTextModel {
    /// Build the client for the configured provider and model
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let api_key = config.api_key()?;

        // Parse the model from config
        let model = parse_gemini_model(&config.agent.model);

        let client = GeminiClient::new(api_key)
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?
            .model(model);

        Ok(Self { client })
    }
}

impl TextModel for GeminiTextModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(prompt_chars = prompt.len(), "Sending prompt to Gemini");
        let result = self
            .client
            .generate_with_metadata(prompt)
            .await
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;
        Ok(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        other => {
            warn!(model = other, "Unknown Gemini model, using gemini-2.0-flash");
            GeminiModel::Gemini20Flash
        }
    }
}

/// Retry settings applied around every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first; values below 1 count as 1
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    pub backoff: Duration,
    /// Limit for a single attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.agent.max_attempts,
            backoff: config.backoff(),
            timeout: config.timeout(),
        }
    }
}

/// Wraps a model with a per-attempt timeout and exponential backoff.
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<M: TextModel + Sync> TextModel for RetryingModel<M> {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.backoff;
        let mut attempt = 1;

        loop {
            let outcome =
                match tokio::time::timeout(self.policy.timeout, self.inner.generate(prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ModelError::Timeout(self.policy.timeout)),
                };

            match outcome {
                Ok(text) => return Ok(text),
                Err(err) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "Model call failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
