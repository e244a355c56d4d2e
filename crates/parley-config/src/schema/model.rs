//! Model endpoint configuration.

use std::fmt;

use parley_common::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings for the hosted completion endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Credential. Normally supplied through `OPENAI_API_KEY`, never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Prepended to the history as a `system` message when set.
    pub system_prompt: Option<String>,
    pub connect_timeout_secs: u64,
    /// Upper bound on one HTTP request, streaming included.
    pub request_timeout_secs: u64,
    /// Extra attempts for transient failures. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            temperature: 0.7,
            system_prompt: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl ModelConfig {
    /// The credential, or `ConfigError::Missing` naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY is not set".into()))
    }
}
