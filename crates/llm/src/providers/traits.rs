//! Provider trait and common types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default sampling temperature for every provider that accepts one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Prompt sent by [`LlmProvider::test_connection`].
pub const CONNECTION_TEST_PROMPT: &str = "Teste de conexão. Responda apenas 'OK'.";

/// Timeout applied to connection tests.
pub const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while talking to a provider.
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP request failed (connect error, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Authentication error (missing or malformed API key).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Provider answered without any text.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Configured model is not offered by the provider.
    #[error("Model not available: {0}")]
    ModelUnavailable(String),
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Grok,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
    Google,
    Mistral,
    Cohere,
}

impl ProviderKind {
    /// All providers, in catalog order.
    pub const ALL: [ProviderKind; 7] = [
        Self::Grok,
        Self::OpenAi,
        Self::Anthropic,
        Self::Ollama,
        Self::Google,
        Self::Mistral,
        Self::Cohere,
    ];

    /// Lowercase identifier used in storage and URLs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grok => "grok",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::Google => "google",
            Self::Mistral => "mistral",
            Self::Cohere => "cohere",
        }
    }

    /// Whether requests need an API key.
    #[must_use]
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LlmError::Config(format!("Provider not supported: {s}")))
    }
}

/// Everything needed to build a provider client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint (self-hosted gateways, tests).
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ProviderSettings {
    #[must_use]
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: None,
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Trimmed, non-empty API key.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Auth`] when the key is missing or blank.
    pub fn require_api_key(&self) -> Result<String, LlmError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::Auth(format!("API key is required for {}", self.kind)))
    }

    /// Base URL without a trailing slash, falling back to `default`.
    #[must_use]
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request timeout; the client's default applies when `None`.
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Trait implemented by every provider client.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier.
    fn kind(&self) -> ProviderKind;

    /// Model the client sends requests to.
    fn model(&self) -> &str;

    /// Run a completion and return the generated text.
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Shorthand for a default-temperature completion.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        self.generate(&CompletionRequest::new(prompt, max_tokens))
            .await
    }

    /// Check credentials and reachability with a minimal prompt.
    async fn test_connection(&self) -> Result<(), LlmError> {
        let request = CompletionRequest::new(CONNECTION_TEST_PROMPT, 10)
            .with_timeout(CONNECTION_TEST_TIMEOUT);
        match self.generate(&request).await {
            Ok(_) | Err(LlmError::EmptyResponse(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("watson".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_only_ollama_runs_without_key() {
        let keyless: Vec<_> = ProviderKind::ALL
            .into_iter()
            .filter(|kind| !kind.requires_api_key())
            .collect();
        assert_eq!(keyless, vec![ProviderKind::Ollama]);
    }

    #[test]
    fn test_require_api_key_rejects_blank() {
        let settings = ProviderSettings::new(ProviderKind::Grok, "grok-1").with_api_key("   ");
        assert!(matches!(settings.require_api_key(), Err(LlmError::Auth(_))));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let settings =
            ProviderSettings::new(ProviderKind::OpenAi, "gpt-4o").with_base_url("http://proxy/v1/");
        assert_eq!(settings.base_url_or("https://api.openai.com/v1"), "http://proxy/v1");

        let settings = ProviderSettings::new(ProviderKind::OpenAi, "gpt-4o");
        assert_eq!(
            settings.base_url_or("https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
    }
}
