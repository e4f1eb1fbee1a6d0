//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::models::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::providers::{
    api_error, http_client, non_empty, CompletionRequest, LlmError, LlmProvider, ProviderKind,
    ProviderSettings, DEFAULT_TIMEOUT,
};

const GROK_API_BASE: &str = "https://api.x.ai/v1";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";

/// Grok, OpenAI or Mistral chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    kind: ProviderKind,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Create a client for one of the OpenAI-compatible providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or `settings.kind` is not an
    /// OpenAI-compatible provider.
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        let default_base = Self::default_base_url(settings.kind).ok_or_else(|| {
            LlmError::Config(format!(
                "{} does not speak the chat completions protocol",
                settings.kind
            ))
        })?;

        Ok(Self {
            client: http_client()?,
            kind: settings.kind,
            api_key: settings.require_api_key()?,
            model: settings.model.clone(),
            base_url: settings.base_url_or(default_base),
            timeout: settings.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Public endpoint for a provider, `None` for non-compatible ones.
    #[must_use]
    pub fn default_base_url(kind: ProviderKind) -> Option<&'static str> {
        match kind {
            ProviderKind::Grok => Some(GROK_API_BASE),
            ProviderKind::OpenAi => Some(OPENAI_API_BASE),
            ProviderKind::Mistral => Some(MISTRAL_API_BASE),
            _ => None,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(provider = %self.kind, model = %self.model))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, max_tokens = request.max_tokens, "Sending chat completion");

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout.unwrap_or(self.timeout))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        non_empty(parsed.into_text(), self.kind)
    }
}
