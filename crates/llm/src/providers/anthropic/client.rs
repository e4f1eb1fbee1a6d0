//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::models::{InputMessage, MessagesRequest, MessagesResponse};
use crate::providers::{
    api_error, http_client, non_empty, CompletionRequest, LlmError, LlmProvider, ProviderKind,
    ProviderSettings, DEFAULT_TIMEOUT,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key: settings.require_api_key()?,
            model: settings.model.clone(),
            base_url: settings.base_url_or(ANTHROPIC_API_BASE),
            timeout: settings.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.base_url);
        debug!(url = %url, "Making Anthropic API request");

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![InputMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(request.timeout.unwrap_or(self.timeout))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: MessagesResponse = serde_json::from_str(&response.text().await?)?;
        non_empty(parsed.into_text(), ProviderKind::Anthropic)
    }
}
