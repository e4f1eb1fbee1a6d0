//! Cohere `/v1/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    api_error, http_client, non_empty, CompletionRequest, LlmError, LlmProvider, ProviderKind,
    ProviderSettings, DEFAULT_TIMEOUT,
};

const COHERE_API_BASE: &str = "https://api.cohere.ai/v1";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    text: Option<String>,
}

/// Cohere provider.
#[derive(Debug, Clone)]
pub struct CohereProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl CohereProvider {
    /// Create a new Cohere provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key: settings.require_api_key()?,
            model: settings.model.clone(),
            base_url: settings.base_url_or(COHERE_API_BASE),
            timeout: settings.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

#[async_trait]
impl LlmProvider for CohereProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cohere
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/generate", self.base_url);
        debug!(url = %url, "Making Cohere request");

        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
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

        let parsed: GenerateResponse = serde_json::from_str(&response.text().await?)?;
        let text = parsed.generations.into_iter().next().and_then(|g| g.text);
        non_empty(text, ProviderKind::Cohere)
    }
}
