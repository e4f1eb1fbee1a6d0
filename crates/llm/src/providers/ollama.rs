//! Ollama client for locally hosted models.
//!
//! No authentication. Generation is slower than hosted APIs, so the default
//! timeout is doubled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    api_error, http_client, non_empty, CompletionRequest, LlmError, LlmProvider, ProviderKind,
    ProviderSettings,
};

const OLLAMA_API_BASE: &str = "http://localhost:11434";
const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            model: settings.model.clone(),
            base_url: settings.base_url_or(OLLAMA_API_BASE),
            timeout: settings.timeout.unwrap_or(OLLAMA_TIMEOUT),
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, "Making Ollama request");

        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout.unwrap_or(self.timeout))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: GenerateResponse = serde_json::from_str(&response.text().await?)?;
        non_empty(parsed.response, ProviderKind::Ollama)
    }
}
