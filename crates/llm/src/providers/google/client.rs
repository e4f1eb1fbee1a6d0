//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, GoogleModelInfo,
    ListModelsResponse, Part,
};
use crate::providers::{
    api_error, http_client, non_empty, CompletionRequest, LlmError, LlmProvider, ProviderKind,
    ProviderSettings, CONNECTION_TEST_PROMPT, CONNECTION_TEST_TIMEOUT, DEFAULT_TIMEOUT,
};

pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";

/// Google Gemini provider.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GoogleProvider {
    /// Create a new Gemini provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is missing or does not look like a Google
    /// API key.
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key: Self::validate_key(&settings.require_api_key()?)?,
            model: settings.model.trim_start_matches("models/").to_string(),
            base_url: settings.base_url_or(GOOGLE_API_BASE),
            timeout: settings.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Google keys always start with `AIza`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Auth`] for anything else.
    pub fn validate_key(api_key: &str) -> Result<String, LlmError> {
        let key = api_key.trim();
        if key.starts_with("AIza") {
            Ok(key.to_string())
        } else {
            Err(LlmError::Auth(
                "Google Gemini API key must start with 'AIza'".to_string(),
            ))
        }
    }

    /// List models that support `generateContent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or the API call fails.
    pub async fn list_models(
        client: &Client,
        base_url: &str,
        api_key: &str,
    ) -> Result<Vec<GoogleModelInfo>, LlmError> {
        let api_key = Self::validate_key(api_key)?;
        let url = format!("{}/models", base_url.trim_end_matches('/'));
        debug!(url = %url, "Listing Gemini models");

        let response = client
            .get(&url)
            .query(&[("key", api_key.as_str())])
            .timeout(CONNECTION_TEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: ListModelsResponse = serde_json::from_str(&response.text().await?)?;
        Ok(parsed.generation_models())
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(url = %url, "Making Gemini API request");

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(request.timeout.unwrap_or(self.timeout))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response.text().await?)?;
        non_empty(parsed.into_text(), ProviderKind::Google)
    }

    /// Confirms the configured model is offered before sending the prompt.
    async fn test_connection(&self) -> Result<(), LlmError> {
        let models = Self::list_models(&self.client, &self.base_url, &self.api_key).await?;
        if !models.iter().any(|m| m.name == self.model) {
            let available: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
            return Err(LlmError::ModelUnavailable(format!(
                "{} (available: {})",
                self.model,
                available.join(", ")
            )));
        }

        let request = CompletionRequest::new(CONNECTION_TEST_PROMPT, 10)
            .with_timeout(CONNECTION_TEST_TIMEOUT);
        match self.generate(&request).await {
            Ok(_) | Err(LlmError::EmptyResponse(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// List Gemini generation models for an API key, without a configured
/// provider.
///
/// # Errors
///
/// Returns an error if the key is malformed or the API call fails.
pub async fn list_models(
    base_url: Option<&str>,
    api_key: &str,
) -> Result<Vec<GoogleModelInfo>, LlmError> {
    let client = http_client()?;
    GoogleProvider::list_models(&client, base_url.unwrap_or(GOOGLE_API_BASE), api_key).await
}
