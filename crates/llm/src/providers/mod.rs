//! LLM provider implementations.
//!
//! - OpenAI-compatible chat completions (Grok, OpenAI, Mistral)
//! - Anthropic Messages API
//! - Google Gemini
//! - Ollama
//! - Cohere

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod ollama;
pub mod openai;
mod traits;

use reqwest::{Client, Response};
use serde_json::Value;

pub use anthropic::AnthropicProvider;
pub use cohere::CohereProvider;
pub use google::GoogleProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use traits::{
    CompletionRequest, LlmError, LlmProvider, ProviderKind, ProviderSettings,
    CONNECTION_TEST_PROMPT, CONNECTION_TEST_TIMEOUT, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};

const USER_AGENT: &str = concat!("crm-llm/", env!("CARGO_PKG_VERSION"));

/// Build the client for `settings.kind`.
///
/// # Errors
///
/// Returns [`LlmError::Auth`] when a required key is missing or malformed and
/// [`LlmError::Http`] when the HTTP client cannot be constructed.
pub fn build_provider(settings: &ProviderSettings) -> Result<Box<dyn LlmProvider>, LlmError> {
    let provider: Box<dyn LlmProvider> = match settings.kind {
        ProviderKind::Grok | ProviderKind::OpenAi | ProviderKind::Mistral => {
            Box::new(OpenAiCompatibleProvider::new(settings)?)
        }
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(settings)?),
        ProviderKind::Google => Box::new(GoogleProvider::new(settings)?),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(settings)?),
        ProviderKind::Cohere => Box::new(CohereProvider::new(settings)?),
    };
    Ok(provider)
}

pub(crate) fn http_client() -> Result<Client, LlmError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(LlmError::Http)
}

/// Turn a non-2xx response into [`LlmError::Api`].
///
/// Uses the provider's error message when the body is JSON, the raw body
/// otherwise.
pub(crate) async fn api_error(response: Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or(body);
    LlmError::Api { status, message }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Reject blank completions so callers never store an empty analysis.
pub(crate) fn non_empty(text: Option<String>, kind: ProviderKind) -> Result<String, LlmError> {
    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| LlmError::EmptyResponse(kind.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"quota"}"#).as_deref(),
            Some("quota")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"model not found"}"#).as_deref(),
            Some("model not found")
        );
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_build_provider_requires_key() {
        let settings = ProviderSettings::new(ProviderKind::Anthropic, "claude-3-haiku-20240307");
        assert!(matches!(build_provider(&settings), Err(LlmError::Auth(_))));

        let settings = ProviderSettings::new(ProviderKind::Ollama, "llama3");
        let provider = build_provider(&settings).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Ollama);
        assert_eq!(provider.model(), "llama3");
    }

    #[test]
    fn test_non_empty_rejects_whitespace() {
        assert!(non_empty(Some("  \n".to_string()), ProviderKind::Grok).is_err());
        assert!(non_empty(None, ProviderKind::Grok).is_err());
        assert_eq!(non_empty(Some("ok".to_string()), ProviderKind::Grok).unwrap(), "ok");
    }
}
