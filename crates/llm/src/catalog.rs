//! Static catalog of suggested models per provider.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::providers::ProviderKind;

/// A selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub name: &'static str,
    pub display: &'static str,
}

const fn entry(name: &'static str, display: &'static str) -> ModelEntry {
    ModelEntry { name, display }
}

const GROK: &[ModelEntry] = &[
    entry("grok-1", "Grok-1"),
    entry("grok-beta", "Grok Beta"),
    entry("grok-2", "Grok-2"),
];

const OPENAI: &[ModelEntry] = &[
    entry("gpt-4o", "GPT-4o"),
    entry("gpt-4-turbo", "GPT-4 Turbo"),
    entry("gpt-4", "GPT-4"),
    entry("gpt-3.5-turbo", "GPT-3.5 Turbo"),
    entry("gpt-4o-mini", "GPT-4o Mini"),
];

const ANTHROPIC: &[ModelEntry] = &[
    entry("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet"),
    entry("claude-3-opus-20240229", "Claude 3 Opus"),
    entry("claude-3-sonnet-20240229", "Claude 3 Sonnet"),
    entry("claude-3-haiku-20240307", "Claude 3 Haiku"),
];

const OLLAMA: &[ModelEntry] = &[
    entry("llama3", "Llama 3"),
    entry("llama3:70b", "Llama 3 70B"),
    entry("mistral", "Mistral"),
    entry("mixtral", "Mixtral"),
    entry("codellama", "CodeLlama"),
    entry("phi", "Phi"),
    entry("neural-chat", "Neural Chat"),
];

const GOOGLE: &[ModelEntry] = &[
    entry("gemini-2.5-flash", "Gemini 2.5 Flash"),
    entry("gemini-2.5-pro", "Gemini 2.5 Pro"),
    entry("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite"),
    entry("gemini-2.0-flash", "Gemini 2.0 Flash"),
    entry("gemini-2.0-flash-001", "Gemini 2.0 Flash 001"),
    entry("gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite"),
    entry("gemini-2.0-flash-lite-001", "Gemini 2.0 Flash Lite 001"),
];

const MISTRAL: &[ModelEntry] = &[
    entry("mistral-large-latest", "Mistral Large"),
    entry("mistral-medium-latest", "Mistral Medium"),
    entry("mistral-small-latest", "Mistral Small"),
];

const COHERE: &[ModelEntry] = &[
    entry("command", "Command"),
    entry("command-light", "Command Light"),
    entry("command-r", "Command R"),
    entry("command-r-plus", "Command R Plus"),
];

/// Suggested models for one provider.
#[must_use]
pub fn models_for(kind: ProviderKind) -> &'static [ModelEntry] {
    match kind {
        ProviderKind::Grok => GROK,
        ProviderKind::OpenAi => OPENAI,
        ProviderKind::Anthropic => ANTHROPIC,
        ProviderKind::Ollama => OLLAMA,
        ProviderKind::Google => GOOGLE,
        ProviderKind::Mistral => MISTRAL,
        ProviderKind::Cohere => COHERE,
    }
}

/// Full catalog keyed by provider identifier.
#[must_use]
pub fn available_models() -> BTreeMap<&'static str, &'static [ModelEntry]> {
    ProviderKind::ALL
        .into_iter()
        .map(|kind| (kind.as_str(), models_for(kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_provider() {
        let catalog = available_models();
        assert_eq!(catalog.len(), ProviderKind::ALL.len());
        assert!(catalog.values().all(|models| !models.is_empty()));
        assert_eq!(catalog["grok"][0].name, "grok-1");
    }
}
