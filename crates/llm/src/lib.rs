#![allow(clippy::doc_markdown)] // Allow brand names like OpenAI, Anthropic without backticks

//! Text completion clients for the LLM providers used by the CRM.
//!
//! Every backend is reached through the same [`providers::LlmProvider`]
//! trait, so callers pick a provider at runtime from stored configuration:
//!
//! - **Grok**, **OpenAI** and **Mistral** - OpenAI-compatible chat completions
//! - **Anthropic** - Messages API
//! - **Google** - Gemini `generateContent`
//! - **Ollama** - local `/api/generate`
//! - **Cohere** - `/v1/generate`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crm_llm::providers::{build_provider, ProviderKind, ProviderSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), crm_llm::providers::LlmError> {
//!     let settings = ProviderSettings::new(ProviderKind::OpenAi, "gpt-4o-mini")
//!         .with_api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default());
//!     let provider = build_provider(&settings)?;
//!
//!     let reply = provider.complete("Resuma este lead em uma frase.", 200).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! ## Connection tests
//!
//! [`providers::LlmProvider::test_connection`] sends a tiny prompt with a
//! short timeout. Any successful HTTP exchange counts as a pass, even when
//! the model answers with an empty body.

pub mod catalog;
pub mod providers;

pub use providers::{build_provider, LlmError, LlmProvider, ProviderKind, ProviderSettings};
