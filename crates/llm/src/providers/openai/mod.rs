//! OpenAI-compatible chat completions.
//!
//! Grok (x.ai), OpenAI and Mistral all expose `POST {base}/chat/completions`
//! with bearer authentication and the same request/response shape, so a
//! single client serves the three of them.

mod client;
mod models;

pub use client::OpenAiCompatibleProvider;
pub use models::*;
