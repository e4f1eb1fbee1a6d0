//! Anthropic Messages API client.
//!
//! Authenticates with `x-api-key` and pins `anthropic-version`; the reply
//! text is the first content block.

mod client;
mod models;

pub use client::AnthropicProvider;
pub use models::*;
