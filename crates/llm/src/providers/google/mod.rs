//! Google Gemini client (`generateContent` on the v1 API).
//!
//! Keys are passed as the `key` query parameter and must start with `AIza`.
//! Model names are accepted with or without the `models/` prefix.

mod client;
mod models;

pub use client::{list_models, GoogleProvider, GOOGLE_API_BASE};
pub use models::*;
