//! Sales CRM backend.
//!
//! This crate provides:
//! - Contacts, opportunities, activities and delivery projects with role scoping
//! - Commission structures and tiered commission calculation
//! - Sales goals and per-user notifications
//! - LLM-backed lead analysis, quote generation and a chat assistant
//! - Website webhook and web-to-lead intake
//! - The axum HTTP service exposing all of the above under `/api`

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod ai_provider;
pub mod analysis;
pub mod assistant;
pub mod auth;
pub mod commission;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{build_router, AppState};
