//! HTTP handlers, one router per resource.

pub mod activities;
pub mod ai;
pub mod ai_config;
pub mod auth;
pub mod commissions;
pub mod contacts;
pub mod dashboard;
pub mod external;
pub mod goals;
pub mod lead_analysis;
pub mod notifications;
pub mod opportunities;
pub mod projects;
pub mod quote_requests;
pub mod users;
pub mod webhooks;
