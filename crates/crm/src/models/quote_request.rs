//! Quote requests handed from sales to planning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuoteRequest {
    pub id: i64,
    pub project_id: i64,
    pub seller_id: i64,
    pub planning_owner_id: Option<i64>,
    pub status: QuoteStatus,
    pub seller_notes: Option<String>,
    pub technologies: Option<Json<Vec<String>>>,
    pub stages: Option<Json<Value>>,
    pub estimated_deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<i64>,
    pub technical_specs: Option<String>,
    pub ai_generated: bool,
    pub estimated_value: Option<String>,
    pub breakdown: Option<Json<Value>>,
    pub seller_notified_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quote request with project and people names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuoteRequestView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quote: QuoteRequest,
    pub project_name: Option<String>,
    pub seller_name: Option<String>,
    pub planning_owner_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequestCreate {
    pub project_id: i64,
    pub seller_notes: Option<String>,
}

/// Planning team's answer. Technologies arrive comma-separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRequestUpdate {
    pub technologies: Option<String>,
    pub stages: Option<Value>,
    pub estimated_deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<i64>,
    pub technical_details: Option<String>,
    pub estimated_value: Option<String>,
    pub breakdown: Option<Value>,
}

/// Split a comma-separated technology list.
#[must_use]
pub fn split_technologies(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_technologies() {
        assert_eq!(
            split_technologies(" Rust, PostgreSQL,, React "),
            vec!["Rust", "PostgreSQL", "React"]
        );
        assert!(split_technologies(" , ").is_empty());
    }
}
