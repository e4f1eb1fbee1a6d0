//! Stored results of the lead-analysis pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Completed,
    Error,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeadAnalysis {
    pub id: i64,
    pub contact_id: i64,
    pub company_info: Option<String>,
    pub market_analysis: Option<String>,
    pub financial_insights: Option<String>,
    pub recommendations: Option<String>,
    pub risk_assessment: Option<String>,
    pub opportunity_score: Option<i64>,
    pub analysis_metadata: Option<Json<Value>>,
    pub ai_model_used: Option<String>,
    pub analysis_status: AnalysisStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl LeadAnalysis {
    /// Parsed potential deal value, if the model reported one.
    #[must_use]
    pub fn potential_value(&self) -> Option<f64> {
        self.analysis_metadata
            .as_ref()?
            .get("potential_value")?
            .as_f64()
    }
}
