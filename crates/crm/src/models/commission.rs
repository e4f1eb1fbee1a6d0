//! Commission structures and payouts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::commission::{CommissionPlan, CommissionTier, PerformanceBonus};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommissionStructure {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub weekly_base: f64,
    pub currency: String,
    pub tiered_commissions: Json<Vec<CommissionTier>>,
    pub performance_bonuses: Json<Vec<PerformanceBonus>>,
    pub recurring_commission_rate: f64,
    pub new_client_bonus: f64,
    pub new_client_threshold: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionStructure {
    #[must_use]
    pub fn plan(&self) -> CommissionPlan<'_> {
        CommissionPlan {
            weekly_base: self.weekly_base,
            tiers: &self.tiered_commissions,
            bonuses: &self.performance_bonuses,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommissionStructureCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_weekly_base")]
    pub weekly_base: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub tiered_commissions: Vec<CommissionTier>,
    #[serde(default)]
    pub performance_bonuses: Vec<PerformanceBonus>,
    #[serde(default = "default_recurring_rate")]
    pub recurring_commission_rate: f64,
    #[serde(default = "default_new_client_bonus")]
    pub new_client_bonus: f64,
    #[serde(default = "default_new_client_threshold")]
    pub new_client_threshold: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_weekly_base() -> f64 {
    100.0
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_recurring_rate() -> f64 {
    0.10
}

fn default_new_client_bonus() -> f64 {
    100.0
}

fn default_new_client_threshold() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Approved,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Commission {
    pub id: i64,
    pub seller_id: i64,
    pub structure_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub project_id: Option<i64>,
    pub deal_value: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub weekly_base: f64,
    pub performance_bonus: f64,
    pub new_client_bonus: f64,
    pub total_amount: f64,
    pub status: CommissionStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_period: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Commission row joined with the seller's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommissionView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub commission: Commission,
    pub seller_name: Option<String>,
}
