//! Sales opportunities.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{patch, patch_opt};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OpportunityStage {
    #[default]
    Qualificacao,
    Proposta,
    Negociacao,
    Fechado,
    Perdido,
}

impl OpportunityStage {
    pub const ALL: [OpportunityStage; 5] = [
        Self::Qualificacao,
        Self::Proposta,
        Self::Negociacao,
        Self::Fechado,
        Self::Perdido,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qualificacao => "qualificacao",
            Self::Proposta => "proposta",
            Self::Negociacao => "negociacao",
            Self::Fechado => "fechado",
            Self::Perdido => "perdido",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Opportunity {
    pub id: i64,
    pub name: String,
    pub contact_id: i64,
    pub value: Option<f64>,
    pub stage: OpportunityStage,
    pub probability: i64,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityCreate {
    pub name: String,
    pub contact_id: i64,
    pub value: Option<f64>,
    #[serde(default)]
    pub stage: OpportunityStage,
    #[serde(default)]
    pub probability: i64,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityUpdate {
    pub name: Option<String>,
    pub contact_id: Option<i64>,
    pub value: Option<f64>,
    pub stage: Option<OpportunityStage>,
    pub probability: Option<i64>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Opportunity {
    pub fn apply(&mut self, update: OpportunityUpdate) {
        patch(&mut self.name, update.name);
        patch(&mut self.contact_id, update.contact_id);
        patch_opt(&mut self.value, update.value);
        patch(&mut self.stage, update.stage);
        patch(&mut self.probability, update.probability);
        patch_opt(&mut self.expected_close_date, update.expected_close_date);
        patch_opt(&mut self.notes, update.notes);
    }
}

/// Probability is a percentage.
#[must_use]
pub fn valid_probability(probability: i64) -> bool {
    (0..=100).contains(&probability)
}
