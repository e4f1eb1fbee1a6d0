//! Delivery projects: sales → planning → development.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{patch, patch_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Lead,
    Qualificacao,
    Proposta,
    Aprovado,
    EmPlanejamento,
    PlanejamentoConcluido,
    EmDesenvolvimento,
    EmRevisao,
    Concluido,
    Cancelado,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectType {
    MarketingSite,
    SaasPlatform,
    EnterpriseSoftware,
    #[default]
    CustomDevelopment,
    Consulting,
    Other,
}

impl ProjectType {
    /// Parse the wire value; unknown strings yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.trim().to_string())).ok()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub contact_id: i64,
    pub opportunity_id: Option<i64>,
    pub owner_id: i64,
    pub planning_owner_id: Option<i64>,
    pub dev_owner_id: Option<i64>,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    pub estimated_value: Option<String>,
    pub approved_value: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub technical_requirements: Option<String>,
    pub tech_stack: Option<String>,
    pub repository_url: Option<String>,
    pub deployment_url: Option<String>,
    pub internal_notes: Option<String>,
    pub planning_notes: Option<String>,
    pub dev_notes: Option<String>,
    pub client_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_to_planning_at: Option<DateTime<Utc>>,
    pub sent_to_dev_at: Option<DateTime<Utc>>,
}

/// Project with the display names of the people and contact it references.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub contact_name: Option<String>,
    pub owner_name: Option<String>,
    pub planning_owner_name: Option<String>,
    pub dev_owner_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    pub description: Option<String>,
    pub contact_id: i64,
    pub opportunity_id: Option<i64>,
    #[serde(default)]
    pub project_type: ProjectType,
    pub estimated_value: Option<String>,
    pub technical_requirements: Option<String>,
    pub tech_stack: Option<String>,
    pub internal_notes: Option<String>,
    pub client_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_type: Option<ProjectType>,
    pub status: Option<ProjectStatus>,
    pub planning_owner_id: Option<i64>,
    pub dev_owner_id: Option<i64>,
    pub estimated_value: Option<String>,
    pub approved_value: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub technical_requirements: Option<String>,
    pub tech_stack: Option<String>,
    pub repository_url: Option<String>,
    pub deployment_url: Option<String>,
    pub internal_notes: Option<String>,
    pub planning_notes: Option<String>,
    pub dev_notes: Option<String>,
    pub client_notes: Option<String>,
}

impl Project {
    /// Apply a patch and stamp hand-off times for status changes.
    pub fn apply(&mut self, update: ProjectUpdate, now: DateTime<Utc>) {
        patch(&mut self.name, update.name);
        patch_opt(&mut self.description, update.description);
        patch(&mut self.project_type, update.project_type);
        patch_opt(&mut self.planning_owner_id, update.planning_owner_id);
        patch_opt(&mut self.dev_owner_id, update.dev_owner_id);
        patch_opt(&mut self.estimated_value, update.estimated_value);
        patch_opt(&mut self.approved_value, update.approved_value);
        patch_opt(&mut self.start_date, update.start_date);
        patch_opt(&mut self.expected_delivery_date, update.expected_delivery_date);
        patch_opt(&mut self.actual_delivery_date, update.actual_delivery_date);
        patch_opt(&mut self.technical_requirements, update.technical_requirements);
        patch_opt(&mut self.tech_stack, update.tech_stack);
        patch_opt(&mut self.repository_url, update.repository_url);
        patch_opt(&mut self.deployment_url, update.deployment_url);
        patch_opt(&mut self.internal_notes, update.internal_notes);
        patch_opt(&mut self.planning_notes, update.planning_notes);
        patch_opt(&mut self.dev_notes, update.dev_notes);
        patch_opt(&mut self.client_notes, update.client_notes);

        if let Some(status) = update.status {
            if status == ProjectStatus::EmPlanejamento && self.planning_owner_id.is_some() {
                self.sent_to_planning_at = Some(now);
            }
            if status == ProjectStatus::EmDesenvolvimento && self.dev_owner_id.is_some() {
                self.sent_to_dev_at = Some(now);
            }
            self.status = status;
        }
    }
}
