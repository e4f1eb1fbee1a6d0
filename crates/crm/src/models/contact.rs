//! Contacts (leads and clients).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use super::{patch, patch_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    Lead,
    Client,
    Prospect,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: ContactStatus,
    pub notes: Option<String>,
    pub project_type: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub position: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub source: Option<String>,
    pub contact_metadata: Option<Json<Value>>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactCreate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub status: ContactStatus,
    pub notes: Option<String>,
    pub project_type: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub position: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub source: Option<String>,
    pub contact_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<ContactStatus>,
    pub notes: Option<String>,
    pub project_type: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub position: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub source: Option<String>,
}

impl Contact {
    pub fn apply(&mut self, update: ContactUpdate) {
        patch(&mut self.name, update.name);
        patch_opt(&mut self.email, update.email);
        patch_opt(&mut self.phone, update.phone);
        patch_opt(&mut self.company, update.company);
        patch(&mut self.status, update.status);
        patch_opt(&mut self.notes, update.notes);
        patch_opt(&mut self.project_type, update.project_type);
        patch_opt(&mut self.budget_range, update.budget_range);
        patch_opt(&mut self.timeline, update.timeline);
        patch_opt(&mut self.website, update.website);
        patch_opt(&mut self.linkedin, update.linkedin);
        patch_opt(&mut self.position, update.position);
        patch_opt(&mut self.industry, update.industry);
        patch_opt(&mut self.company_size, update.company_size);
        patch_opt(&mut self.source, update.source);
    }

    /// Company name when known, otherwise the contact's name.
    #[must_use]
    pub fn display_company(&self) -> &str {
        self.company
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.name)
    }
}
