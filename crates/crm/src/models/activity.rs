//! Tasks, calls, meetings and notes.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{patch, patch_opt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivityType {
    Task,
    Call,
    Meeting,
    Note,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Activity {
    pub id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub status: ActivityStatus,
    pub contact_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub project_id: Option<i64>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityCreate {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub status: ActivityStatus,
    pub contact_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityUpdate {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub status: Option<ActivityStatus>,
    pub contact_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub project_id: Option<i64>,
}

impl Activity {
    pub fn apply(&mut self, update: ActivityUpdate) {
        patch(&mut self.activity_type, update.activity_type);
        patch(&mut self.subject, update.subject);
        patch_opt(&mut self.description, update.description);
        patch_opt(&mut self.due_date, update.due_date);
        patch_opt(&mut self.due_time, update.due_time);
        patch(&mut self.status, update.status);
        patch_opt(&mut self.contact_id, update.contact_id);
        patch_opt(&mut self.opportunity_id, update.opportunity_id);
        patch_opt(&mut self.project_id, update.project_id);
    }
}
