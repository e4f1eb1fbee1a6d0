//! AI provider configuration and assistant chat history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use super::{patch, patch_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AiConfigStatus {
    Active,
    #[default]
    Inactive,
    Error,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AiConfig {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub model_name: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub status: AiConfigStatus,
    pub priority: i64,
    pub config: Option<Json<Value>>,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_tested_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfigCreate {
    pub name: String,
    pub provider: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub priority: i64,
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiConfigUpdate {
    pub name: Option<String>,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub priority: Option<i64>,
    pub config: Option<Value>,
}

impl AiConfig {
    pub fn apply(&mut self, update: AiConfigUpdate) {
        patch(&mut self.name, update.name);
        patch(&mut self.model_name, update.model_name);
        patch_opt(&mut self.api_key, update.api_key);
        patch_opt(&mut self.base_url, update.base_url);
        patch(&mut self.is_active, update.is_active);
        patch(&mut self.is_default, update.is_default);
        patch(&mut self.priority, update.priority);
        patch_opt(&mut self.config, update.config.map(Json));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub role: ChatRole,
    pub content: String,
    #[sqlx(rename = "message_metadata")]
    #[serde(rename = "metadata")]
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}
