//! Admin management of LLM provider configurations.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use crm_llm::catalog::{available_models, ModelEntry};
use crm_llm::providers::google::{self, GoogleModelInfo};
use crm_llm::{build_provider, LlmError, ProviderKind};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::ai_provider::settings_for;
use crate::auth::{require_admin, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::models::ai::{AiConfigCreate, AiConfigUpdate};
use crate::models::{AiConfig, AiConfigStatus};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/models", get(list_catalog))
        .route("/google/list-models", get(list_google_models))
        .route("/", get(list_configs).post(create_config))
        .route("/{config_id}", put(update_config).delete(delete_config))
        .route("/{config_id}/test", post(test_config))
}

async fn list_catalog(
    user: CurrentUser,
) -> ApiResult<Json<BTreeMap<&'static str, &'static [ModelEntry]>>> {
    require_admin(&user)?;
    Ok(Json(available_models()))
}

#[derive(Debug, Deserialize)]
struct GoogleModelsQuery {
    api_key: String,
}

async fn list_google_models(
    user: CurrentUser,
    Query(query): Query<GoogleModelsQuery>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let models: Vec<GoogleModelInfo> = google::list_models(None, &query.api_key)
        .await
        .map_err(|e| match e {
            LlmError::Auth(msg) => ApiError::bad_request(msg),
            other => ApiError::Llm(other),
        })?;
    Ok(Json(json!({ "models": models })))
}

async fn list_configs(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<AiConfig>>> {
    require_admin(&user)?;
    let rows = sqlx::query_as("SELECT * FROM ai_configs ORDER BY priority DESC, created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

fn validate_provider(provider: &str) -> ApiResult<ProviderKind> {
    provider
        .parse()
        .map_err(|e: LlmError| ApiError::bad_request(e.to_string()))
}

async fn clear_defaults(pool: &SqlitePool, except: Option<i64>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ai_configs SET is_default = 0 WHERE is_default = 1 AND (? IS NULL OR id != ?)")
        .bind(except)
        .bind(except)
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AiConfigCreate>,
) -> ApiResult<Json<AiConfig>> {
    require_admin(&user)?;
    let kind = validate_provider(&payload.provider)?;

    if payload.is_default {
        clear_defaults(&state.db, None).await?;
    }

    let now = Utc::now();
    let config: AiConfig = sqlx::query_as(
        "INSERT INTO ai_configs \
         (name, provider, model_name, api_key, base_url, is_active, is_default, status, priority, \
          config, created_by_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&payload.name)
    .bind(kind.as_str())
    .bind(&payload.model_name)
    .bind(&payload.api_key)
    .bind(&payload.base_url)
    .bind(payload.is_active)
    .bind(payload.is_default)
    .bind(AiConfigStatus::Inactive)
    .bind(payload.priority)
    .bind(payload.config.map(SqlJson))
    .bind(user.id)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(config_id = config.id, provider = %config.provider, "AI configuration created");
    Ok(Json(config))
}

async fn find_config(pool: &SqlitePool, id: i64) -> ApiResult<AiConfig> {
    sqlx::query_as("SELECT * FROM ai_configs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("AI configuration not found"))
}

async fn update_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(config_id): Path<i64>,
    Json(payload): Json<AiConfigUpdate>,
) -> ApiResult<Json<AiConfig>> {
    require_admin(&user)?;
    let mut config = find_config(&state.db, config_id).await?;

    if payload.is_default == Some(true) {
        clear_defaults(&state.db, Some(config_id)).await?;
    }
    config.apply(payload);

    let saved = sqlx::query_as(
        "UPDATE ai_configs SET \
         name = ?, model_name = ?, api_key = ?, base_url = ?, is_active = ?, is_default = ?, \
         priority = ?, config = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(&config.name)
    .bind(&config.model_name)
    .bind(&config.api_key)
    .bind(&config.base_url)
    .bind(config.is_active)
    .bind(config.is_default)
    .bind(config.priority)
    .bind(&config.config)
    .bind(Utc::now())
    .bind(config.id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(saved))
}

async fn delete_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(config_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let config = find_config(&state.db, config_id).await?;
    sqlx::query("DELETE FROM ai_configs WHERE id = ?")
        .bind(config.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "message": "AI configuration deleted" })))
}

async fn test_config(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(config_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let config = find_config(&state.db, config_id).await?;

    // An unparseable stored provider is recorded as a failed test.
    let outcome = match settings_for(&config) {
        Ok(settings) => {
            if settings.kind.requires_api_key() && settings.api_key.is_none() {
                return Err(ApiError::bad_request("API key is required for this provider"));
            }
            match build_provider(&settings) {
                Ok(provider) => provider.test_connection().await,
                Err(e) => Err(e),
            }
            .map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };
    let last_error = outcome.err();
    let status = if last_error.is_none() {
        AiConfigStatus::Active
    } else {
        AiConfigStatus::Error
    };

    sqlx::query("UPDATE ai_configs SET status = ?, last_error = ?, last_tested_at = ? WHERE id = ?")
        .bind(status)
        .bind(&last_error)
        .bind(Utc::now())
        .bind(config.id)
        .execute(&state.db)
        .await?;

    match last_error {
        None => {
            info!(config_id, "AI configuration test succeeded");
            Ok(Json(json!({ "success": true, "message": "Connection successful" })))
        }
        Some(error) => {
            warn!(config_id, error = %error, "AI configuration test failed");
            Ok(Json(json!({ "success": false, "error": error })))
        }
    }
}
