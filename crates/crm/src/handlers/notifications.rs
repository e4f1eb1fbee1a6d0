//! Per-user notification inbox.

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{require_admin, CurrentUser};
use crate::db::{self, NewNotification};
use crate::error::{ApiError, ApiResult};
use crate::models::notification::NotificationCreate;
use crate::models::Notification;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/mark-all-read", put(mark_all_read))
        .route("/{notification_id}/read", put(mark_read))
}

#[derive(Debug, Deserialize)]
struct InboxQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    #[serde(default)]
    unread_only: bool,
}

async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let rows = sqlx::query_as(
        "SELECT * FROM notifications WHERE recipient_id = ? AND (? = 0 OR is_read = 0) \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(user.id)
    .bind(query.unread_only)
    .bind(query.limit.unwrap_or(50).clamp(0, 1000))
    .bind(query.skip.unwrap_or(0).max(0))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(notification_id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    sqlx::query_as(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?) \
         WHERE id = ? AND recipient_id = ? RETURNING *",
    )
    .bind(Utc::now())
    .bind(notification_id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Notification not found"))
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = ? WHERE recipient_id = ? AND is_read = 0",
    )
    .bind(Utc::now())
    .bind(user.id)
    .execute(&state.db)
    .await?;
    Ok(Json(json!({
        "message": "All notifications marked as read",
        "count": result.rows_affected(),
    })))
}

async fn create_notification(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<NotificationCreate>,
) -> ApiResult<Json<Notification>> {
    require_admin(&user)?;
    if db::find_user(&state.db, payload.recipient_id).await?.is_none() {
        return Err(ApiError::not_found("Recipient not found"));
    }

    let related_entity = payload
        .related_entity_type
        .as_deref()
        .zip(payload.related_entity_id);
    let notification = db::insert_notification(
        &state.db,
        NewNotification {
            recipient_id: payload.recipient_id,
            title: &payload.title,
            message: &payload.message,
            notification_type: payload.notification_type,
            related_entity,
        },
    )
    .await?;
    Ok(Json(notification))
}
