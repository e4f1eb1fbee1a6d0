//! Activity CRUD.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::models::activity::{ActivityCreate, ActivityUpdate};
use crate::models::{Activity, ActivityStatus, User};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route(
            "/{activity_id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    status: Option<ActivityStatus>,
}

async fn list_activities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<Activity>>> {
    let rows = sqlx::query_as(
        "SELECT * FROM activities \
         WHERE (? IS NULL OR owner_id = ?) AND (? IS NULL OR status = ?) \
         ORDER BY due_date IS NULL, due_date, due_time IS NULL, due_time \
         LIMIT ? OFFSET ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(query.status)
    .bind(query.status)
    .bind(query.limit.unwrap_or(100).clamp(0, 1000))
    .bind(query.skip.unwrap_or(0).max(0))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn create_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ActivityCreate>,
) -> ApiResult<Json<Activity>> {
    if payload.subject.trim().is_empty() {
        return Err(ApiError::bad_request("Activity subject is required"));
    }
    Ok(Json(insert_activity(&state.db, user.id, &payload).await?))
}

async fn get_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(activity_id): Path<i64>,
) -> ApiResult<Json<Activity>> {
    visible_activity(&state.db, &user, activity_id)
        .await
        .map(Json)
}

async fn update_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(activity_id): Path<i64>,
    Json(payload): Json<ActivityUpdate>,
) -> ApiResult<Json<Activity>> {
    let mut activity = visible_activity(&state.db, &user, activity_id).await?;
    activity.apply(payload);

    let saved = sqlx::query_as(
        "UPDATE activities SET \
         type = ?, subject = ?, description = ?, due_date = ?, due_time = ?, status = ?, \
         contact_id = ?, opportunity_id = ?, project_id = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(activity.activity_type)
    .bind(&activity.subject)
    .bind(&activity.description)
    .bind(activity.due_date)
    .bind(activity.due_time)
    .bind(activity.status)
    .bind(activity.contact_id)
    .bind(activity.opportunity_id)
    .bind(activity.project_id)
    .bind(Utc::now())
    .bind(activity.id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(saved))
}

async fn delete_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(activity_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let activity = visible_activity(&state.db, &user, activity_id).await?;
    sqlx::query("DELETE FROM activities WHERE id = ?")
        .bind(activity.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "message": "Activity deleted" })))
}

async fn visible_activity(pool: &SqlitePool, user: &User, id: i64) -> ApiResult<Activity> {
    let activity: Option<Activity> = sqlx::query_as("SELECT * FROM activities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    activity
        .filter(|a| user.owner_scope().is_none_or(|owner| a.owner_id == owner))
        .ok_or_else(|| ApiError::not_found("Activity not found"))
}

pub(crate) async fn insert_activity(
    pool: &SqlitePool,
    owner_id: i64,
    new: &ActivityCreate,
) -> Result<Activity, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        "INSERT INTO activities \
         (type, subject, description, due_date, due_time, status, contact_id, opportunity_id, \
          project_id, owner_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.activity_type)
    .bind(new.subject.trim())
    .bind(&new.description)
    .bind(new.due_date)
    .bind(new.due_time)
    .bind(new.status)
    .bind(new.contact_id)
    .bind(new.opportunity_id)
    .bind(new.project_id)
    .bind(owner_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}
