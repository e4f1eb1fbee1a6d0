//! Sales goals.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::goal::{GoalCreate, GoalUpdate, GoalView};
use crate::models::{Goal, GoalStatus, GoalType};
use crate::server::AppState;

const VIEW_QUERY: &str = "SELECT g.*, a.name AS assignee_name, c.name AS creator_name \
     FROM goals g \
     LEFT JOIN users a ON a.id = g.assignee_id \
     LEFT JOIN users c ON c.id = g.creator_id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_goals).post(create_goal))
        .route(
            "/{goal_id}",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
        .route("/{goal_id}/progress", post(update_progress))
}

async fn find_goal(pool: &SqlitePool, id: i64) -> ApiResult<Goal> {
    sqlx::query_as("SELECT * FROM goals WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal not found"))
}

async fn goal_view(pool: &SqlitePool, id: i64) -> ApiResult<GoalView> {
    let sql = format!("{VIEW_QUERY} WHERE g.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal not found"))
}

fn access_denied() -> ApiError {
    ApiError::forbidden("Access denied")
}

async fn create_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut payload): Json<GoalCreate>,
) -> ApiResult<(StatusCode, Json<GoalView>)> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::bad_request("Goal title is required"));
    }
    if payload.target_value <= 0.0 {
        return Err(ApiError::bad_request("Target value must be greater than zero"));
    }
    if payload.end_date < payload.start_date {
        return Err(ApiError::bad_request("End date must not precede start date"));
    }

    if !user.is_admin() {
        if payload.assignee_id.is_some_and(|id| id != user.id) {
            return Err(ApiError::forbidden(
                "Not allowed to create goals for other users",
            ));
        }
        payload.assignee_id = Some(user.id);
    }
    if let Some(assignee_id) = payload.assignee_id {
        if db::find_user(&state.db, assignee_id).await?.is_none() {
            return Err(ApiError::not_found("Assignee not found"));
        }
    }

    let now = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO goals \
         (title, description, goal_type, category, period, target_value, current_value, unit, \
          creator_id, assignee_id, start_date, end_date, status, progress_percentage, \
          reward_description, penalty_description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?) RETURNING id",
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.goal_type)
    .bind(payload.category)
    .bind(payload.period)
    .bind(payload.target_value)
    .bind(&payload.unit)
    .bind(user.id)
    .bind(payload.assignee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(GoalStatus::Active)
    .bind(&payload.reward_description)
    .bind(&payload.penalty_description)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(goal_id = id, creator_id = user.id, "Goal created");
    Ok((StatusCode::CREATED, Json(goal_view(&state.db, id).await?)))
}

#[derive(Debug, Deserialize)]
struct GoalQuery {
    goal_type: Option<GoalType>,
    status: Option<GoalStatus>,
    #[serde(alias = "assignee_id")]
    assigned_to_id: Option<i64>,
}

async fn list_goals(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<GoalQuery>,
) -> ApiResult<Json<Vec<GoalView>>> {
    // Non-admins: goals assigned to them, plus team/department goals they created.
    let viewer = (!user.is_admin()).then_some(user.id);
    let assignee = if user.is_admin() {
        query.assigned_to_id
    } else {
        None
    };

    let sql = format!(
        "{VIEW_QUERY} WHERE (? IS NULL OR g.goal_type = ?) \
         AND (? IS NULL OR g.status = ?) \
         AND (? IS NULL OR g.assignee_id = ?) \
         AND (? IS NULL OR g.assignee_id = ? \
              OR (g.goal_type IN ('team', 'department') AND g.creator_id = ?)) \
         ORDER BY g.created_at DESC, g.id DESC"
    );
    let rows = sqlx::query_as(&sql)
        .bind(query.goal_type)
        .bind(query.goal_type)
        .bind(query.status)
        .bind(query.status)
        .bind(assignee)
        .bind(assignee)
        .bind(viewer)
        .bind(viewer)
        .bind(viewer)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

async fn get_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<Json<GoalView>> {
    let view = goal_view(&state.db, goal_id).await?;
    if !user.is_admin() && view.goal.assignee_id != Some(user.id) {
        return Err(access_denied());
    }
    Ok(Json(view))
}

async fn save_goal(pool: &SqlitePool, goal: &Goal) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE goals SET \
         title = ?, description = ?, goal_type = ?, category = ?, period = ?, target_value = ?, \
         current_value = ?, unit = ?, assignee_id = ?, start_date = ?, end_date = ?, \
         completed_at = ?, status = ?, progress_percentage = ?, reward_description = ?, \
         penalty_description = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&goal.title)
    .bind(&goal.description)
    .bind(goal.goal_type)
    .bind(goal.category)
    .bind(goal.period)
    .bind(goal.target_value)
    .bind(goal.current_value)
    .bind(&goal.unit)
    .bind(goal.assignee_id)
    .bind(goal.start_date)
    .bind(goal.end_date)
    .bind(goal.completed_at)
    .bind(goal.status)
    .bind(goal.progress_percentage)
    .bind(&goal.reward_description)
    .bind(&goal.penalty_description)
    .bind(Utc::now())
    .bind(goal.id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(goal_id): Path<i64>,
    Json(payload): Json<GoalUpdate>,
) -> ApiResult<Json<GoalView>> {
    let mut goal = find_goal(&state.db, goal_id).await?;
    if !user.is_admin() && goal.creator_id != user.id {
        return Err(access_denied());
    }
    if payload.target_value.is_some_and(|t| t <= 0.0) {
        return Err(ApiError::bad_request("Target value must be greater than zero"));
    }

    goal.apply(payload, Utc::now());
    save_goal(&state.db, &goal).await?;
    Ok(Json(goal_view(&state.db, goal_id).await?))
}

async fn delete_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let goal = find_goal(&state.db, goal_id).await?;
    if !user.is_admin() && goal.creator_id != user.id {
        return Err(access_denied());
    }
    sqlx::query("DELETE FROM goals WHERE id = ?")
        .bind(goal.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "message": "Goal deleted" })))
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    current_value: f64,
}

async fn update_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(goal_id): Path<i64>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Json<GoalView>> {
    let mut goal = find_goal(&state.db, goal_id).await?;
    if !user.is_admin() && goal.assignee_id != Some(user.id) {
        return Err(access_denied());
    }

    goal.record_progress(query.current_value, Utc::now());
    save_goal(&state.db, &goal).await?;
    if goal.status == GoalStatus::Completed {
        info!(goal_id, "Goal completed");
    }
    Ok(Json(goal_view(&state.db, goal_id).await?))
}
