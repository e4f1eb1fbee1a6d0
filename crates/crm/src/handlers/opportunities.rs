//! Opportunity CRUD.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::opportunity::{valid_probability, OpportunityCreate, OpportunityUpdate};
use crate::models::{Opportunity, Pagination, User};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_opportunities).post(create_opportunity))
        .route(
            "/{opportunity_id}",
            get(get_opportunity)
                .put(update_opportunity)
                .delete(delete_opportunity),
        )
}

async fn list_opportunities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Opportunity>>> {
    let rows = sqlx::query_as(
        "SELECT * FROM opportunities WHERE (? IS NULL OR owner_id = ?) \
         ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(page.limit_or(100))
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn create_opportunity(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<OpportunityCreate>,
) -> ApiResult<Json<Opportunity>> {
    if !valid_probability(payload.probability) {
        return Err(ApiError::bad_request("Probability must be between 0 and 100"));
    }
    db::visible_contact(&state.db, &user, payload.contact_id).await?;

    let opportunity = insert_opportunity(&state.db, user.id, &payload).await?;
    info!(opportunity_id = opportunity.id, "Opportunity created");
    Ok(Json(opportunity))
}

async fn get_opportunity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(opportunity_id): Path<i64>,
) -> ApiResult<Json<Opportunity>> {
    visible_opportunity(&state.db, &user, opportunity_id)
        .await
        .map(Json)
}

async fn update_opportunity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(opportunity_id): Path<i64>,
    Json(payload): Json<OpportunityUpdate>,
) -> ApiResult<Json<Opportunity>> {
    if payload.probability.is_some_and(|p| !valid_probability(p)) {
        return Err(ApiError::bad_request("Probability must be between 0 and 100"));
    }
    let mut opportunity = visible_opportunity(&state.db, &user, opportunity_id).await?;
    if let Some(contact_id) = payload.contact_id {
        db::visible_contact(&state.db, &user, contact_id).await?;
    }
    opportunity.apply(payload);
    Ok(Json(save_opportunity(&state.db, &opportunity).await?))
}

async fn delete_opportunity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(opportunity_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let opportunity = visible_opportunity(&state.db, &user, opportunity_id).await?;
    sqlx::query("DELETE FROM opportunities WHERE id = ?")
        .bind(opportunity.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "message": "Opportunity deleted" })))
}

pub(crate) async fn find_opportunity(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Opportunity>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM opportunities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Opportunity visible to the caller, 404 otherwise.
pub(crate) async fn visible_opportunity(
    pool: &SqlitePool,
    user: &User,
    id: i64,
) -> ApiResult<Opportunity> {
    find_opportunity(pool, id)
        .await?
        .filter(|o| user.owner_scope().is_none_or(|owner| o.owner_id == owner))
        .ok_or_else(|| ApiError::not_found("Opportunity not found"))
}

pub(crate) async fn insert_opportunity(
    pool: &SqlitePool,
    owner_id: i64,
    new: &OpportunityCreate,
) -> Result<Opportunity, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        "INSERT INTO opportunities \
         (name, contact_id, value, stage, probability, expected_close_date, notes, owner_id, \
          created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.name.trim())
    .bind(new.contact_id)
    .bind(new.value)
    .bind(new.stage)
    .bind(new.probability)
    .bind(new.expected_close_date)
    .bind(&new.notes)
    .bind(owner_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn save_opportunity(
    pool: &SqlitePool,
    opportunity: &Opportunity,
) -> Result<Opportunity, sqlx::Error> {
    sqlx::query_as(
        "UPDATE opportunities SET \
         name = ?, contact_id = ?, value = ?, stage = ?, probability = ?, \
         expected_close_date = ?, notes = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(&opportunity.name)
    .bind(opportunity.contact_id)
    .bind(opportunity.value)
    .bind(opportunity.stage)
    .bind(opportunity.probability)
    .bind(opportunity.expected_close_date)
    .bind(&opportunity.notes)
    .bind(Utc::now())
    .bind(opportunity.id)
    .fetch_one(pool)
    .await
}
