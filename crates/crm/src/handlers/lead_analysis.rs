//! Lead analysis trigger and results.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::analysis::{find_analysis, spawn_lead_analysis};
use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Contact, LeadAnalysis, Pagination, User};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_analyses))
        .route("/analyze/{contact_id}", post(trigger_analysis))
        .route("/{contact_id}", get(get_analysis))
}

/// Admins and the contact's owner only.
async fn owned_contact(state: &AppState, user: &User, contact_id: i64) -> ApiResult<Contact> {
    let contact = db::find_contact(&state.db, contact_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact not found"))?;
    if !user.is_admin() && contact.owner_id != user.id {
        return Err(ApiError::forbidden(
            "You do not have permission to access this lead's analysis",
        ));
    }
    Ok(contact)
}

async fn trigger_analysis(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    owned_contact(&state, &user, contact_id).await?;
    spawn_lead_analysis(state.clone(), contact_id);
    Ok(Json(json!({
        "message": "Analysis started in background",
        "contact_id": contact_id,
    })))
}

async fn get_analysis(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<i64>,
) -> ApiResult<Json<LeadAnalysis>> {
    owned_contact(&state, &user, contact_id).await?;
    find_analysis(&state.db, contact_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Analysis not found. Use POST to start one."))
}

async fn list_analyses(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<LeadAnalysis>>> {
    let rows = sqlx::query_as(
        "SELECT la.* FROM lead_analyses la JOIN contacts c ON c.id = la.contact_id \
         WHERE (? IS NULL OR c.owner_id = ?) \
         ORDER BY la.created_at DESC, la.id DESC LIMIT ? OFFSET ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(page.limit_or(50))
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}
