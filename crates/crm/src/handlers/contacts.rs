//! Contact CRUD.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use tracing::info;

use crate::analysis::spawn_lead_analysis;
use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::contact::{ContactCreate, ContactUpdate};
use crate::models::{Contact, ContactStatus, Pagination};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route(
            "/{contact_id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

async fn list_contacts(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts = sqlx::query_as(
        "SELECT * FROM contacts WHERE (? IS NULL OR owner_id = ?) ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(page.limit_or(100))
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(contacts))
}

async fn create_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ContactCreate>,
) -> ApiResult<Json<Contact>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Contact name is required"));
    }

    let contact = insert_contact(&state.db, user.id, payload).await?;
    info!(contact_id = contact.id, owner_id = user.id, "Contact created");

    if contact.status == ContactStatus::Lead {
        spawn_lead_analysis(state.clone(), contact.id);
    }
    Ok(Json(contact))
}

async fn get_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<i64>,
) -> ApiResult<Json<Contact>> {
    db::visible_contact(&state.db, &user, contact_id)
        .await
        .map(Json)
}

async fn update_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<i64>,
    Json(payload): Json<ContactUpdate>,
) -> ApiResult<Json<Contact>> {
    let mut contact = db::visible_contact(&state.db, &user, contact_id).await?;
    contact.apply(payload);
    save_contact(&state.db, &contact).await.map(Json).map_err(Into::into)
}

async fn delete_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(contact_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let contact = db::visible_contact(&state.db, &user, contact_id).await?;
    sqlx::query("DELETE FROM contacts WHERE id = ?")
        .bind(contact.id)
        .execute(&state.db)
        .await?;
    info!(contact_id, "Contact deleted");
    Ok(Json(json!({ "message": "Contact deleted" })))
}

/// Insert a contact owned by `owner_id`.
pub(crate) async fn insert_contact(
    pool: &SqlitePool,
    owner_id: i64,
    new: ContactCreate,
) -> Result<Contact, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        "INSERT INTO contacts \
         (name, email, phone, company, status, notes, project_type, budget_range, timeline, \
          website, linkedin, position, industry, company_size, source, contact_metadata, \
          owner_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.name.trim())
    .bind(new.email)
    .bind(new.phone)
    .bind(new.company)
    .bind(new.status)
    .bind(new.notes)
    .bind(new.project_type)
    .bind(new.budget_range)
    .bind(new.timeline)
    .bind(new.website)
    .bind(new.linkedin)
    .bind(new.position)
    .bind(new.industry)
    .bind(new.company_size)
    .bind(new.source)
    .bind(new.contact_metadata.map(SqlJson))
    .bind(owner_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Persist every editable column of `contact`.
pub(crate) async fn save_contact(
    pool: &SqlitePool,
    contact: &Contact,
) -> Result<Contact, sqlx::Error> {
    sqlx::query_as(
        "UPDATE contacts SET \
         name = ?, email = ?, phone = ?, company = ?, status = ?, notes = ?, project_type = ?, \
         budget_range = ?, timeline = ?, website = ?, linkedin = ?, position = ?, industry = ?, \
         company_size = ?, source = ?, contact_metadata = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(&contact.name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.company)
    .bind(contact.status)
    .bind(&contact.notes)
    .bind(&contact.project_type)
    .bind(&contact.budget_range)
    .bind(&contact.timeline)
    .bind(&contact.website)
    .bind(&contact.linkedin)
    .bind(&contact.position)
    .bind(&contact.industry)
    .bind(&contact.company_size)
    .bind(&contact.source)
    .bind(&contact.contact_metadata)
    .bind(Utc::now())
    .bind(contact.id)
    .fetch_one(pool)
    .await
}
