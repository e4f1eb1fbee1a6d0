//! Token-protected intake for the public website.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::handlers::contacts::{insert_contact, save_contact};
use crate::models::contact::ContactCreate;
use crate::models::{ContactStatus, ProjectStatus, ProjectType, UserRole};
use crate::server::AppState;

pub const API_TOKEN_HEADER: &str = "x-api-token";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/web-to-lead", post(web_to_lead))
        .route("/health", get(health))
}

fn verify_api_token(headers: &HeaderMap, expected: &str) -> ApiResult<()> {
    let token = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing API token"))?;
    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid API token"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebToLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    pub project_type: Option<String>,
}

fn default_source() -> String {
    "website".to_string()
}

#[derive(Debug, Serialize)]
pub struct WebToLeadResponse {
    pub success: bool,
    pub contact_id: Option<i64>,
    pub message: String,
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Set `slot` from a non-blank `value` when the slot is unset or blank.
fn fill_blank(slot: &mut Option<String>, value: Option<&str>) {
    if slot.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        return;
    }
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value.to_string());
    }
}

async fn web_to_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(lead): Json<WebToLeadRequest>,
) -> ApiResult<Json<WebToLeadResponse>> {
    verify_api_token(&headers, &state.config.external_api_token)?;
    if lead.name.trim().is_empty() || !lead.email.contains('@') {
        return Err(ApiError::bad_request("Name and a valid email are required"));
    }
    let now = Utc::now();
    let message = lead.message.as_deref().filter(|m| !m.trim().is_empty());

    if let Some(mut existing) = db::find_contact_by_email(&state.db, &lead.email).await? {
        fill_blank(&mut existing.phone, lead.phone.as_deref());
        fill_blank(&mut existing.company, lead.company.as_deref());
        if let Some(message) = message {
            let mut notes = existing.notes.take().unwrap_or_default();
            notes.push_str(&format!(
                "\n\nNovo lead de {} em {}:\n{message}",
                lead.source,
                stamp(now)
            ));
            existing.notes = Some(notes);
        }
        let contact = save_contact(&state.db, &existing).await?;
        debug!(contact_id = contact.id, "Web lead merged into existing contact");
        return Ok(Json(WebToLeadResponse {
            success: true,
            contact_id: Some(contact.id),
            message: "Lead updated (contact already existed)".to_string(),
        }));
    }

    let seller = db::first_active_user_with_role(&state.db, UserRole::Seller)
        .await?
        .ok_or_else(|| {
            ApiError::internal("No seller available. Configure at least one seller.")
        })?;

    let mut notes = format!("Lead captado de {} em {}", lead.source, stamp(now));
    if let Some(message) = message {
        notes.push_str(&format!("\n\nMensagem: {message}"));
    }
    let contact = insert_contact(
        &state.db,
        seller.id,
        ContactCreate {
            name: lead.name.clone(),
            email: Some(lead.email.trim().to_string()),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            status: ContactStatus::Lead,
            notes: Some(notes),
            source: Some(lead.source.clone()),
            ..ContactCreate::default()
        },
    )
    .await?;

    let mut reply = format!("Lead created and assigned to {}", seller.name);
    if let Some((raw, project_type)) = lead
        .project_type
        .as_deref()
        .and_then(|raw| ProjectType::parse(raw).map(|t| (raw, t)))
    {
        let (project_id,): (i64,) = sqlx::query_as(
            "INSERT INTO projects \
             (name, description, contact_id, owner_id, project_type, status, \
              technical_requirements, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(format!("Projeto {} - {raw}", lead.name))
        .bind(
            message
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("Projeto de {raw} para {}", lead.name)),
        )
        .bind(contact.id)
        .bind(seller.id)
        .bind(project_type)
        .bind(ProjectStatus::Lead)
        .bind(message)
        .bind(now)
        .bind(now)
        .fetch_one(&state.db)
        .await?;
        reply.push_str(&format!(". Project created (ID: {project_id})"));
    }

    info!(contact_id = contact.id, seller_id = seller.id, source = %lead.source, "Web lead created");
    Ok(Json(WebToLeadResponse {
        success: true,
        contact_id: Some(contact.id),
        message: reply,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "external-api",
        "endpoints": ["/api/external/web-to-lead"],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_verify_api_token() {
        let mut headers = HeaderMap::new();
        assert!(verify_api_token(&headers, "tok").is_err());

        headers.insert(API_TOKEN_HEADER, HeaderValue::from_static("nope"));
        assert!(matches!(
            verify_api_token(&headers, "tok"),
            Err(ApiError::Unauthorized(_))
        ));

        headers.insert(API_TOKEN_HEADER, HeaderValue::from_static("tok"));
        assert!(verify_api_token(&headers, "tok").is_ok());
    }

    #[test]
    fn test_fill_blank() {
        let mut phone = Some(String::new());
        fill_blank(&mut phone, Some("+55 11 4000-0000"));
        assert_eq!(phone.as_deref(), Some("+55 11 4000-0000"));

        fill_blank(&mut phone, Some("+55 21 5000-0000"));
        assert_eq!(phone.as_deref(), Some("+55 11 4000-0000"));

        let mut company = None;
        fill_blank(&mut company, Some("  "));
        assert_eq!(company, None);
        fill_blank(&mut company, Some("Initech"));
        assert_eq!(company.as_deref(), Some("Initech"));
    }

    #[test]
    fn test_source_defaults_to_website() {
        let lead: WebToLeadRequest =
            serde_json::from_value(json!({ "name": "Ana", "email": "ana@example.com" })).unwrap();
        assert_eq!(lead.source, "website");
    }
}
