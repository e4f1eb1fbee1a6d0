//! Inbound website form webhooks.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::analysis::{spawn_lead_analysis, spawn_opportunity_followup};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::handlers::contacts::insert_contact;
use crate::models::contact::ContactCreate;
use crate::models::{ContactStatus, UserRole};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contact", post(receive_contact))
        .route("/health", get(health))
}

/// Check `Authorization: Bearer <secret>` in constant time.
///
/// # Errors
///
/// 401 when the header is missing or not a bearer token, 403 on mismatch.
pub fn verify_bearer(headers: &HeaderMap, secret: &str) -> ApiResult<()> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization token required"))?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))?;

    if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Invalid token"))
    }
}

/// Website contact form. Field names follow the site's camelCase.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
    pub source: Option<String>,
    pub project_type: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub position: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    // Checklist form
    pub current_challenges: Option<String>,
    pub target_audience: Option<String>,
    pub business_goals: Option<String>,
    pub technical_requirements: Option<String>,
    pub budget_range: Option<String>,
    pub team_size: Option<String>,
    pub existing_tools: Option<String>,
    pub success_metrics: Option<String>,
    pub additional_notes: Option<String>,
}

impl WebhookContact {
    fn source(&self) -> &str {
        self.source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("website")
    }

    /// Checklist answers keyed by their form names, or `None` when empty.
    #[must_use]
    pub fn checklist(&self) -> Option<Value> {
        let fields = [
            ("currentChallenges", &self.current_challenges),
            ("targetAudience", &self.target_audience),
            ("businessGoals", &self.business_goals),
            ("technicalRequirements", &self.technical_requirements),
            ("teamSize", &self.team_size),
            ("existingTools", &self.existing_tools),
            ("successMetrics", &self.success_metrics),
            ("additionalNotes", &self.additional_notes),
        ];
        let map: Map<String, Value> = fields
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key.to_string(), Value::String(v.to_string())))
            })
            .collect();
        (!map.is_empty()).then_some(Value::Object(map))
    }

    #[must_use]
    pub fn notes(&self) -> String {
        let mut notes = format!("Origem: {}", self.source());
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            notes.push_str("\nMensagem: ");
            notes.push_str(message);
        }
        notes
    }

    fn into_contact(self) -> ContactCreate {
        ContactCreate {
            notes: Some(self.notes()),
            contact_metadata: self.checklist(),
            source: Some(self.source().to_string()),
            budget_range: self.budget.or(self.budget_range),
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            status: ContactStatus::Lead,
            project_type: self.project_type,
            timeline: self.timeline,
            website: self.website,
            linkedin: self.linkedin,
            position: self.position,
            industry: self.industry,
            company_size: self.company_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub contact_id: Option<i64>,
}

async fn receive_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookContact>,
) -> ApiResult<Json<WebhookResponse>> {
    if let Some(secret) = state.config.effective_webhook_secret() {
        verify_bearer(&headers, secret)?;
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    let owner = db::first_active_user_with_role(&state.db, UserRole::Admin)
        .await?
        .ok_or_else(|| ApiError::internal("No administrator available to own the contact"))?;

    if let Some(email) = payload.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if let Some(existing) = db::find_contact_by_email(&state.db, email).await? {
            info!(contact_id = existing.id, "Webhook contact already exists");
            return Ok(Json(WebhookResponse {
                success: true,
                message: "Contact already exists".to_string(),
                contact_id: Some(existing.id),
            }));
        }
    }

    let source = payload.source().to_string();
    let contact = insert_contact(&state.db, owner.id, payload.into_contact()).await?;
    info!(contact_id = contact.id, source = %source, owner_id = owner.id, "Webhook lead received");

    spawn_lead_analysis(state.clone(), contact.id);
    spawn_opportunity_followup(state, contact.id);

    Ok(Json(WebhookResponse {
        success: true,
        message: "Contact created. Analysis started; an opportunity will follow once it completes."
            .to_string(),
        contact_id: Some(contact.id),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "webhooks",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_verify_bearer() {
        assert!(verify_bearer(&headers_with("Bearer s3cret"), "s3cret").is_ok());

        let missing = verify_bearer(&HeaderMap::new(), "s3cret").unwrap_err();
        assert!(matches!(missing, ApiError::Unauthorized(_)));

        let malformed = verify_bearer(&headers_with("Token s3cret"), "s3cret").unwrap_err();
        assert!(matches!(malformed, ApiError::Unauthorized(_)));

        let wrong = verify_bearer(&headers_with("Bearer nope"), "s3cret").unwrap_err();
        assert!(matches!(wrong, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_checklist_and_notes() {
        let form: WebhookContact = serde_json::from_value(json!({
            "name": "Ana",
            "message": "Need a new portal",
            "currentChallenges": "Manual onboarding",
            "teamSize": "  ",
            "companySize": "50-100",
        }))
        .unwrap();

        assert_eq!(form.notes(), "Origem: website\nMensagem: Need a new portal");
        assert_eq!(
            form.checklist(),
            Some(json!({ "currentChallenges": "Manual onboarding" }))
        );
        assert_eq!(form.company_size.as_deref(), Some("50-100"));
    }

    #[test]
    fn test_empty_checklist_is_none() {
        let form = WebhookContact {
            name: "Bruno".to_string(),
            source: Some("landing_page".to_string()),
            ..WebhookContact::default()
        };
        assert!(form.checklist().is_none());
        assert_eq!(form.notes(), "Origem: landing_page");
    }
}
