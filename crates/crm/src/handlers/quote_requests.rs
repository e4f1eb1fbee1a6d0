//! Quote requests: sellers ask, planning answers (by hand or with the LLM).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::ai_provider::resolve_provider;
use crate::analysis::parser::strip_code_fence;
use crate::auth::CurrentUser;
use crate::db::{self, NewNotification};
use crate::error::{ApiError, ApiResult};
use crate::models::quote_request::{
    split_technologies, QuoteRequestCreate, QuoteRequestUpdate, QuoteRequestView,
};
use crate::models::{NotificationType, Project, QuoteRequest, QuoteStatus, User, UserRole};
use crate::server::AppState;

const QUOTE_GENERATION_MAX_TOKENS: u32 = 2500;

const VIEW_QUERY: &str = "SELECT q.*, p.name AS project_name, s.name AS seller_name, \
     po.name AS planning_owner_name \
     FROM quote_requests q \
     LEFT JOIN projects p ON p.id = q.project_id \
     LEFT JOIN users s ON s.id = q.seller_id \
     LEFT JOIN users po ON po.id = q.planning_owner_id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/{request_id}", put(update_request))
        .route("/{request_id}/generate-with-ai", post(generate_with_ai))
        .route("/{request_id}/complete", put(complete_request))
}

fn require_planning(user: &User) -> ApiResult<()> {
    if matches!(user.role, UserRole::Planning | UserRole::Admin) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the planning team can work on quote requests",
        ))
    }
}

async fn find_request(pool: &SqlitePool, id: i64) -> ApiResult<QuoteRequest> {
    sqlx::query_as("SELECT * FROM quote_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote request not found"))
}

async fn request_view(pool: &SqlitePool, id: i64) -> ApiResult<QuoteRequestView> {
    let sql = format!("{VIEW_QUERY} WHERE q.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote request not found"))
}

async fn find_project(pool: &SqlitePool, id: i64) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn create_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<QuoteRequestCreate>,
) -> ApiResult<(StatusCode, Json<QuoteRequestView>)> {
    if !matches!(user.role, UserRole::Seller | UserRole::Admin) {
        return Err(ApiError::forbidden("Only sellers can request quotes"));
    }
    let project = find_project(&state.db, payload.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if user.is_seller() && project.owner_id != user.id {
        return Err(ApiError::forbidden("You do not own this project"));
    }

    let open: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM quote_requests WHERE project_id = ? AND status IN (?, ?) LIMIT 1",
    )
    .bind(project.id)
    .bind(QuoteStatus::Pending)
    .bind(QuoteStatus::InProgress)
    .fetch_optional(&state.db)
    .await?;
    if open.is_some() {
        return Err(ApiError::bad_request(
            "A pending quote request already exists for this project",
        ));
    }

    let now = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO quote_requests \
         (project_id, seller_id, status, seller_notes, ai_generated, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?) RETURNING id",
    )
    .bind(project.id)
    .bind(user.id)
    .bind(QuoteStatus::Pending)
    .bind(&payload.seller_notes)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(quote_request_id = id, project_id = project.id, "Quote requested");
    Ok((StatusCode::CREATED, Json(request_view(&state.db, id).await?)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<QuoteStatus>,
}

async fn list_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<QuoteRequestView>>> {
    let seller = user.is_seller().then_some(user.id);
    let planner = (user.role == UserRole::Planning).then_some(user.id);

    let sql = format!(
        "{VIEW_QUERY} WHERE (? IS NULL OR q.seller_id = ?) \
         AND (? IS NULL OR q.planning_owner_id = ? OR q.planning_owner_id IS NULL) \
         AND (? IS NULL OR q.status = ?) \
         ORDER BY q.created_at DESC, q.id DESC"
    );
    let rows = sqlx::query_as(&sql)
        .bind(seller)
        .bind(seller)
        .bind(planner)
        .bind(planner)
        .bind(query.status)
        .bind(query.status)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// Copy the planning team's answer onto the request.
fn apply_update(quote: &mut QuoteRequest, update: QuoteRequestUpdate) {
    if let Some(raw) = update.technologies {
        quote.technologies = Some(SqlJson(split_technologies(&raw)));
    }
    if let Some(stages) = update.stages {
        quote.stages = Some(SqlJson(stages));
    }
    if update.estimated_deadline.is_some() {
        quote.estimated_deadline = update.estimated_deadline;
    }
    if update.estimated_hours.is_some() {
        quote.estimated_hours = update.estimated_hours;
    }
    if update.technical_details.is_some() {
        quote.technical_specs = update.technical_details;
    }
    if update.estimated_value.is_some() {
        quote.estimated_value = update.estimated_value;
    }
    if let Some(breakdown) = update.breakdown {
        quote.breakdown = Some(SqlJson(breakdown));
    }
}

async fn save_request(pool: &SqlitePool, quote: &QuoteRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quote_requests SET \
         planning_owner_id = ?, status = ?, technologies = ?, stages = ?, estimated_deadline = ?, \
         estimated_hours = ?, technical_specs = ?, ai_generated = ?, estimated_value = ?, \
         breakdown = ?, seller_notified_at = ?, completed_at = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(quote.planning_owner_id)
    .bind(quote.status)
    .bind(&quote.technologies)
    .bind(&quote.stages)
    .bind(quote.estimated_deadline)
    .bind(quote.estimated_hours)
    .bind(&quote.technical_specs)
    .bind(quote.ai_generated)
    .bind(&quote.estimated_value)
    .bind(&quote.breakdown)
    .bind(quote.seller_notified_at)
    .bind(quote.completed_at)
    .bind(Utc::now())
    .bind(quote.id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(payload): Json<QuoteRequestUpdate>,
) -> ApiResult<Json<QuoteRequestView>> {
    require_planning(&user)?;
    let mut quote = find_request(&state.db, request_id).await?;

    apply_update(&mut quote, payload);
    quote.planning_owner_id = Some(user.id);
    quote.status = QuoteStatus::InProgress;
    save_request(&state.db, &quote).await?;
    Ok(Json(request_view(&state.db, request_id).await?))
}

/// Structured answer requested from the model.
#[derive(Debug, Default, Deserialize)]
pub struct GeneratedQuote {
    pub technical_specs: Option<String>,
    pub technologies: Option<Value>,
    pub stages: Option<Value>,
    pub estimated_hours: Option<Value>,
    pub estimated_value: Option<String>,
    pub breakdown: Option<Value>,
}

impl GeneratedQuote {
    /// Technologies given either as a comma-separated string or a list.
    #[must_use]
    pub fn technology_list(&self) -> Vec<String> {
        match &self.technologies {
            Some(Value::String(raw)) => split_technologies(raw),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn hours(&self) -> Option<i64> {
        match self.estimated_hours.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Parse the model's reply as JSON, tolerating a Markdown code fence.
#[must_use]
pub fn parse_generated_quote(reply: &str) -> Option<GeneratedQuote> {
    serde_json::from_str(strip_code_fence(reply).trim()).ok()
}

fn quote_prompt(project: &Project, quote: &QuoteRequest) -> String {
    format!(
        "Você é um especialista em planejamento de projetos de uma empresa de desenvolvimento de software.
Analise este projeto e gere um orçamento técnico detalhado:

NOME DO PROJETO: {}
DESCRIÇÃO: {}
TIPO: {}
VALOR ESTIMADO: {}
REQUISITOS TÉCNICOS: {}
NOTAS DO VENDEDOR: {}

GERE UM ORÇAMENTO TÉCNICO COMPLETO COM:
1. Especificações técnicas: arquitetura, tecnologias, infraestrutura, segurança e performance
2. Etapas do projeto com duração estimada em dias (Planejamento, Desenvolvimento, Testes, Deploy)
3. Prazo total e marcos importantes
4. Total de horas de desenvolvimento

Seja realista e forneça estimativas conservadoras.

RESPONDA APENAS COM JSON no formato:
{{
    \"technical_specs\": \"Especificações técnicas detalhadas...\",
    \"technologies\": \"React, Node.js, PostgreSQL, Docker\",
    \"stages\": \"Etapa 1: Planejamento e Arquitetura - 5 dias, Etapa 2: Desenvolvimento - 20 dias\",
    \"estimated_hours\": 320,
    \"estimated_value\": \"R$ 45.000,00 - R$ 55.000,00\"
}}",
        project.name,
        project.description.as_deref().unwrap_or("Não informado"),
        serde_json::to_value(project.project_type)
            .ok()
            .and_then(|v| v.as_str().map(ToString::to_string))
            .unwrap_or_default(),
        project.estimated_value.as_deref().unwrap_or("A definir"),
        project
            .technical_requirements
            .as_deref()
            .unwrap_or("Não especificado"),
        quote.seller_notes.as_deref().unwrap_or("Nenhuma nota adicional"),
    )
}

async fn generate_with_ai(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> ApiResult<Json<QuoteRequestView>> {
    require_planning(&user)?;
    let mut quote = find_request(&state.db, request_id).await?;
    let project = find_project(&state.db, quote.project_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Project not found"))?;

    let resolved = resolve_provider(&state).await?;
    let reply = resolved
        .provider
        .complete(&quote_prompt(&project, &quote), QUOTE_GENERATION_MAX_TOKENS)
        .await?;

    match parse_generated_quote(&reply) {
        Some(generated) => {
            quote.technologies = Some(SqlJson(generated.technology_list()));
            quote.estimated_hours = generated.hours();
            quote.technical_specs = generated.technical_specs;
            quote.stages = generated.stages.map(SqlJson);
            quote.estimated_value = generated
                .estimated_value
                .or_else(|| project.estimated_value.clone());
            if let Some(breakdown) = generated.breakdown {
                quote.breakdown = Some(SqlJson(breakdown));
            }
        }
        None => {
            warn!(quote_request_id = request_id, "Model reply was not JSON, storing as text");
            quote.technical_specs = Some(reply);
            quote.technologies = Some(SqlJson(Vec::new()));
            quote.estimated_value = project.estimated_value.clone();
        }
    }
    quote.ai_generated = true;
    quote.status = QuoteStatus::InProgress;
    quote.planning_owner_id = Some(user.id);
    save_request(&state.db, &quote).await?;

    info!(quote_request_id = request_id, provider = %resolved.label(), "Quote generated");
    Ok(Json(request_view(&state.db, request_id).await?))
}

async fn complete_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
    Json(payload): Json<QuoteRequestUpdate>,
) -> ApiResult<Json<Value>> {
    require_planning(&user)?;
    let mut quote = find_request(&state.db, request_id).await?;

    apply_update(&mut quote, payload);
    let now = Utc::now();
    quote.status = QuoteStatus::Completed;
    quote.completed_at = Some(now);
    quote.seller_notified_at = Some(now);
    quote.planning_owner_id = Some(user.id);
    save_request(&state.db, &quote).await?;

    if let Some(project) = find_project(&state.db, quote.project_id).await? {
        let tech_stack = quote
            .technologies
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.join(", "));
        sqlx::query(
            "UPDATE projects SET \
             approved_value = COALESCE(?, approved_value), \
             technical_requirements = COALESCE(?, technical_requirements), \
             tech_stack = COALESCE(?, tech_stack), updated_at = ? \
             WHERE id = ?",
        )
        .bind(quote.estimated_value.as_deref().filter(|v| !v.is_empty()))
        .bind(quote.technical_specs.as_deref().filter(|v| !v.is_empty()))
        .bind(tech_stack)
        .bind(now)
        .bind(project.id)
        .execute(&state.db)
        .await?;

        let message = format!("The quote for project \"{}\" is ready", project.name);
        db::insert_notification(
            &state.db,
            NewNotification {
                recipient_id: quote.seller_id,
                title: "Quote completed",
                message: &message,
                notification_type: NotificationType::Success,
                related_entity: Some(("quote_request", quote.id)),
            },
        )
        .await?;
    }

    info!(quote_request_id = request_id, seller_id = quote.seller_id, "Quote completed");
    Ok(Json(json!({
        "message": "Quote completed and seller notified",
        "status": QuoteStatus::Completed,
        "quote_request": request_view(&state.db, request_id).await?,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let reply = "```json\n{\"technical_specs\": \"SPA + API\", \"technologies\": \"React, Rust\", \
                     \"estimated_hours\": 320, \"estimated_value\": \"R$ 45.000,00\"}\n```";
        let quote = parse_generated_quote(reply).unwrap();
        assert_eq!(quote.technical_specs.as_deref(), Some("SPA + API"));
        assert_eq!(quote.technology_list(), vec!["React", "Rust"]);
        assert_eq!(quote.hours(), Some(320));
    }

    #[test]
    fn test_technologies_as_list_and_hours_as_text() {
        let reply = r#"{"technologies": ["Go", " ", "Redis"], "estimated_hours": "120"}"#;
        let quote = parse_generated_quote(reply).unwrap();
        assert_eq!(quote.technology_list(), vec!["Go", "Redis"]);
        assert_eq!(quote.hours(), Some(120));
    }

    #[test]
    fn test_plain_text_is_not_a_quote() {
        assert!(parse_generated_quote("O projeto deve levar 3 meses.").is_none());
    }
}
