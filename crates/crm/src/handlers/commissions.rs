//! Commission structures, calculations and payout records.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::{require_admin, CurrentUser};
use crate::commission::{self, CommissionBreakdown};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::handlers::opportunities::find_opportunity;
use crate::models::commission::{CommissionStructureCreate, CommissionView};
use crate::models::{Commission, CommissionStatus, CommissionStructure};
use crate::server::AppState;

const VIEW_QUERY: &str = "SELECT cm.*, u.name AS seller_name FROM commissions cm \
     LEFT JOIN users u ON u.id = cm.seller_id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_commissions))
        .route("/structures", get(list_structures).post(create_structure))
        .route("/calculate", post(calculate))
        .route("/calculate/{opportunity_id}", post(calculate_for_opportunity))
        .route("/seller/{seller_id}", get(seller_commissions))
        .route("/record", post(record_commission))
        .route("/{commission_id}/status", put(update_status))
}

async fn list_structures(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<CommissionStructure>>> {
    require_admin(&user)?;
    let rows = sqlx::query_as("SELECT * FROM commission_structures ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

async fn create_structure(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CommissionStructureCreate>,
) -> ApiResult<(StatusCode, Json<CommissionStructure>)> {
    require_admin(&user)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Structure name is required"));
    }

    let now = Utc::now();
    let structure: CommissionStructure = sqlx::query_as(
        "INSERT INTO commission_structures \
         (name, description, weekly_base, currency, tiered_commissions, performance_bonuses, \
          recurring_commission_rate, new_client_bonus, new_client_threshold, is_active, \
          created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.weekly_base)
    .bind(&payload.currency)
    .bind(SqlJson(&payload.tiered_commissions))
    .bind(SqlJson(&payload.performance_bonuses))
    .bind(payload.recurring_commission_rate)
    .bind(payload.new_client_bonus)
    .bind(payload.new_client_threshold)
    .bind(payload.is_active)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(structure_id = structure.id, "Commission structure created");
    Ok((StatusCode::CREATED, Json(structure)))
}

async fn find_structure(
    pool: &SqlitePool,
    id: i64,
    active_only: bool,
) -> Result<Option<CommissionStructure>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commission_structures WHERE id = ? AND (is_active = 1 OR ? = 0)")
        .bind(id)
        .bind(active_only)
        .fetch_optional(pool)
        .await
}

async fn first_active_structure(
    pool: &SqlitePool,
) -> Result<Option<CommissionStructure>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commission_structures WHERE is_active = 1 ORDER BY id LIMIT 1")
        .fetch_optional(pool)
        .await
}

/// Requested active structure, else the first active one.
async fn active_structure(
    pool: &SqlitePool,
    requested: Option<i64>,
) -> ApiResult<CommissionStructure> {
    if let Some(id) = requested {
        if let Some(structure) = find_structure(pool, id, true).await? {
            return Ok(structure);
        }
    }
    first_active_structure(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No active commission structure found"))
}

#[derive(Debug, Deserialize)]
struct CalculateRequest {
    deal_value: f64,
    structure_id: Option<i64>,
}

async fn calculate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CalculateRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    if request.deal_value < 0.0 {
        return Err(ApiError::bad_request("Deal value must not be negative"));
    }
    let structure = active_structure(&state.db, request.structure_id).await?;
    let breakdown = commission::calculate(&structure.plan(), request.deal_value);

    Ok(Json(json!({
        "deal_value": request.deal_value,
        "structure_used": structure.name,
        "calculation": breakdown,
    })))
}

#[derive(Debug, Deserialize)]
struct StructureQuery {
    structure_id: Option<i64>,
}

async fn calculate_for_opportunity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(opportunity_id): Path<i64>,
    Query(query): Query<StructureQuery>,
) -> ApiResult<Json<Value>> {
    let opportunity = find_opportunity(&state.db, opportunity_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Opportunity not found"))?;
    if !user.is_admin() && opportunity.owner_id != user.id {
        return Err(ApiError::forbidden("Access denied"));
    }
    let deal_value = opportunity
        .value
        .ok_or_else(|| ApiError::bad_request("Opportunity has no value"))?;

    let structure = match query.structure_id {
        Some(id) => find_structure(&state.db, id, false).await?,
        None => first_active_structure(&state.db).await?,
    }
    .ok_or_else(|| ApiError::not_found("Commission structure not found"))?;

    let breakdown = commission::calculate(&structure.plan(), deal_value);
    Ok(Json(json!({
        "opportunity_id": opportunity_id,
        "deal_value": deal_value,
        "calculation": breakdown,
        "structure": { "id": structure.id, "name": structure.name },
    })))
}

async fn list_commissions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<CommissionView>>> {
    require_admin(&user)?;
    let sql = format!("{VIEW_QUERY} ORDER BY cm.created_at DESC, cm.id DESC");
    let rows = sqlx::query_as(&sql).fetch_all(&state.db).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

async fn seller_commissions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(seller_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<CommissionView>>> {
    if !user.is_admin() && user.id != seller_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    let sql = format!(
        "{VIEW_QUERY} WHERE cm.seller_id = ? AND (? IS NULL OR cm.payment_period = ?) \
         ORDER BY cm.created_at DESC, cm.id DESC"
    );
    let rows = sqlx::query_as(&sql)
        .bind(seller_id)
        .bind(&query.period)
        .bind(&query.period)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct RecordRequest {
    seller_id: i64,
    deal_value: Option<f64>,
    opportunity_id: Option<i64>,
    project_id: Option<i64>,
    structure_id: Option<i64>,
    payment_period: Option<String>,
    notes: Option<String>,
}

/// Current month as `YYYY-MM`.
fn current_period() -> String {
    Utc::now().format("%Y-%m").to_string()
}

async fn record_commission(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<RecordRequest>,
) -> ApiResult<(StatusCode, Json<Commission>)> {
    require_admin(&user)?;
    if db::find_user(&state.db, request.seller_id).await?.is_none() {
        return Err(ApiError::not_found("Seller not found"));
    }

    let opportunity_value = match request.opportunity_id {
        Some(id) => {
            find_opportunity(&state.db, id)
                .await?
                .ok_or_else(|| ApiError::not_found("Opportunity not found"))?
                .value
        }
        None => None,
    };
    let deal_value = request
        .deal_value
        .or(opportunity_value)
        .ok_or_else(|| ApiError::bad_request("Deal value is required"))?;

    let structure = active_structure(&state.db, request.structure_id).await?;
    let breakdown: CommissionBreakdown = commission::calculate(&structure.plan(), deal_value);

    let now = Utc::now();
    let saved: Commission = sqlx::query_as(
        "INSERT INTO commissions \
         (seller_id, structure_id, opportunity_id, project_id, deal_value, commission_rate, \
          commission_amount, weekly_base, performance_bonus, new_client_bonus, total_amount, \
          status, payment_period, notes, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(request.seller_id)
    .bind(structure.id)
    .bind(request.opportunity_id)
    .bind(request.project_id)
    .bind(breakdown.deal_value)
    .bind(breakdown.commission_rate)
    .bind(breakdown.commission_amount)
    .bind(breakdown.weekly_base)
    .bind(breakdown.performance_bonus)
    .bind(breakdown.total_amount)
    .bind(CommissionStatus::Pending)
    .bind(request.payment_period.unwrap_or_else(current_period))
    .bind(&request.notes)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(
        commission_id = saved.id,
        seller_id = saved.seller_id,
        total = saved.total_amount,
        "Commission recorded"
    );
    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: CommissionStatus,
}

async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(commission_id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Commission>> {
    require_admin(&user)?;
    let now = Utc::now();
    let paid_at = (request.status == CommissionStatus::Paid).then_some(now);

    sqlx::query_as(
        "UPDATE commissions SET status = ?, payment_date = COALESCE(?, payment_date), \
         updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(request.status)
    .bind(paid_at)
    .bind(now)
    .bind(commission_id)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Commission not found"))
}
