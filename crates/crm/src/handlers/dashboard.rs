//! Pipeline summaries for sellers and admins.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::{require_admin, CurrentUser};
use crate::error::ApiResult;
use crate::models::{Activity, ActivityStatus, Opportunity, OpportunityStage};
use crate::server::AppState;

const RECENT_ACTIVITIES: i64 = 10;
const TOP_OPPORTUNITIES: i64 = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendedor", get(seller_dashboard))
        .route("/admin", get(admin_dashboard))
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_contacts: i64,
    pub total_opportunities: i64,
    pub total_value: f64,
    pub pending_activities: i64,
    pub opportunities_by_stage: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_activities: Vec<Activity>,
    pub top_opportunities: Vec<Opportunity>,
}

async fn seller_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Dashboard>> {
    Ok(Json(build_dashboard(&state.db, Some(user.id)).await?))
}

async fn admin_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Dashboard>> {
    require_admin(&user)?;
    Ok(Json(build_dashboard(&state.db, None).await?))
}

/// Summary over rows owned by `owner`, or everything when `None`.
pub async fn build_dashboard(
    pool: &SqlitePool,
    owner: Option<i64>,
) -> Result<Dashboard, sqlx::Error> {
    let (total_contacts,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE (? IS NULL OR owner_id = ?)")
            .bind(owner)
            .bind(owner)
            .fetch_one(pool)
            .await?;

    let (total_opportunities, total_value): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(value), 0.0) FROM opportunities \
         WHERE (? IS NULL OR owner_id = ?)",
    )
    .bind(owner)
    .bind(owner)
    .fetch_one(pool)
    .await?;

    let (pending_activities,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activities WHERE (? IS NULL OR owner_id = ?) AND status = ?",
    )
    .bind(owner)
    .bind(owner)
    .bind(ActivityStatus::Pending)
    .fetch_one(pool)
    .await?;

    let stage_counts: Vec<(OpportunityStage, i64)> = sqlx::query_as(
        "SELECT stage, COUNT(*) FROM opportunities WHERE (? IS NULL OR owner_id = ?) \
         GROUP BY stage",
    )
    .bind(owner)
    .bind(owner)
    .fetch_all(pool)
    .await?;

    let mut opportunities_by_stage: BTreeMap<&'static str, i64> = OpportunityStage::ALL
        .into_iter()
        .map(|stage| (stage.as_str(), 0))
        .collect();
    for (stage, count) in stage_counts {
        opportunities_by_stage.insert(stage.as_str(), count);
    }

    let recent_activities = sqlx::query_as(
        "SELECT * FROM activities WHERE (? IS NULL OR owner_id = ?) \
         ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(owner)
    .bind(owner)
    .bind(RECENT_ACTIVITIES)
    .fetch_all(pool)
    .await?;

    let top_opportunities = sqlx::query_as(
        "SELECT * FROM opportunities WHERE (? IS NULL OR owner_id = ?) \
         ORDER BY value IS NULL, value DESC, id LIMIT ?",
    )
    .bind(owner)
    .bind(owner)
    .bind(TOP_OPPORTUNITIES)
    .fetch_all(pool)
    .await?;

    Ok(Dashboard {
        stats: DashboardStats {
            total_contacts,
            total_opportunities,
            total_value,
            pending_activities,
            opportunities_by_stage,
        },
        recent_activities,
        top_opportunities,
    })
}
