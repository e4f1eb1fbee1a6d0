//! Delivery projects and their hand-offs between sales, planning and dev.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::{require_admin, CurrentUser};
use crate::db::{self, NewNotification};
use crate::error::{ApiError, ApiResult};
use crate::handlers::opportunities::find_opportunity;
use crate::models::project::{ProjectCreate, ProjectUpdate, ProjectView};
use crate::models::{
    NotificationType, Project, ProjectStatus, ProjectType, User, UserRole,
};
use crate::server::AppState;

const VIEW_QUERY: &str = "SELECT p.*, c.name AS contact_name, o.name AS owner_name, \
     po.name AS planning_owner_name, d.name AS dev_owner_name \
     FROM projects p \
     LEFT JOIN contacts c ON c.id = p.contact_id \
     LEFT JOIN users o ON o.id = p.owner_id \
     LEFT JOIN users po ON po.id = p.planning_owner_id \
     LEFT JOIN users d ON d.id = p.dev_owner_id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{project_id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/{project_id}/send-to-planning", post(send_to_planning))
        .route("/{project_id}/send-to-dev", post(send_to_dev))
}

/// Whether `user` may read or edit `project`.
///
/// Sellers see what they own, planning and dev see what is assigned to them.
#[must_use]
pub fn can_access(user: &User, project: &Project) -> bool {
    match user.role {
        UserRole::Admin => true,
        UserRole::Seller => project.owner_id == user.id,
        UserRole::Planning => project.planning_owner_id == Some(user.id),
        UserRole::Developer => project.dev_owner_id == Some(user.id),
    }
}

#[derive(Debug, Deserialize)]
struct ProjectQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    status: Option<ProjectStatus>,
    project_type: Option<ProjectType>,
}

async fn list_projects(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Vec<ProjectView>>> {
    let (owner, planner, developer) = match user.role {
        UserRole::Admin => (None, None, None),
        UserRole::Seller => (Some(user.id), None, None),
        UserRole::Planning => (None, Some(user.id), None),
        UserRole::Developer => (None, None, Some(user.id)),
    };

    let sql = format!(
        "{VIEW_QUERY} WHERE (? IS NULL OR p.owner_id = ?) \
         AND (? IS NULL OR p.planning_owner_id = ?) \
         AND (? IS NULL OR p.dev_owner_id = ?) \
         AND (? IS NULL OR p.status = ?) \
         AND (? IS NULL OR p.project_type = ?) \
         ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as(&sql)
        .bind(owner)
        .bind(owner)
        .bind(planner)
        .bind(planner)
        .bind(developer)
        .bind(developer)
        .bind(query.status)
        .bind(query.status)
        .bind(query.project_type)
        .bind(query.project_type)
        .bind(query.limit.unwrap_or(100).clamp(0, 1000))
        .bind(query.skip.unwrap_or(0).max(0))
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

async fn find_project(pool: &SqlitePool, id: i64) -> ApiResult<Project> {
    sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

async fn project_view(pool: &SqlitePool, id: i64) -> ApiResult<ProjectView> {
    let sql = format!("{VIEW_QUERY} WHERE p.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

fn forbidden_project() -> ApiError {
    ApiError::forbidden("You do not have permission to access this project")
}

async fn get_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ProjectView>> {
    let view = project_view(&state.db, project_id).await?;
    if !can_access(&user, &view.project) {
        return Err(forbidden_project());
    }
    Ok(Json(view))
}

async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ProjectCreate>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name is required"));
    }
    if db::find_contact(&state.db, payload.contact_id).await?.is_none() {
        return Err(ApiError::not_found("Contact not found"));
    }
    if let Some(opportunity_id) = payload.opportunity_id {
        if find_opportunity(&state.db, opportunity_id).await?.is_none() {
            return Err(ApiError::not_found("Opportunity not found"));
        }
    }

    let now = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO projects \
         (name, description, contact_id, opportunity_id, owner_id, project_type, status, \
          estimated_value, technical_requirements, tech_stack, internal_notes, client_notes, \
          created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.contact_id)
    .bind(payload.opportunity_id)
    .bind(user.id)
    .bind(payload.project_type)
    .bind(ProjectStatus::Lead)
    .bind(&payload.estimated_value)
    .bind(&payload.technical_requirements)
    .bind(&payload.tech_stack)
    .bind(&payload.internal_notes)
    .bind(&payload.client_notes)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(project_id = id, owner_id = user.id, "Project created");
    Ok((StatusCode::CREATED, Json(project_view(&state.db, id).await?)))
}

async fn update_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<i64>,
    Json(payload): Json<ProjectUpdate>,
) -> ApiResult<Json<ProjectView>> {
    let mut project = find_project(&state.db, project_id).await?;
    if !can_access(&user, &project) {
        return Err(forbidden_project());
    }

    project.apply(payload, Utc::now());
    save_project(&state.db, &project).await?;
    Ok(Json(project_view(&state.db, project_id).await?))
}

pub(crate) async fn save_project(pool: &SqlitePool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE projects SET \
         name = ?, description = ?, project_type = ?, status = ?, planning_owner_id = ?, \
         dev_owner_id = ?, estimated_value = ?, approved_value = ?, start_date = ?, \
         expected_delivery_date = ?, actual_delivery_date = ?, technical_requirements = ?, \
         tech_stack = ?, repository_url = ?, deployment_url = ?, internal_notes = ?, \
         planning_notes = ?, dev_notes = ?, client_notes = ?, sent_to_planning_at = ?, \
         sent_to_dev_at = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.project_type)
    .bind(project.status)
    .bind(project.planning_owner_id)
    .bind(project.dev_owner_id)
    .bind(&project.estimated_value)
    .bind(&project.approved_value)
    .bind(project.start_date)
    .bind(project.expected_delivery_date)
    .bind(project.actual_delivery_date)
    .bind(&project.technical_requirements)
    .bind(&project.tech_stack)
    .bind(&project.repository_url)
    .bind(&project.deployment_url)
    .bind(&project.internal_notes)
    .bind(&project.planning_notes)
    .bind(&project.dev_notes)
    .bind(&project.client_notes)
    .bind(project.sent_to_planning_at)
    .bind(project.sent_to_dev_at)
    .bind(Utc::now())
    .bind(project.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Assignee for a hand-off; must exist and hold `role`.
async fn assignee(pool: &SqlitePool, id: i64, role: UserRole) -> ApiResult<User> {
    let user = db::find_user(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if user.role != role {
        return Err(ApiError::bad_request(format!(
            "User must belong to the {role} team"
        )));
    }
    Ok(user)
}

#[derive(Debug, Deserialize)]
struct PlanningQuery {
    planning_owner_id: i64,
}

async fn send_to_planning(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<i64>,
    Query(query): Query<PlanningQuery>,
) -> ApiResult<Json<ProjectView>> {
    if !matches!(user.role, UserRole::Admin | UserRole::Seller) {
        return Err(ApiError::forbidden(
            "Only sellers and admins can send projects to planning",
        ));
    }
    let mut project = find_project(&state.db, project_id).await?;
    let planner = assignee(&state.db, query.planning_owner_id, UserRole::Planning).await?;
    if user.is_seller() && project.owner_id != user.id {
        return Err(forbidden_project());
    }

    let now = Utc::now();
    project.planning_owner_id = Some(planner.id);
    project.status = ProjectStatus::EmPlanejamento;
    project.sent_to_planning_at = Some(now);
    save_project(&state.db, &project).await?;

    let message = format!("{} sent project \"{}\" to planning", user.name, project.name);
    db::insert_notification(
        &state.db,
        NewNotification {
            recipient_id: planner.id,
            title: "New project for planning",
            message: &message,
            notification_type: NotificationType::Info,
            related_entity: Some(("project", project.id)),
        },
    )
    .await?;

    info!(project_id, planning_owner_id = planner.id, "Project sent to planning");
    Ok(Json(project_view(&state.db, project_id).await?))
}

#[derive(Debug, Deserialize)]
struct DevQuery {
    dev_owner_id: i64,
}

async fn send_to_dev(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<i64>,
    Query(query): Query<DevQuery>,
) -> ApiResult<Json<ProjectView>> {
    if user.is_seller() {
        return Err(ApiError::forbidden(
            "Only planning and admins can send projects to development",
        ));
    }
    let mut project = find_project(&state.db, project_id).await?;
    let developer = assignee(&state.db, query.dev_owner_id, UserRole::Developer).await?;
    if user.role == UserRole::Planning && project.planning_owner_id != Some(user.id) {
        return Err(forbidden_project());
    }

    project.dev_owner_id = Some(developer.id);
    if project.status == ProjectStatus::Aprovado {
        project.status = ProjectStatus::EmDesenvolvimento;
    }
    project.sent_to_dev_at = Some(Utc::now());
    save_project(&state.db, &project).await?;

    let message = format!("{} sent project \"{}\" to development", user.name, project.name);
    db::insert_notification(
        &state.db,
        NewNotification {
            recipient_id: developer.id,
            title: "New project for development",
            message: &message,
            notification_type: NotificationType::Info,
            related_entity: Some(("project", project.id)),
        },
    )
    .await?;

    info!(project_id, dev_owner_id = developer.id, "Project sent to development");
    Ok(Json(project_view(&state.db, project_id).await?))
}

async fn delete_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;
    let project = find_project(&state.db, project_id).await?;
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project.id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id,
            email: format!("u{id}@example.com"),
            name: format!("User {id}"),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: 1,
            name: "Portal".into(),
            description: None,
            contact_id: 1,
            opportunity_id: None,
            owner_id: 2,
            planning_owner_id: Some(3),
            dev_owner_id: None,
            project_type: ProjectType::default(),
            status: ProjectStatus::EmPlanejamento,
            estimated_value: None,
            approved_value: None,
            start_date: None,
            expected_delivery_date: None,
            actual_delivery_date: None,
            technical_requirements: None,
            tech_stack: None,
            repository_url: None,
            deployment_url: None,
            internal_notes: None,
            planning_notes: None,
            dev_notes: None,
            client_notes: None,
            created_at: now,
            updated_at: now,
            sent_to_planning_at: Some(now),
            sent_to_dev_at: None,
        }
    }

    #[test]
    fn test_access_by_role() {
        let p = project();
        assert!(can_access(&user(1, UserRole::Admin), &p));
        assert!(can_access(&user(2, UserRole::Seller), &p));
        assert!(!can_access(&user(5, UserRole::Seller), &p));
        assert!(can_access(&user(3, UserRole::Planning), &p));
        assert!(!can_access(&user(4, UserRole::Planning), &p));
        assert!(!can_access(&user(4, UserRole::Developer), &p));
    }
}
