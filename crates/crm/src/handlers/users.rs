//! User directory.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::auth::{require_admin, CurrentUser};
use crate::error::ApiResult;
use crate::handlers::auth::create_user_account;
use crate::models::user::UserCreate;
use crate::models::User;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/", get(list_users).post(create_user))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn list_users(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<User>>> {
    require_admin(&user)?;
    let users = sqlx::query_as("SELECT * FROM users ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UserCreate>,
) -> ApiResult<Json<User>> {
    require_admin(&user)?;
    create_user_account(&state, payload).await.map(Json)
}
