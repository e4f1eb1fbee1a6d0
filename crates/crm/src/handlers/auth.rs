//! Login and self-registration.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{create_access_token, hash_password, verify_password};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::user::{LoginRequest, UserCreate};
use crate::models::User;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    user: User,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = db::find_user_by_email(&state.db, payload.email.trim())
        .await?
        .filter(|u| verify_password(&payload.password, &u.password_hash))
        .ok_or_else(|| {
            warn!(email = %payload.email, "Failed login");
            ApiError::unauthorized("Incorrect email or password")
        })?;

    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    let access_token = create_access_token(
        &user,
        &state.config.secret_key,
        state.config.access_token_expire_minutes,
    )?;
    info!(user_id = user.id, role = %user.role, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> ApiResult<Json<User>> {
    create_user_account(&state, payload).await.map(Json)
}

/// Validate and insert a new account.
pub async fn create_user_account(state: &AppState, payload: UserCreate) -> ApiResult<User> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    let hash = hash_password(&payload.password)?;
    let user = db::insert_user(&state.db, email, payload.name.trim(), &hash, payload.role).await?;
    info!(user_id = user.id, role = %user.role, "User registered");
    Ok(user)
}
