//! HTTP server for the CRM API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::handlers;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Arc<Config>,
    /// Database pool.
    pub db: SqlitePool,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, db: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }
}

/// Build the HTTP router for the CRM service.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        .nest("/auth", handlers::auth::routes())
        .nest("/users", handlers::users::routes())
        .nest("/contacts", handlers::contacts::routes())
        .nest("/opportunities", handlers::opportunities::routes())
        .nest("/activities", handlers::activities::routes())
        .nest("/projects", handlers::projects::routes())
        .nest("/commissions", handlers::commissions::routes())
        .nest("/goals", handlers::goals::routes())
        .nest("/notifications", handlers::notifications::routes())
        .nest("/dashboard", handlers::dashboard::routes())
        .nest("/ai-config", handlers::ai_config::routes())
        .nest("/ai", handlers::ai::routes())
        .nest("/lead-analysis", handlers::lead_analysis::routes())
        .nest("/quote-requests", handlers::quote_requests::routes())
        .nest("/webhooks", handlers::webhooks::routes())
        .nest("/external", handlers::external::routes());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins; `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let base = CorsLayer::new().allow_methods(methods);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(handlers::external::API_TOKEN_HEADER),
        ])
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "CRM API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Bind to the configured port and serve until the process stops.
pub async fn serve(state: AppState) -> Result<()> {
    let port = state.config.port;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port, "CRM service listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
