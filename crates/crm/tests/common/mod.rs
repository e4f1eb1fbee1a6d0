//! Shared harness: an API instance on an ephemeral port over in-memory SQLite.

#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use crm::auth::{create_access_token, hash_password};
use crm::config::LeadFollowupConfig;
use crm::models::{User, UserRole};
use crm::{build_router, db, AppState, Config};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio::net::TcpListener;

pub const SECRET: &str = "integration-test-secret";
pub const EXTERNAL_TOKEN: &str = "external-test-token";
pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub client: Client,
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        secret_key: SECRET.to_string(),
        access_token_expire_minutes: 60,
        cors_origins: vec!["*".to_string()],
        external_api_token: EXTERNAL_TOKEN.to_string(),
        webhook_secret: None,
        grok_api_key: None,
        lead_followup: LeadFollowupConfig {
            attempts: 3,
            interval: Duration::from_millis(50),
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: Config) -> Self {
        let pool = db::connect(&config.database_url).await.unwrap();
        let state = AppState::new(config, pool);
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Insert a user and return it with a valid access token.
    pub async fn user(&self, email: &str, role: UserRole) -> (User, String) {
        let hash = hash_password(PASSWORD).unwrap();
        let name = email.split('@').next().unwrap_or(email);
        let user = db::insert_user(&self.state.db, email, name, &hash, role)
            .await
            .unwrap();
        let token = create_access_token(&user, SECRET, 60).unwrap();
        (user, token)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Store an active default OpenAI-compatible configuration pointing at `base_url`.
    pub async fn configure_llm(&self, admin_id: i64, base_url: &str) -> i64 {
        let now = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO ai_configs \
             (name, provider, model_name, api_key, base_url, is_active, is_default, status, \
              priority, created_by_id, created_at, updated_at) \
             VALUES ('Mock', 'openai', 'gpt-4o', 'test-key', ?, 1, 1, 'active', 10, ?, ?, ?) \
             RETURNING id",
        )
        .bind(base_url)
        .bind(admin_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.state.db)
        .await
        .unwrap();
        id
    }
}

/// Status and JSON body of a response.
pub async fn json(response: Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// OpenAI-style completion body.
pub fn completion(content: &str) -> Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}
