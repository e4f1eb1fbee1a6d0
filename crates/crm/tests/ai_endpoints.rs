//! LLM-backed endpoints against a mocked OpenAI-compatible backend.

mod common;

use crm::models::UserRole;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{completion, json, TestApp};

async fn mock_reply(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chat_without_provider_is_rejected() {
    let app = TestApp::spawn().await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;

    let (status, body) = json(
        app.post("/api/ai/chat", &seller)
            .json(&json!({ "prompt": "Olá" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("No active AI configuration"));
}

#[tokio::test]
async fn test_chat_stores_history() {
    let server = MockServer::start().await;
    mock_reply(&server, "Olá! Como posso ajudar com suas vendas?").await;

    let app = TestApp::spawn().await;
    let (admin_user, _) = app.user("admin@example.com", UserRole::Admin).await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;
    app.configure_llm(admin_user.id, &server.uri()).await;

    let (status, body) = json(
        app.post("/api/ai/chat", &seller)
            .json(&json!({ "prompt": "Olá Helena" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["response"], "Olá! Como posso ajudar com suas vendas?");
    assert_eq!(body["action_executed"], false);

    let (_, history) = json(app.get("/api/ai/chat/history", &seller).send().await.unwrap()).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "Olá Helena");
    assert_eq!(history[1]["role"], "assistant");

    let (_, cleared) = json(app.delete("/api/ai/chat/history", &seller).send().await.unwrap()).await;
    assert_eq!(cleared["deleted"], 2);
}

#[tokio::test]
async fn test_chat_executes_assistant_action() {
    let server = MockServer::start().await;
    mock_reply(
        &server,
        r#"Claro! create_contact(name="Initech", email="ti@initech.com", status="client")"#,
    )
    .await;

    let app = TestApp::spawn().await;
    let (admin_user, _) = app.user("admin@example.com", UserRole::Admin).await;
    let (seller_user, seller) = app.user("seller@example.com", UserRole::Seller).await;
    app.configure_llm(admin_user.id, &server.uri()).await;

    let (status, body) = json(
        app.post("/api/ai/chat", &seller)
            .json(&json!({ "prompt": "Cadastre a Initech" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["action_executed"], true);
    assert!(body["action_result"].as_str().unwrap().contains("Initech"));
    assert!(!body["response"].as_str().unwrap().contains("create_contact("));

    let contact = crm::db::find_contact_by_email(&app.state.db, "ti@initech.com")
        .await
        .unwrap()
        .expect("contact created by the assistant");
    assert_eq!(contact.owner_id, seller_user.id);
}

#[tokio::test]
async fn test_public_chat_rate_limit_and_language() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Visitante"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached" }
        })))
        .mount(&server)
        .await;

    let app = TestApp::spawn().await;

    let public = |body: serde_json::Value| {
        app.client
            .post(app.url("/api/ai/public/chat"))
            .json(&body)
            .send()
    };

    let (status, _) = json(public(json!({ "message": "Hola" })).await.unwrap()).await;
    assert_eq!(status, 500);

    let (admin_user, _) = app.user("admin@example.com", UserRole::Admin).await;
    app.configure_llm(admin_user.id, &server.uri()).await;

    let (status, body) = json(
        public(json!({ "message": "Hola", "language": "es" }))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 503);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_public_chat_reply() {
    let server = MockServer::start().await;
    mock_reply(&server, "Hello! We build custom software.").await;

    let app = TestApp::spawn().await;
    let (admin_user, _) = app.user("admin@example.com", UserRole::Admin).await;
    app.configure_llm(admin_user.id, &server.uri()).await;

    let (status, body) = json(
        app.client
            .post(app.url("/api/ai/public/chat"))
            .json(&json!({ "message": "What do you do?", "language": "fr" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["language"], "en");
    assert_eq!(body["response"], "Hello! We build custom software.");
}

#[tokio::test]
async fn test_quote_generated_with_ai() {
    let server = MockServer::start().await;
    mock_reply(
        &server,
        "```json\n{\"technical_specs\": \"API REST em Rust\", \"technologies\": \"Rust, Vue\", \
         \"stages\": \"Etapa 1: Planejamento - 5 dias\", \"estimated_hours\": 200, \
         \"estimated_value\": \"R$ 30.000,00\"}\n```",
    )
    .await;

    let app = TestApp::spawn().await;
    let (admin_user, _) = app.user("admin@example.com", UserRole::Admin).await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;
    let (planner_user, planner) = app.user("planner@example.com", UserRole::Planning).await;
    app.configure_llm(admin_user.id, &server.uri()).await;

    let (_, contact) = json(
        app.post("/api/contacts", &seller)
            .json(&json!({ "name": "Hooli", "status": "client" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let (_, project) = json(
        app.post("/api/projects", &seller)
            .json(&json!({ "name": "App interno", "contact_id": contact["id"] }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let (_, quote) = json(
        app.post("/api/quote-requests", &seller)
            .json(&json!({ "project_id": project["id"] }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let generate = format!("/api/quote-requests/{}/generate-with-ai", quote["id"]);
    let (status, _) = json(app.post(&generate, &seller).send().await.unwrap()).await;
    assert_eq!(status, 403);

    let (status, generated) = json(app.post(&generate, &planner).send().await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(generated["ai_generated"], true);
    assert_eq!(generated["status"], "in_progress");
    assert_eq!(generated["technologies"], json!(["Rust", "Vue"]));
    assert_eq!(generated["estimated_hours"], 200);
    assert_eq!(generated["technical_specs"], "API REST em Rust");
    assert_eq!(generated["estimated_value"], "R$ 30.000,00");
    assert_eq!(generated["planning_owner_id"], planner_user.id);
}

#[tokio::test]
async fn test_ai_config_connection_test() {
    let server = MockServer::start().await;
    mock_reply(&server, "OK").await;

    let app = TestApp::spawn().await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;

    let payload = json!({
        "name": "Proxy OpenAI",
        "provider": "openai",
        "model_name": "gpt-4o",
        "api_key": "test-key",
        "base_url": server.uri(),
        "is_active": true,
        "is_default": true,
    });
    let (status, _) = json(
        app.post("/api/ai-config", &seller)
            .json(&payload)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (_, created) = json(
        app.post("/api/ai-config", &admin)
            .json(&payload)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(created["status"], "inactive");

    let (_, result) = json(
        app.post(&format!("/api/ai-config/{}/test", created["id"]), &admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(result["success"], true);

    let (_, configs) = json(app.get("/api/ai-config", &admin).send().await.unwrap()).await;
    assert_eq!(configs[0]["status"], "active");
    assert!(configs[0]["last_tested_at"].is_string());

    let (status, _) = json(
        app.post("/api/ai-config", &admin)
            .json(&json!({ "name": "Bad", "provider": "skynet", "model_name": "t-800" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_ai_config_test_with_unknown_stored_provider_records_error() {
    let app = TestApp::spawn().await;
    let (admin_user, admin) = app.user("admin@example.com", UserRole::Admin).await;
    let config_id = app.configure_llm(admin_user.id, "http://127.0.0.1:9").await;
    sqlx::query("UPDATE ai_configs SET provider = 'skynet' WHERE id = ?")
        .bind(config_id)
        .execute(&app.state.db)
        .await
        .unwrap();

    let (status, result) = json(
        app.post(&format!("/api/ai-config/{config_id}/test"), &admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(result["success"], false);
    assert!(result["error"].is_string());

    let (_, configs) = json(app.get("/api/ai-config", &admin).send().await.unwrap()).await;
    assert_eq!(configs[0]["status"], "error");
    assert!(configs[0]["last_tested_at"].is_string());
    assert!(configs[0]["last_error"].is_string());
}
