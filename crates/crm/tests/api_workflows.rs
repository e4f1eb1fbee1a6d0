//! End-to-end flows over the HTTP API.

mod common;

use chrono::{Duration, Utc};
use crm::models::UserRole;
use serde_json::json;

use common::{json, TestApp, PASSWORD};

#[tokio::test]
async fn test_service_endpoints() {
    let app = TestApp::spawn().await;

    let (status, body) = json(app.client.get(app.url("/")).send().await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "running");

    let (status, body) = json(app.client.get(app.url("/health")).send().await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_login_and_authentication() {
    let app = TestApp::spawn().await;
    let (user, _) = app.user("ana@example.com", UserRole::Seller).await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ana@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    let (status, body) = json(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["id"], user.id);
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap().to_string();
    let (status, _) = json(app.get("/api/contacts", &token).send().await.unwrap()).await;
    assert_eq!(status, 200);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ana@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let (status, body) = json(app.client.get(app.url("/api/contacts")).send().await.unwrap()).await;
    assert_eq!(status, 401);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_contacts_are_scoped_to_their_owner() {
    let app = TestApp::spawn().await;
    let (_, ana) = app.user("ana@example.com", UserRole::Seller).await;
    let (_, bruno) = app.user("bruno@example.com", UserRole::Seller).await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

    let (status, contact) = json(
        app.post("/api/contacts", &ana)
            .json(&json!({ "name": "Acme Ltda", "email": "buyer@acme.com", "status": "client" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    let path = format!("/api/contacts/{}", contact["id"]);

    let (status, _) = json(app.get(&path, &bruno).send().await.unwrap()).await;
    assert_eq!(status, 404);

    let (status, body) = json(app.get(&path, &admin).send().await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(body["name"], "Acme Ltda");

    let (_, listed) = json(app.get("/api/contacts", &bruno).send().await.unwrap()).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_project_handoff_and_quote_completion() {
    let app = TestApp::spawn().await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;
    let (planner_user, planner) = app.user("planner@example.com", UserRole::Planning).await;

    let (_, contact) = json(
        app.post("/api/contacts", &seller)
            .json(&json!({ "name": "Globex", "status": "client" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let (status, project) = json(
        app.post("/api/projects", &seller)
            .json(&json!({
                "name": "Portal do cliente",
                "contact_id": contact["id"],
                "project_type": "saas_platform",
                "estimated_value": "R$ 40.000,00",
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(project["status"], "lead");
    let project_id = project["id"].as_i64().unwrap();

    // Planning cannot see the project until it is handed over.
    let project_path = format!("/api/projects/{project_id}");
    let (status, _) = json(app.get(&project_path, &planner).send().await.unwrap()).await;
    assert_eq!(status, 403);

    let (status, sent) = json(
        app.post(
            &format!(
                "/api/projects/{project_id}/send-to-planning?planning_owner_id={}",
                planner_user.id
            ),
            &seller,
        )
        .send()
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(sent["status"], "em_planejamento");
    assert_eq!(sent["planning_owner_name"], "planner");

    let (_, inbox) = json(app.get("/api/notifications", &planner).send().await.unwrap()).await;
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["related_entity_type"], "project");
    assert_eq!(inbox[0]["related_entity_id"], project_id);

    let (status, quote) = json(
        app.post("/api/quote-requests", &seller)
            .json(&json!({ "project_id": project_id, "seller_notes": "Cliente tem pressa" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(quote["status"], "pending");
    assert_eq!(quote["project_name"], "Portal do cliente");

    let (status, _) = json(
        app.post("/api/quote-requests", &seller)
            .json(&json!({ "project_id": project_id }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 400);

    let (_, visible) = json(app.get("/api/quote-requests", &planner).send().await.unwrap()).await;
    assert_eq!(visible.as_array().unwrap().len(), 1);

    let complete_path = format!("/api/quote-requests/{}/complete", quote["id"]);
    let (status, _) = json(
        app.put(&complete_path, &seller)
            .json(&json!({}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (status, done) = json(
        app.put(&complete_path, &planner)
            .json(&json!({
                "technologies": "Rust, React , PostgreSQL",
                "technical_details": "API em Rust com SPA React",
                "estimated_hours": 320,
                "estimated_value": "R$ 45.000,00",
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["quote_request"]["technologies"], json!(["Rust", "React", "PostgreSQL"]));
    assert_eq!(done["quote_request"]["planning_owner_id"], planner_user.id);
    assert!(done["quote_request"]["completed_at"].is_string());

    let (_, project) = json(app.get(&project_path, &seller).send().await.unwrap()).await;
    assert_eq!(project["approved_value"], "R$ 45.000,00");
    assert_eq!(project["tech_stack"], "Rust, React, PostgreSQL");
    assert_eq!(project["technical_requirements"], "API em Rust com SPA React");

    let (_, inbox) = json(app.get("/api/notifications", &seller).send().await.unwrap()).await;
    assert_eq!(inbox[0]["related_entity_type"], "quote_request");
    assert_eq!(inbox[0]["type"], "success");
}

#[tokio::test]
async fn test_commission_calculation() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
    let (seller_user, seller) = app.user("seller@example.com", UserRole::Seller).await;

    let (status, _) = json(
        app.post("/api/commissions/calculate", &admin)
            .json(&json!({ "deal_value": 5000.0 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 404);

    let (status, structure) = json(
        app.post("/api/commissions/structures", &admin)
            .json(&json!({
                "name": "Padrão",
                "weekly_base": 100.0,
                "tiered_commissions": [
                    { "min": 0.0, "max": 2000.0, "rate": 0.20 },
                    { "min": 2001.0, "max": 10000.0, "rate": 0.15 },
                    { "min": 10001.0, "rate": 0.10 }
                ],
                "performance_bonuses": [
                    { "threshold": 10000.0, "bonus": 150.0 },
                    { "threshold": 20000.0, "bonus": 300.0 }
                ]
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 201);

    let (status, _) = json(
        app.post("/api/commissions/calculate", &seller)
            .json(&json!({ "deal_value": 5000.0 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (status, result) = json(
        app.post("/api/commissions/calculate", &admin)
            .json(&json!({ "deal_value": 25000.0, "structure_id": structure["id"] }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(result["structure_used"], "Padrão");
    assert_eq!(result["calculation"]["commission_amount"], 2500.0);
    assert_eq!(result["calculation"]["performance_bonus"], 300.0);
    assert_eq!(result["calculation"]["total_amount"], 2900.0);

    let (status, recorded) = json(
        app.post("/api/commissions/record", &admin)
            .json(&json!({ "seller_id": seller_user.id, "deal_value": 5000.0, "payment_period": "2026-10" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(recorded["total_amount"], 850.0);
    assert_eq!(recorded["status"], "pending");

    let (_, own) = json(
        app.get(
            &format!("/api/commissions/seller/{}?period=2026-10", seller_user.id),
            &seller,
        )
        .send()
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(own.as_array().unwrap().len(), 1);
    assert_eq!(own[0]["seller_name"], "seller");

    let (_, paid) = json(
        app.put(&format!("/api/commissions/{}/status", recorded["id"]), &admin)
            .json(&json!({ "status": "paid" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(paid["status"], "paid");
    assert!(paid["payment_date"].is_string());
}

#[tokio::test]
async fn test_goal_progress_completes_goal() {
    let app = TestApp::spawn().await;
    let (seller_user, seller) = app.user("seller@example.com", UserRole::Seller).await;
    let (other_user, _) = app.user("other@example.com", UserRole::Seller).await;

    let start = Utc::now();
    let end = start + Duration::days(30);

    let (status, _) = json(
        app.post("/api/goals", &seller)
            .json(&json!({
                "title": "Meta de outro",
                "target_value": 1000.0,
                "assignee_id": other_user.id,
                "start_date": start,
                "end_date": end,
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (status, goal) = json(
        app.post("/api/goals", &seller)
            .json(&json!({
                "title": "Fechar R$ 10 mil",
                "target_value": 10000.0,
                "start_date": start,
                "end_date": end,
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(goal["assignee_id"], seller_user.id);
    assert_eq!(goal["status"], "active");

    let progress = format!("/api/goals/{}/progress?current_value=2500", goal["id"]);
    let (_, partial) = json(app.post(&progress, &seller).send().await.unwrap()).await;
    assert_eq!(partial["progress_percentage"], 25.0);
    assert_eq!(partial["status"], "active");

    let progress = format!("/api/goals/{}/progress?current_value=12000", goal["id"]);
    let (_, done) = json(app.post(&progress, &seller).send().await.unwrap()).await;
    assert_eq!(done["progress_percentage"], 100.0);
    assert_eq!(done["status"], "completed");
    assert!(done["completed_at"].is_string());
}

#[tokio::test]
async fn test_dashboards() {
    let app = TestApp::spawn().await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

    let (_, contact) = json(
        app.post("/api/contacts", &seller)
            .json(&json!({ "name": "Initech", "status": "client" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    for (name, value, stage) in [("A", 1000.0, "proposta"), ("B", 5000.0, "negociacao")] {
        let (status, _) = json(
            app.post("/api/opportunities", &seller)
                .json(&json!({
                    "name": name,
                    "contact_id": contact["id"],
                    "value": value,
                    "stage": stage,
                }))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200);
    }

    let (status, dashboard) =
        json(app.get("/api/dashboard/vendedor", &seller).send().await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(dashboard["stats"]["total_contacts"], 1);
    assert_eq!(dashboard["stats"]["total_opportunities"], 2);
    assert_eq!(dashboard["stats"]["total_value"], 6000.0);
    assert_eq!(dashboard["stats"]["opportunities_by_stage"]["proposta"], 1);
    assert_eq!(dashboard["stats"]["opportunities_by_stage"]["fechado"], 0);
    assert_eq!(dashboard["top_opportunities"][0]["name"], "B");

    let (status, _) = json(app.get("/api/dashboard/admin", &seller).send().await.unwrap()).await;
    assert_eq!(status, 403);
    let (status, _) = json(app.get("/api/dashboard/admin", &admin).send().await.unwrap()).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_activities_filter_and_due_ordering() {
    let app = TestApp::spawn().await;
    let (_, ana) = app.user("ana@example.com", UserRole::Seller).await;
    let (_, bruno) = app.user("bruno@example.com", UserRole::Seller).await;

    let schedule = [
        ("Enviar proposta", Some("2025-03-02"), Some("08:00:00")),
        ("Sem prazo", None, None),
        ("Reunião de alinhamento", Some("2025-03-01"), Some("15:00:00")),
        ("Ligar para o cliente", Some("2025-03-01"), Some("09:00:00")),
    ];
    let mut ids = Vec::new();
    for (subject, due_date, due_time) in schedule {
        let (status, activity) = json(
            app.post("/api/activities", &ana)
                .json(&json!({
                    "type": "task",
                    "subject": subject,
                    "due_date": due_date,
                    "due_time": due_time,
                }))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(activity["status"], "pending");
        ids.push(activity["id"].as_i64().unwrap());
    }

    let (_, listed) = json(app.get("/api/activities", &ana).send().await.unwrap()).await;
    let subjects: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["subject"].as_str().unwrap())
        .collect();
    assert_eq!(
        subjects,
        [
            "Ligar para o cliente",
            "Reunião de alinhamento",
            "Enviar proposta",
            "Sem prazo",
        ]
    );

    let (status, done) = json(
        app.put(&format!("/api/activities/{}", ids[0]), &ana)
            .json(&json!({ "status": "completed" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(done["subject"], "Enviar proposta");

    let (_, completed) = json(
        app.get("/api/activities?status=completed", &ana)
            .send()
            .await
            .unwrap(),
    )
    .await;
    let completed = completed.as_array().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["id"], ids[0]);

    let (_, pending) = json(
        app.get("/api/activities?status=pending", &ana)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(pending.as_array().unwrap().len(), 3);

    let (_, others) = json(app.get("/api/activities", &bruno).send().await.unwrap()).await;
    assert!(others.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_opportunity_probability_bounds() {
    let app = TestApp::spawn().await;
    let (_, seller) = app.user("seller@example.com", UserRole::Seller).await;

    let (_, contact) = json(
        app.post("/api/contacts", &seller)
            .json(&json!({ "name": "Umbrella", "status": "prospect" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    for probability in [101, -1] {
        let (status, body) = json(
            app.post("/api/opportunities", &seller)
                .json(&json!({
                    "name": "Licenças",
                    "contact_id": contact["id"],
                    "probability": probability,
                }))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, 400, "probability {probability}");
        assert!(body["detail"].as_str().unwrap().contains("Probability"));
    }

    let (status, opportunity) = json(
        app.post("/api/opportunities", &seller)
            .json(&json!({
                "name": "Licenças",
                "contact_id": contact["id"],
                "probability": 100,
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(opportunity["probability"], 100);

    let (status, _) = json(
        app.put(&format!("/api/opportunities/{}", opportunity["id"]), &seller)
            .json(&json!({ "probability": 150 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_lead_analysis_access() {
    let app = TestApp::spawn().await;
    let (_, ana) = app.user("ana@example.com", UserRole::Seller).await;
    let (_, bruno) = app.user("bruno@example.com", UserRole::Seller).await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

    let mut contact_ids = Vec::new();
    for (token, name) in [(&ana, "Stark Industries"), (&bruno, "Wayne Enterprises")] {
        let (_, contact) = json(
            app.post("/api/contacts", token)
                .json(&json!({ "name": name, "status": "client" }))
                .send()
                .await
                .unwrap(),
        )
        .await;
        contact_ids.push(contact["id"].as_i64().unwrap());
    }
    let (anas, brunos) = (contact_ids[0], contact_ids[1]);

    let (status, _) = json(
        app.post(&format!("/api/lead-analysis/analyze/{anas}"), &bruno)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (status, _) = json(
        app.post("/api/lead-analysis/analyze/9999", &admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 404);

    let (status, body) = json(
        app.get(&format!("/api/lead-analysis/{anas}"), &ana)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains("Analysis not found"));

    // Without a provider each run is stored with status error.
    for contact_id in [anas, brunos] {
        crm::analysis::run_lead_analysis(&app.state, contact_id)
            .await
            .unwrap();
    }

    let (status, stored) = json(
        app.get(&format!("/api/lead-analysis/{anas}"), &ana)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(stored["analysis_status"], "error");
    assert!(stored["error_message"].is_string());

    let (status, _) = json(
        app.get(&format!("/api/lead-analysis/{anas}"), &bruno)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let (_, own) = json(app.get("/api/lead-analysis", &ana).send().await.unwrap()).await;
    let own = own.as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["contact_id"], anas);

    let (_, all) = json(app.get("/api/lead-analysis", &admin).send().await.unwrap()).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_notification_inbox() {
    let app = TestApp::spawn().await;
    let (seller_user, seller) = app.user("seller@example.com", UserRole::Seller).await;
    let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

    let notice = |title: &str| {
        json!({
            "title": title,
            "message": "Confira o pipeline",
            "type": "warning",
            "recipient_id": seller_user.id,
        })
    };

    let (status, _) = json(
        app.post("/api/notifications", &seller)
            .json(&notice("Sem permissão"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 403);

    let mut ids = Vec::new();
    for title in ["Meta em risco", "Novo lead", "Proposta aceita"] {
        let (status, created) = json(
            app.post("/api/notifications", &admin)
                .json(&notice(title))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(created["is_read"], false);
        ids.push(created["id"].as_i64().unwrap());
    }

    let (status, read) = json(
        app.put(&format!("/api/notifications/{}/read", ids[0]), &seller)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(read["is_read"], true);

    let (_, unread) = json(
        app.get("/api/notifications?unread_only=true", &seller)
            .send()
            .await
            .unwrap(),
    )
    .await;
    let unread = unread.as_array().unwrap();
    assert_eq!(unread.len(), 2);
    assert!(unread.iter().all(|n| n["id"] != ids[0]));

    let (_, inbox) = json(app.get("/api/notifications", &seller).send().await.unwrap()).await;
    assert_eq!(inbox.as_array().unwrap().len(), 3);

    let (status, marked) = json(
        app.put("/api/notifications/mark-all-read", &seller)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(marked["count"], 2);

    let (_, unread) = json(
        app.get("/api/notifications?unread_only=true", &seller)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(unread.as_array().unwrap().is_empty());

    // Admin's own inbox is separate.
    let (_, marked) = json(
        app.put("/api/notifications/mark-all-read", &admin)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(marked["count"], 0);
}
