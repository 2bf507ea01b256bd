//! Integration tests for crm-web API endpoints
//!
//! Every test runs the full router (auth middleware included) against an
//! in-memory backend with two signed-in users:
//! - `admin-token`: admin role
//! - `rep-token`: no role rows, so sales rep permissions

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use crm_common::backend::{AuthUser, MemoryBackend, Operation};
use crm_common::config::{CompiledDefaults, ConfigOverrides, CrmConfig, TomlConfig};
use crm_common::model::Table;
use crm_web::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

const ADMIN: &str = "admin-token";
const REP: &str = "rep-token";

/// Test helper: backend with both users registered
async fn setup_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    let admin = Uuid::new_v4();
    backend
        .add_user(ADMIN, AuthUser { id: admin, email: Some("admin@example.test".to_string()) })
        .await;
    backend
        .add_user(REP, AuthUser { id: Uuid::new_v4(), email: Some("rep@example.test".to_string()) })
        .await;
    backend
        .seed(Table::UserRoles, [json!({"user_id": admin, "role": "admin"})])
        .await;
    backend
}

/// Test helper: config without touching env or disk
fn test_config() -> CrmConfig {
    CrmConfig::merge(
        &ConfigOverrides {
            anon_key: Some("anon".to_string()),
            ..Default::default()
        },
        &TomlConfig::default(),
        &CompiledDefaults::default(),
    )
}

/// Test helper: Create app over the given backend
fn setup_app(backend: &MemoryBackend) -> axum::Router {
    let state = AppState::new(Arc::new(backend.clone()), test_config());
    build_router(state)
}

/// Test helper: Create request, optionally signed in
fn test_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

fn lead(first_name: &str, company: &str, days_ago: i64) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "first_name": first_name,
        "company_name": company,
        "status": "new",
        "created_at": (chrono::Utc::now() - chrono::Duration::days(days_ago)).to_rfc3339(),
    })
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let backend = setup_backend().await;
    let app = setup_app(&backend);

    let response = app.oneshot(test_request("GET", "/health", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "crm-web");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let backend = setup_backend().await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/records/leads", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/records/leads", Some("stale"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_role_permissions() {
    let backend = setup_backend().await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/me", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["roles"], json!(["admin"]));
    assert_eq!(body["permissions"]["can_manage_users"], true);

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/me", Some(REP), None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["permissions"]["can_delete"], false);
    assert_eq!(body["permissions"]["can_export"], false);
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn test_list_records_newest_first_with_search() {
    let backend = setup_backend().await;
    backend
        .seed(
            Table::Leads,
            [lead("Old", "Acme", 10), lead("New", "Acme", 1), lead("Other", "Globex", 5)],
        )
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/records/leads", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_rows"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 50);
    assert_eq!(body["rows"][0]["first_name"], "New");

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/records/leads?search=acme", Some(REP), None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_rows"], 2);
}

#[tokio::test]
async fn test_unknown_table_not_found() {
    let backend = setup_backend().await;
    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/records/songs", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_validates_before_sending() {
    let backend = setup_backend().await;

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/records/leads",
            Some(REP),
            Some(json!({"first_name": "", "email": "ada@example.test"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(backend.rows(Table::Leads).await.is_empty());

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/records/leads",
            Some(REP),
            Some(json!({"first_name": "Ada", "email": "ada@example.test"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    assert!(body["id"].is_string());
    assert_eq!(backend.rows(Table::Leads).await.len(), 1);
}

#[tokio::test]
async fn test_delete_requires_permission() {
    let backend = setup_backend().await;
    let row = lead("Ada", "Acme", 1);
    let id = row["id"].as_str().unwrap().to_string();
    backend.seed(Table::Leads, [row]).await;
    let uri = format!("/api/records/leads/{}", id);

    let response = setup_app(&backend)
        .oneshot(test_request("DELETE", &uri, Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(backend.rows(Table::Leads).await.len(), 1);

    let response = setup_app(&backend)
        .oneshot(test_request("DELETE", &uri, Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(backend.rows(Table::Leads).await.is_empty());
}

#[tokio::test]
async fn test_audit_logs_are_read_only() {
    let backend = setup_backend().await;
    let uri = format!("/api/records/audit_logs/{}", Uuid::new_v4());

    let response = setup_app(&backend)
        .oneshot(test_request("DELETE", &uri, Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let backend = setup_backend().await;
    let uri = format!("/api/records/deals/{}", Uuid::new_v4());

    let response = setup_app(&backend)
        .oneshot(test_request("PATCH", &uri, Some(ADMIN), Some(json!({"value": 10}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Pipeline
// =============================================================================

fn deal(title: &str, stage: &str, value: f64) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "title": title,
        "stage": stage,
        "value": value,
        "probability": 50,
        "created_at": "2024-03-01T00:00:00Z",
    })
}

#[tokio::test]
async fn test_pipeline_move_to_column() {
    let backend = setup_backend().await;
    let row = deal("Acme rollout", "proposal", 1000.0);
    let id = row["id"].clone();
    backend
        .seed(Table::Deals, [row, deal("Globex pilot", "lead", 500.0)])
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/pipeline", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_deals"], 2);
    assert_eq!(body["columns"].as_array().unwrap().len(), 6);

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/pipeline/move",
            Some(REP),
            Some(json!({"deal_id": id, "target": {"type": "column", "id": "closed_won"}})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["from"], "proposal");
    assert_eq!(body["to"], "closed_won");

    let stored = backend.rows(Table::Deals).await;
    let moved = stored.iter().find(|d| d["id"] == id).unwrap();
    assert_eq!(moved["stage"], "closed_won");
}

#[tokio::test]
async fn test_pipeline_move_rejected_by_backend() {
    let backend = setup_backend().await;
    let row = deal("Locked", "negotiation", 1000.0);
    let id = row["id"].clone();
    backend.seed(Table::Deals, [row]).await;
    backend
        .reject(Table::Deals, Operation::Update, "title", "Locked", "deal is locked")
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/pipeline/move",
            Some(REP),
            Some(json!({"deal_id": id, "target": {"type": "column", "id": "closed_lost"}})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.rows(Table::Deals).await[0]["stage"], "negotiation");
}

// =============================================================================
// Import / export
// =============================================================================

#[tokio::test]
async fn test_import_mapping_suggests_columns() {
    let backend = setup_backend().await;
    let csv = "First Name,E-mail,Favourite Colour\nAda,ada@example.test,blue\n";

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/import/leads/mapping",
            Some(REP),
            Some(json!({"csv": csv})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["row_count"], 1);
    assert_eq!(body["mapping"][0], "first_name");
    assert_eq!(body["mapping"][2], Value::Null);
    assert_eq!(body["missing_required"], json!([]));
}

#[tokio::test]
async fn test_import_requires_mapped_required_fields() {
    let backend = setup_backend().await;
    let csv = "Email\nada@example.test\n";

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/import/leads/commit",
            Some(REP),
            Some(json!({"csv": csv})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(backend.rows(Table::Leads).await.is_empty());
}

#[tokio::test]
async fn test_import_commit_partial_failure() {
    let backend = setup_backend().await;
    backend
        .reject(Table::Leads, Operation::Insert, "first_name", "Bad", "duplicate email")
        .await;
    let csv = "First Name,Email\nAda,ada@example.test\nBad,bad@example.test\nGrace,grace@example.test\n";

    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/import/leads/commit",
            Some(REP),
            Some(json!({"csv": csv})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["errors"], json!(["Row 2: duplicate email"]));
    assert_eq!(backend.rows(Table::Leads).await.len(), 2);
}

#[tokio::test]
async fn test_export_csv_download() {
    let backend = setup_backend().await;
    backend
        .seed(Table::Leads, [lead("Ada", "Acme, Inc.", 2), lead("Grace", "Navy", 1)])
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request(
            "GET",
            "/api/export/leads?fields=first_name,company_name",
            Some(ADMIN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"leads-export-"));
    assert!(disposition.ends_with(".csv\""));

    let text = extract_text(response.into_body()).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "First Name,Company");
    assert_eq!(lines[1], "Grace,Navy");
    assert_eq!(lines[2], "Ada,\"Acme, Inc.\"");
}

#[tokio::test]
async fn test_export_forbidden_for_sales_rep() {
    let backend = setup_backend().await;
    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/export/leads", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Segments, calls, tasks, dashboard
// =============================================================================

#[tokio::test]
async fn test_segment_preview_counts_subscribers() {
    let backend = setup_backend().await;
    backend
        .seed(
            Table::Subscribers,
            [
                json!({"id": Uuid::new_v4(), "email": "a@example.test", "status": "active", "tags": ["vip"]}),
                json!({"id": Uuid::new_v4(), "email": "b@example.test", "status": "active", "tags": []}),
                json!({"id": Uuid::new_v4(), "email": "c@example.test", "status": "bounced", "tags": ["vip"]}),
            ],
        )
        .await;

    let rules = json!({
        "match_type": "all",
        "conditions": [
            {"field": "status", "operator": "equals", "value": "active"},
            {"field": "tags", "operator": "includes", "value": "vip"}
        ]
    });
    let response = setup_app(&backend)
        .oneshot(test_request("POST", "/api/segments/preview", Some(REP), Some(rules)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["matching"], 1);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_calls_split_history_and_reminders() {
    let backend = setup_backend().await;
    let now = chrono::Utc::now();
    backend
        .seed(
            Table::Calls,
            [
                json!({"id": Uuid::new_v4(), "phone_number": "1", "status": "completed",
                       "duration": 60, "created_at": (now - chrono::Duration::days(1)).to_rfc3339()}),
                json!({"id": Uuid::new_v4(), "phone_number": "2", "status": "scheduled",
                       "scheduled_at": (now + chrono::Duration::hours(2)).to_rfc3339(),
                       "created_at": now.to_rfc3339()}),
            ],
        )
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/calls", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert_eq!(body["reminders"][0]["phone_number"], "2");
}

#[tokio::test]
async fn test_tasks_carry_related_labels() {
    let backend = setup_backend().await;
    let deal_row = deal("Acme rollout", "proposal", 1000.0);
    let deal_id = deal_row["id"].clone();
    backend.seed(Table::Deals, [deal_row]).await;
    backend
        .seed(
            Table::Tasks,
            [json!({"id": Uuid::new_v4(), "title": "Send proposal", "status": "pending",
                    "due_date": "2020-01-01", "related_to_type": "deal", "related_to_id": deal_id,
                    "created_at": "2020-01-01T00:00:00Z"})],
        )
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/tasks", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body[0]["title"], "Send proposal");
    assert_eq!(body[0]["related_label"], "Acme rollout");
    assert_eq!(body[0]["overdue"], true);
}

#[tokio::test]
async fn test_dashboard_aggregates() {
    let backend = setup_backend().await;
    backend
        .seed(
            Table::Deals,
            [deal("Won", "closed_won", 1000.0), deal("Lost", "closed_lost", 500.0), deal("Open", "proposal", 200.0)],
        )
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/dashboard", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pipeline"]["won_value"], 1000.0);
    assert_eq!(body["pipeline"]["win_rate"], 50.0);
}

// =============================================================================
// Audit log and assistant
// =============================================================================

#[tokio::test]
async fn test_audit_export_requires_permission() {
    let backend = setup_backend().await;
    backend
        .seed(
            Table::AuditLogs,
            [json!({"id": Uuid::new_v4(), "action": "delete", "entity_type": "lead",
                    "created_at": "2024-05-01T10:00:00Z"})],
        )
        .await;

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/audit-logs/export", Some(REP), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = setup_app(&backend)
        .oneshot(test_request("GET", "/api/audit-logs/export?action=delete", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = extract_text(response.into_body()).await;
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().contains("System"));
}

#[tokio::test]
async fn test_chat_unavailable_without_endpoint() {
    let backend = setup_backend().await;
    let response = setup_app(&backend)
        .oneshot(test_request(
            "POST",
            "/api/chat",
            Some(REP),
            Some(json!({"messages": [{"role": "user", "content": "Hi"}]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
