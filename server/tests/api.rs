//! HTTP contract tests against an in-memory service.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use reportgen::db::init_in_memory;
use reportgen::notify::RecordingNotifier;
use reportgen::{PipelineConfig, ReportService, ReportStore, ServiceConfig};
use reportgen_server::{router, AppState};
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (Router, ReportService) {
    let db = init_in_memory().await.unwrap();
    db.execute_unprepared(
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            pro_number TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            business_unit_id TEXT NOT NULL
        );
        INSERT INTO orders VALUES (1, 'PRO-1', 'org-a', 'bu-b');",
    )
    .await
    .unwrap();

    let service = ReportService::new(
        db,
        Arc::new(ReportStore::memory("reports")),
        Arc::new(RecordingNotifier::new()),
        Arc::new(PipelineConfig::default()),
        ServiceConfig {
            concurrency: 2,
            client_id: "tms-web".to_string(),
        },
    );
    (router(AppState::new(service.clone()), 64 * 1024), service)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn submission(delivery: &str) -> Value {
    json!({
        "tableName": "orders",
        "columns": ["id", "pro_number"],
        "relationships": [],
        "organizationId": "org-a",
        "businessUnitId": "bu-b",
        "fileFormat": "csv",
        "deliveryMethod": delivery,
        "userId": "user-1"
    })
}

#[tokio::test]
async fn submit_then_poll_until_success() {
    let (app, service) = setup().await;

    let (status, body) = send(&app, "POST", "/api/reports", Some(submission("email"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = body["task_id"].as_str().unwrap().to_string();

    service.wait_idle().await;

    let (status, body) = send(&app, "GET", &format!("/api/reports/{}", task_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], task_id.as_str());
    assert_eq!(body["task_status"], "SUCCESS");
    assert_eq!(body["task_result"]["row_count"], 1);
    assert!(body["task_error"].is_null());
}

#[tokio::test]
async fn invalid_delivery_method_is_bad_request() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, "POST", "/api/reports", Some(submission("fax"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidDeliveryMethod");
    assert_eq!(body["message"], "Invalid delivery method: fax");

    let (_, page) = send(
        &app,
        "GET",
        "/api/tasks?organizationId=org-a&businessUnitId=bu-b",
        None,
    )
    .await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn empty_table_name_is_bad_request() {
    let (app, _) = setup().await;
    let mut body = submission("local");
    body["tableName"] = json!("  ");

    let (status, body) = send(&app, "POST", "/api/reports", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, "GET", "/api/reports/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn list_tasks_is_tenant_scoped() {
    let (app, service) = setup().await;
    send(&app, "POST", "/api/reports", Some(submission("email"))).await;
    send(&app, "POST", "/api/reports", Some(submission("local"))).await;
    service.wait_idle().await;

    let (status, page) = send(
        &app,
        "GET",
        "/api/tasks?organizationId=org-a&businessUnitId=bu-b&status=SUCCESS&limit=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["tasks"].as_array().unwrap().len(), 1);

    let (_, other) = send(
        &app,
        "GET",
        "/api/tasks?organizationId=org-z&businessUnitId=bu-b",
        None,
    )
    .await;
    assert_eq!(other["total"], 0);
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
