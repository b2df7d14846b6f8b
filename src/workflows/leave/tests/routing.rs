use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::leave::domain::OrgId;
use crate::workflows::leave::router::leave_router;
use crate::workflows::leave::store::MemoryPolicyStore;

use super::common::{
    build_service, build_service_with, engineering_store, read_json_body, today, FixedClock,
};

fn router() -> axum::Router {
    leave_router(Arc::new(build_service(engineering_store())))
}

async fn post_json(router: axum::Router, uri: &str, payload: Value) -> Response {
    router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("router responds")
}

async fn get(router: axum::Router, uri: &str) -> Response {
    router
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds")
}

fn annual_payload() -> Value {
    json!({
        "employee_id": "emp-100",
        "leave_type": "Annual Leave",
        "start_date": "2025-07-07",
        "end_date": "2025-07-11"
    })
}

#[tokio::test]
async fn analyze_endpoint_returns_a_full_decision() {
    let response = post_json(router(), "/api/v1/leave/analyze", annual_payload()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "APPROVED");
    assert!(body["request_id"].is_string());
    assert_eq!(body["decision"]["approved"], json!(true));
    assert_eq!(body["leave_request"]["total_days"], json!(5.0));
    assert_eq!(body["employee"]["department"], "Engineering");
}

#[tokio::test]
async fn analyze_endpoint_rejects_reversed_ranges() {
    let mut payload = annual_payload();
    payload["start_date"] = json!("2025-07-11");
    payload["end_date"] = json!("2025-07-07");

    let response = post_json(router(), "/api/v1/leave/analyze", payload).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().expect("error string").contains("end_date"));
}

#[tokio::test]
async fn validate_endpoint_does_not_persist() {
    let response = post_json(router(), "/api/v1/leave/validate", annual_payload()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert!(body["request_id"].is_null());
    assert_eq!(body["status"], "APPROVED");
}

#[tokio::test]
async fn default_rules_endpoint_lists_the_catalog() {
    let response = get(router(), "/api/v1/leave/rules").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["source"], "default");
    assert_eq!(body["count"], json!(13));
    assert!(body["rules"].as_array().expect("rule array").len() == 13);
}

#[tokio::test]
async fn org_rules_endpoint_serves_overrides() {
    let org = OrgId("org-42".to_string());
    let policy = MemoryPolicyStore::new();
    policy.set_rules(&org, json!({ "RULE001": {} }));
    let service = build_service_with(
        engineering_store(),
        policy,
        Duration::from_secs(300),
        Arc::new(FixedClock(today())),
    );
    let router = leave_router(Arc::new(service));

    let response = get(router, "/api/v1/leave/rules/org-42").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["source"], "org-42");
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn cache_clear_endpoint_reports_its_scope() {
    let all = post_json(router(), "/api/v1/leave/cache/clear", json!({})).await;
    assert_eq!(all.status(), StatusCode::OK);
    assert_eq!(read_json_body(all).await["cleared"], "all");

    let scoped = post_json(
        router(),
        "/api/v1/leave/cache/clear",
        json!({ "org_id": "org-42" }),
    )
    .await;
    assert_eq!(read_json_body(scoped).await["cleared"], "org-42");
}
