//! Integration scenarios for the leave decision workflow, exercised through
//! the public service facade and HTTP router.

mod common {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use leave_ai::workflows::leave::{
        BalanceSnapshot, BlackoutEntry, Clock, Employee, EmployeeId, LeaveDecisionService,
        LeaveStatus, MemoryLeaveStore, MemoryPolicyStore,
    };

    pub(super) struct FixedClock(pub(super) NaiveDate);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.from_utc_datetime(&self.0.and_hms_opt(9, 0, 0).expect("valid time"))
        }
    }

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date")
    }

    pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    pub(super) fn seeded_store() -> MemoryLeaveStore {
        let store = MemoryLeaveStore::new();
        for (id, name) in [
            ("emp-100", "Asha Verma"),
            ("emp-101", "Luis Ortega"),
            ("emp-102", "Mina Park"),
            ("emp-103", "Tomás Silva"),
            ("emp-104", "Ruth Adler"),
        ] {
            store.insert_employee(Employee {
                employee_id: EmployeeId(id.to_string()),
                full_name: name.to_string(),
                department: "Engineering".to_string(),
                hire_date: date(2020, 1, 15),
                org_id: None,
                is_active: true,
            });
        }
        store.insert_balance(
            &EmployeeId("emp-100".to_string()),
            BalanceSnapshot {
                leave_type: "vacation".to_string(),
                year: 2025,
                entitlement: 20.0,
                carried_forward: 0.0,
                used_days: 4.0,
                pending_days: 0.0,
            },
        );
        store
    }

    pub(super) fn with_colleagues_on_leave(store: &MemoryLeaveStore) {
        for id in ["emp-101", "emp-102"] {
            store.insert_leave(
                &EmployeeId(id.to_string()),
                "Annual Leave",
                date(2025, 7, 7),
                date(2025, 7, 11),
                5.0,
                LeaveStatus::Approved,
            );
        }
    }

    pub(super) fn with_blackout(store: &MemoryLeaveStore) {
        store.insert_blackout(BlackoutEntry {
            name: "Release freeze".to_string(),
            start_date: date(2025, 7, 10),
            end_date: date(2025, 7, 15),
        });
    }

    pub(super) fn service(
        store: MemoryLeaveStore,
        policy: MemoryPolicyStore,
    ) -> LeaveDecisionService<MemoryLeaveStore, MemoryPolicyStore> {
        LeaveDecisionService::new(
            Arc::new(store),
            Arc::new(policy),
            Duration::from_secs(300),
            Arc::new(FixedClock(today())),
        )
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use leave_ai::workflows::leave::{
    leave_router, AnalyzeRequest, DecisionStatus, EmployeeId, LeaveStore, MemoryPolicyStore,
    OrgId,
};

use common::{date, seeded_store, service, with_blackout, with_colleagues_on_leave};

fn annual_payload() -> Value {
    json!({
        "employee_id": "emp-100",
        "leave_type": "Annual Leave",
        "start_date": "2025-07-07",
        "end_date": "2025-07-11"
    })
}

async fn post_json(router: axum::Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&body).expect("json payload"))
}

#[tokio::test]
async fn approved_requests_update_the_audit_trail_and_balance() {
    let store = seeded_store();
    let router = leave_router(Arc::new(service(store.clone(), MemoryPolicyStore::new())));

    let (status, body) = post_json(router, "/api/v1/leave/analyze", annual_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["decision"]["decision_reason"], "All constraints satisfied");

    let audits = store.audits();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, DecisionStatus::Approved);

    let balance = store
        .fetch_balance(&EmployeeId("emp-100".to_string()), "vacation", 2025)
        .expect("store reachable")
        .expect("balance row present");
    assert_eq!(balance.used_days, 9.0);
}

#[tokio::test]
async fn blackout_overlaps_block_annual_leave() {
    let store = seeded_store();
    with_blackout(&store);
    let router = leave_router(Arc::new(service(store.clone(), MemoryPolicyStore::new())));

    let (status, body) = post_json(router, "/api/v1/leave/analyze", annual_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ESCALATE_TO_HR");
    assert_eq!(body["decision"]["approved"], json!(false));
    let violated: Vec<&str> = body["decision"]["violations"]
        .as_array()
        .expect("violations array")
        .iter()
        .map(|violation| violation["rule_id"].as_str().expect("rule id"))
        .collect();
    assert!(violated.contains(&"RULE005"));
    let suggestions = body["suggestions"].as_array().expect("suggestions array");
    assert!(suggestions
        .iter()
        .any(|entry| entry.as_str().expect("text").contains("blackout")));

    // Escalated requests hold the days as pending, not used.
    let balance = store
        .fetch_balance(&EmployeeId("emp-100".to_string()), "vacation", 2025)
        .expect("store reachable")
        .expect("balance row present");
    assert_eq!(balance.used_days, 4.0);
    assert_eq!(balance.pending_days, 5.0);
}

#[tokio::test]
async fn depleted_coverage_triggers_team_rules() {
    let store = seeded_store();
    with_colleagues_on_leave(&store);
    let router = leave_router(Arc::new(service(store, MemoryPolicyStore::new())));

    let (_, body) = post_json(router, "/api/v1/leave/analyze", annual_payload()).await;

    let violated: Vec<&str> = body["decision"]["violations"]
        .as_array()
        .expect("violations array")
        .iter()
        .map(|violation| violation["rule_id"].as_str().expect("rule id"))
        .collect();
    assert!(violated.contains(&"RULE003"));
    assert!(violated.contains(&"RULE004"));
    assert_eq!(body["team_status"]["on_leave"], json!(2));
}

#[test]
fn organization_rules_shape_the_decision_without_http() {
    let org = OrgId("org-42".to_string());
    let policy = MemoryPolicyStore::new();
    policy.set_rules(
        &org,
        json!({
            "RULE900": {
                "name": "Summer review",
                "category": "escalation",
                "is_blocking": true,
                "escalate_always": true
            }
        }),
    );
    let service = service(seeded_store(), policy);

    let response = service
        .analyze(AnalyzeRequest {
            employee_id: "emp-100".to_string(),
            leave_type: "Annual Leave".to_string(),
            start_date: date(2025, 7, 7),
            end_date: date(2025, 7, 11),
            total_days: None,
            is_half_day: false,
            reason: None,
            org_id: Some("org-42".to_string()),
        })
        .expect("valid request");

    assert!(!response.decision.approved);
    assert_eq!(response.status, "ESCALATE_TO_HR");
    assert_eq!(response.decision.violations[0].rule_id, "RULE900");
}
