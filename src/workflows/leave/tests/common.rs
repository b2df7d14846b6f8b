use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::leave::catalog::{CustomRuleConfig, Rule, RuleCategory, RuleConfig};
use crate::workflows::leave::context::ContextGatherer;
use crate::workflows::leave::domain::{
    BalanceSnapshot, BlackoutEntry, Decision, Employee, EmployeeId, EvaluationContext,
    LeaveOverlap, LeaveRequest, LeaveRequestId, RuleResult, TeamStatus,
};
use crate::workflows::leave::evaluation::ConstraintEngine;
use crate::workflows::leave::registry::{Clock, RuleRegistry};
use crate::workflows::leave::service::{AnalyzeRequest, LeaveDecisionService};
use crate::workflows::leave::store::{
    AuditRecord, LeaveStore, MemoryLeaveStore, MemoryPolicyStore, StoreError,
};

/// Monday, five weeks before the standard request window.
pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) struct FixedClock(pub(super) NaiveDate);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_hms_opt(9, 0, 0).expect("valid time"))
    }
}

/// Clock whose reading tests can advance, for cache expiry coverage.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(start: NaiveDate) -> Self {
        Self {
            now: Mutex::new(Utc.from_utc_datetime(
                &start.and_hms_opt(9, 0, 0).expect("valid time"),
            )),
        }
    }

    pub(super) fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn employee(id: &str, department: &str, hire_date: NaiveDate) -> Employee {
    Employee {
        employee_id: EmployeeId(id.to_string()),
        full_name: format!("Employee {id}"),
        department: department.to_string(),
        hire_date,
        org_id: None,
        is_active: true,
    }
}

/// Five-person engineering team. `emp-100` is the requester, with 16
/// vacation days available in 2025 (20 entitled, 4 used).
pub(super) fn engineering_store() -> MemoryLeaveStore {
    let store = MemoryLeaveStore::new();
    for id in ["emp-100", "emp-101", "emp-102", "emp-103", "emp-104"] {
        store.insert_employee(employee(id, "Engineering", date(2020, 1, 15)));
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

/// Five week-day annual leave request with five weeks of notice.
pub(super) fn annual_request() -> AnalyzeRequest {
    AnalyzeRequest {
        employee_id: "emp-100".to_string(),
        leave_type: "Annual Leave".to_string(),
        start_date: date(2025, 7, 7),
        end_date: date(2025, 7, 11),
        total_days: None,
        is_half_day: false,
        reason: None,
        org_id: None,
    }
}

pub(super) fn leave_request(
    leave_type: &str,
    start: NaiveDate,
    end: NaiveDate,
    total_days: f64,
) -> LeaveRequest {
    LeaveRequest {
        employee_id: EmployeeId("emp-100".to_string()),
        leave_type: leave_type.to_string(),
        start_date: start,
        end_date: end,
        total_days,
        is_half_day: false,
        reason: None,
        org_id: None,
    }
}

pub(super) fn balance(entitlement: f64, used: f64) -> BalanceSnapshot {
    BalanceSnapshot {
        leave_type: "vacation".to_string(),
        year: 2025,
        entitlement,
        carried_forward: 0.0,
        used_days: used,
        pending_days: 0.0,
    }
}

pub(super) fn team(size: u32, on_leave: u32) -> TeamStatus {
    let members_on_leave = (0..on_leave)
        .map(|index| LeaveOverlap {
            employee_id: EmployeeId(format!("emp-2{index:02}")),
            full_name: format!("Colleague {index}"),
            leave_type: "Annual Leave".to_string(),
            start_date: date(2025, 7, 7),
            end_date: date(2025, 7, 11),
        })
        .collect();
    TeamStatus {
        unit_name: "Engineering".to_string(),
        unit_size: size,
        on_leave,
        members_on_leave,
    }
}

/// Context with sensible defaults for evaluator unit tests.
pub(super) fn context_with(balance: BalanceSnapshot, team: TeamStatus) -> EvaluationContext {
    EvaluationContext {
        today: today(),
        employee: Some(employee("emp-100", "Engineering", date(2020, 1, 15))),
        balance,
        team,
        blackouts: Vec::new(),
        monthly_used: 0.0,
        degraded: false,
        unavailable_sources: Vec::new(),
    }
}

pub(super) fn blackout(name: &str, start: NaiveDate, end: NaiveDate) -> BlackoutEntry {
    BlackoutEntry {
        name: name.to_string(),
        start_date: start,
        end_date: end,
    }
}

pub(super) fn default_rules() -> BTreeMap<String, Rule> {
    RuleRegistry::<MemoryPolicyStore>::active_defaults()
}

pub(super) fn rule(rules: &BTreeMap<String, Rule>, id: &str) -> Rule {
    rules.get(id).cloned().expect("rule present in defaults")
}

pub(super) fn custom_rule(
    id: &str,
    category: RuleCategory,
    is_blocking: bool,
    config: CustomRuleConfig,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("Custom {id}"),
        description: String::new(),
        category,
        is_blocking,
        priority: 55,
        is_active: true,
        is_custom: true,
        config: RuleConfig::Custom(config),
    }
}

/// Gather context and run the default rules for a request against a store.
pub(super) fn evaluate(store: &MemoryLeaveStore, request: &LeaveRequest) -> Decision {
    let rules = default_rules();
    let gatherer = ContextGatherer::new(Arc::new(store.clone()), Arc::new(FixedClock(today())));
    let ctx = gatherer.gather(request, &rules, store.fetch_employee(&request.employee_id));
    ConstraintEngine::new().evaluate(&rules, request, &ctx, Instant::now())
}

pub(super) fn check<'a>(decision: &'a Decision, rule_id: &str) -> &'a RuleResult {
    decision
        .all_checks
        .iter()
        .find(|result| result.rule_id == rule_id)
        .expect("rule evaluated")
}

pub(super) fn build_service(
    store: MemoryLeaveStore,
) -> LeaveDecisionService<MemoryLeaveStore, MemoryPolicyStore> {
    build_service_with(
        store,
        MemoryPolicyStore::new(),
        Duration::from_secs(300),
        Arc::new(FixedClock(today())),
    )
}

pub(super) fn build_service_with(
    store: MemoryLeaveStore,
    policy: MemoryPolicyStore,
    cache_ttl: Duration,
    clock: Arc<dyn Clock>,
) -> LeaveDecisionService<MemoryLeaveStore, MemoryPolicyStore> {
    LeaveDecisionService::new(Arc::new(store), Arc::new(policy), cache_ttl, clock)
}

/// Delegating store that counts employee lookups.
pub(super) struct CountingStore {
    inner: MemoryLeaveStore,
    employee_fetches: AtomicUsize,
}

impl CountingStore {
    pub(super) fn new(inner: MemoryLeaveStore) -> Self {
        Self {
            inner,
            employee_fetches: AtomicUsize::new(0),
        }
    }

    pub(super) fn employee_fetches(&self) -> usize {
        self.employee_fetches.load(Ordering::SeqCst)
    }
}

impl LeaveStore for CountingStore {
    fn fetch_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        self.employee_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_employee(id)
    }

    fn fetch_balance(
        &self,
        id: &EmployeeId,
        leave_type_key: &str,
        year: i32,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        self.inner.fetch_balance(id, leave_type_key, year)
    }

    fn seed_balance(&self, id: &EmployeeId, snapshot: BalanceSnapshot) -> Result<(), StoreError> {
        self.inner.seed_balance(id, snapshot)
    }

    fn department_size(&self, department: &str) -> Result<u32, StoreError> {
        self.inner.department_size(department)
    }

    fn overlapping_leave(
        &self,
        department: &str,
        exclude: &EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveOverlap>, StoreError> {
        self.inner.overlapping_leave(department, exclude, start, end)
    }

    fn blackouts_overlapping(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlackoutEntry>, StoreError> {
        self.inner.blackouts_overlapping(start, end)
    }

    fn monthly_leave_total(
        &self,
        id: &EmployeeId,
        month: u32,
        year: i32,
    ) -> Result<f64, StoreError> {
        self.inner.monthly_leave_total(id, month, year)
    }

    fn record_decision(&self, record: AuditRecord) -> Result<LeaveRequestId, StoreError> {
        self.inner.record_decision(record)
    }
}

/// Store whose every read fails, for fail-soft coverage.
pub(super) struct UnavailableStore;

impl LeaveStore for UnavailableStore {
    fn fetch_employee(&self, _id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_balance(
        &self,
        _id: &EmployeeId,
        _leave_type_key: &str,
        _year: i32,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn seed_balance(
        &self,
        _id: &EmployeeId,
        _snapshot: BalanceSnapshot,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn department_size(&self, _department: &str) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn overlapping_leave(
        &self,
        _department: &str,
        _exclude: &EmployeeId,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<LeaveOverlap>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn blackouts_overlapping(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<BlackoutEntry>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn monthly_leave_total(
        &self,
        _id: &EmployeeId,
        _month: u32,
        _year: i32,
    ) -> Result<f64, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn record_decision(&self, _record: AuditRecord) -> Result<LeaveRequestId, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
