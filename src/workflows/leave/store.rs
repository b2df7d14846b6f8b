//! Storage boundary for the leave workflow. The engine only ever talks to
//! these traits; the bundled in-memory implementation backs the demo server
//! and the test suites, and is where a pooled database client would plug in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::domain::{
    ranges_overlap, BalanceSnapshot, BlackoutEntry, Employee, EmployeeId, LeaveOverlap,
    LeaveRequest, LeaveRequestId, OrgId,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored data malformed: {0}")]
    Malformed(String),
}

/// Terminal status a decision writes back to the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Escalated,
}

impl DecisionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DecisionStatus::Approved => "approved",
            DecisionStatus::Escalated => "escalated",
        }
    }
}

/// Status of a logged leave request. Roster and quota queries count
/// `Approved` and `Pending` rows; escalated requests sit with HR and are
/// not treated as consuming coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Approved,
    Pending,
    Escalated,
}

impl LeaveStatus {
    fn counts_as_taken(self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Pending)
    }
}

impl From<DecisionStatus> for LeaveStatus {
    fn from(status: DecisionStatus) -> Self {
        match status {
            DecisionStatus::Approved => LeaveStatus::Approved,
            DecisionStatus::Escalated => LeaveStatus::Escalated,
        }
    }
}

/// Audit row capturing a request together with the full decision payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: LeaveRequestId,
    pub request: LeaveRequest,
    pub status: DecisionStatus,
    pub decision: Value,
}

/// Read/write interface for employee, balance, roster, and calendar data.
pub trait LeaveStore: Send + Sync {
    fn fetch_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError>;

    fn fetch_balance(
        &self,
        id: &EmployeeId,
        leave_type_key: &str,
        year: i32,
    ) -> Result<Option<BalanceSnapshot>, StoreError>;

    /// Lazily materialize a missing balance row. Idempotent: an existing
    /// row is left untouched.
    fn seed_balance(&self, id: &EmployeeId, snapshot: BalanceSnapshot)
        -> Result<(), StoreError>;

    /// Count of active employees in the coverage unit.
    fn department_size(&self, department: &str) -> Result<u32, StoreError>;

    /// Approved/pending leave of other unit members overlapping the range
    /// `[start, end]` inclusive.
    fn overlapping_leave(
        &self,
        department: &str,
        exclude: &EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveOverlap>, StoreError>;

    fn blackouts_overlapping(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlackoutEntry>, StoreError>;

    /// Sum of `total_days` for the employee's approved/pending requests
    /// starting in the given calendar month.
    fn monthly_leave_total(
        &self,
        id: &EmployeeId,
        month: u32,
        year: i32,
    ) -> Result<f64, StoreError>;

    /// Persist the audit record, log the request, and apply the balance
    /// side effect (approved -> used days, escalated -> pending days) as one
    /// atomic operation. A missing balance row is logged, not an error.
    fn record_decision(&self, record: AuditRecord) -> Result<LeaveRequestId, StoreError>;
}

/// Read interface for per-organization rule overrides.
pub trait PolicyStore: Send + Sync {
    /// Most recently updated active rule-set JSON for the organization.
    fn fetch_rule_set(&self, org: &OrgId) -> Result<Option<Value>, StoreError>;
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> LeaveRequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeaveRequestId(format!("lr-{id:06}"))
}

#[derive(Debug, Clone)]
struct StoredRequest {
    employee_id: EmployeeId,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: f64,
    status: LeaveStatus,
}

#[derive(Default)]
struct MemoryState {
    employees: HashMap<EmployeeId, Employee>,
    balances: HashMap<(EmployeeId, String, i32), BalanceSnapshot>,
    requests: Vec<StoredRequest>,
    blackouts: Vec<BlackoutEntry>,
    audits: Vec<AuditRecord>,
}

/// Mutex-guarded in-memory store. All decision side effects happen under a
/// single lock acquisition, which is the atomicity guarantee callers need.
#[derive(Default, Clone)]
pub struct MemoryLeaveStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_employee(&self, employee: Employee) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state
            .employees
            .insert(employee.employee_id.clone(), employee);
    }

    pub fn insert_balance(&self, id: &EmployeeId, snapshot: BalanceSnapshot) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.balances.insert(
            (id.clone(), snapshot.leave_type.clone(), snapshot.year),
            snapshot,
        );
    }

    pub fn insert_blackout(&self, entry: BlackoutEntry) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.blackouts.push(entry);
    }

    /// Register an already-standing leave request, e.g. a colleague's
    /// approved vacation, so roster and quota queries see it.
    pub fn insert_leave(
        &self,
        employee_id: &EmployeeId,
        leave_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        total_days: f64,
        status: LeaveStatus,
    ) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.requests.push(StoredRequest {
            employee_id: employee_id.clone(),
            leave_type: leave_type.to_string(),
            start_date: start,
            end_date: end,
            total_days,
            status,
        });
    }

    pub fn audits(&self) -> Vec<AuditRecord> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .audits
            .clone()
    }
}

impl LeaveStore for MemoryLeaveStore {
    fn fetch_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.employees.get(id).cloned())
    }

    fn fetch_balance(
        &self,
        id: &EmployeeId,
        leave_type_key: &str,
        year: i32,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .balances
            .get(&(id.clone(), leave_type_key.to_string(), year))
            .cloned())
    }

    fn seed_balance(
        &self,
        id: &EmployeeId,
        snapshot: BalanceSnapshot,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let key = (id.clone(), snapshot.leave_type.clone(), snapshot.year);
        state.balances.entry(key).or_insert(snapshot);
        Ok(())
    }

    fn department_size(&self, department: &str) -> Result<u32, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .employees
            .values()
            .filter(|employee| employee.is_active && employee.department == department)
            .count() as u32)
    }

    fn overlapping_leave(
        &self,
        department: &str,
        exclude: &EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveOverlap>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut overlaps = Vec::new();
        for request in &state.requests {
            if request.employee_id == *exclude {
                continue;
            }
            if !request.status.counts_as_taken() {
                continue;
            }
            if !ranges_overlap(start, end, request.start_date, request.end_date) {
                continue;
            }
            let Some(employee) = state.employees.get(&request.employee_id) else {
                continue;
            };
            if employee.department != department {
                continue;
            }
            overlaps.push(LeaveOverlap {
                employee_id: request.employee_id.clone(),
                full_name: employee.full_name.clone(),
                leave_type: request.leave_type.clone(),
                start_date: request.start_date,
                end_date: request.end_date,
            });
        }
        Ok(overlaps)
    }

    fn blackouts_overlapping(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlackoutEntry>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .blackouts
            .iter()
            .filter(|entry| ranges_overlap(start, end, entry.start_date, entry.end_date))
            .cloned()
            .collect())
    }

    fn monthly_leave_total(
        &self,
        id: &EmployeeId,
        month: u32,
        year: i32,
    ) -> Result<f64, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .requests
            .iter()
            .filter(|request| {
                request.employee_id == *id
                    && request.status.counts_as_taken()
                    && request.start_date.month() == month
                    && request.start_date.year() == year
            })
            .map(|request| request.total_days)
            .sum())
    }

    fn record_decision(&self, mut record: AuditRecord) -> Result<LeaveRequestId, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let request_id = next_request_id();
        record.request_id = request_id.clone();

        state.requests.push(StoredRequest {
            employee_id: record.request.employee_id.clone(),
            leave_type: record.request.leave_type.clone(),
            start_date: record.request.start_date,
            end_date: record.request.end_date,
            total_days: record.request.total_days,
            status: record.status.into(),
        });

        let balance_key = (
            record.request.employee_id.clone(),
            record.request.balance_key(),
            record.request.start_date.year(),
        );
        match state.balances.get_mut(&balance_key) {
            Some(balance) => match record.status {
                DecisionStatus::Approved => balance.used_days += record.request.total_days,
                DecisionStatus::Escalated => balance.pending_days += record.request.total_days,
            },
            None => {
                warn!(
                    employee = %record.request.employee_id.0,
                    leave_type = %record.request.leave_type,
                    "no balance row to update for decided request"
                );
            }
        }

        state.audits.push(record);
        Ok(request_id)
    }
}

/// In-memory override store keyed by organization id.
#[derive(Default, Clone)]
pub struct MemoryPolicyStore {
    rule_sets: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rules(&self, org: &OrgId, rules: Value) {
        self.rule_sets
            .lock()
            .expect("policy mutex poisoned")
            .insert(org.0.clone(), rules);
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn fetch_rule_set(&self, org: &OrgId) -> Result<Option<Value>, StoreError> {
        Ok(self
            .rule_sets
            .lock()
            .expect("policy mutex poisoned")
            .get(&org.0)
            .cloned())
    }
}
