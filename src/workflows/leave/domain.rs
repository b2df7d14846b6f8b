use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for employees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

/// Identifier wrapper for the organization owning a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

/// Identifier assigned to a persisted leave request audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaveRequestId(pub String);

/// A leave request as the engine evaluates it. Immutable once built; the
/// service constructs it from caller input and never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub employee_id: EmployeeId,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whole days, or 0.5 for a half-day request.
    pub total_days: f64,
    pub is_half_day: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub org_id: Option<OrgId>,
}

impl LeaveRequest {
    /// Normalized key used by the balance store ("Annual Leave" -> "vacation").
    pub fn balance_key(&self) -> String {
        balance_key(&self.leave_type)
    }

    /// True when any of the three half-day triggers fires: the explicit
    /// flag, a "half" substring in the type label, or an exact 0.5 day count.
    pub fn half_day_detected(&self) -> bool {
        self.is_half_day
            || self.leave_type.to_lowercase().contains("half")
            || self.total_days == 0.5
    }
}

/// Map a display leave type onto the store's balance key.
pub fn balance_key(leave_type: &str) -> String {
    match leave_type {
        "Annual Leave" => "vacation".to_string(),
        "Sick Leave" => "sick".to_string(),
        "Emergency Leave" => "emergency".to_string(),
        "Personal Leave" => "personal".to_string(),
        "Maternity Leave" => "maternity".to_string(),
        "Paternity Leave" => "paternity".to_string(),
        "Bereavement Leave" => "bereavement".to_string(),
        "Study Leave" => "study".to_string(),
        other => other.to_lowercase().replace(" leave", "").replace(' ', "_"),
    }
}

/// Employee record as read from the directory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub full_name: String,
    pub department: String,
    pub hire_date: NaiveDate,
    #[serde(default)]
    pub org_id: Option<OrgId>,
    pub is_active: bool,
}

/// Current-year balance row for one (employee, leave type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub leave_type: String,
    pub year: i32,
    pub entitlement: f64,
    pub carried_forward: f64,
    pub used_days: f64,
    pub pending_days: f64,
}

impl BalanceSnapshot {
    pub fn available(&self) -> f64 {
        self.entitlement + self.carried_forward - self.used_days - self.pending_days
    }

    /// Default row seeded when no balance record exists yet.
    pub fn seeded(leave_type: &str, year: i32, entitlement: f64) -> Self {
        Self {
            leave_type: leave_type.to_string(),
            year,
            entitlement,
            carried_forward: 0.0,
            used_days: 0.0,
            pending_days: 0.0,
        }
    }
}

/// A colleague's leave overlapping the requested window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveOverlap {
    pub employee_id: EmployeeId,
    pub full_name: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Coverage-unit roster snapshot. The department is the coverage unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStatus {
    pub unit_name: String,
    pub unit_size: u32,
    /// Distinct other members with approved/pending leave overlapping the
    /// requested range.
    pub on_leave: u32,
    pub members_on_leave: Vec<LeaveOverlap>,
}

impl TeamStatus {
    /// Members left working if this request is granted (requester excluded).
    pub fn would_be_available(&self) -> i64 {
        self.unit_size as i64 - self.on_leave as i64 - 1
    }

    pub fn coverage_percent(&self) -> i64 {
        if self.unit_size == 0 {
            return 0;
        }
        ((self.would_be_available() as f64 / self.unit_size as f64) * 100.0).round() as i64
    }

    /// Fallback when the roster cannot be read: a team of one, nobody away.
    pub fn solo(unit_name: &str) -> Self {
        Self {
            unit_name: unit_name.to_string(),
            unit_size: 1,
            on_leave: 0,
            members_on_leave: Vec::new(),
        }
    }
}

/// Company calendar entry during which leave is restricted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackoutEntry {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Everything the evaluators read. Built once per request and discarded
/// after the decision; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    pub today: NaiveDate,
    pub employee: Option<Employee>,
    pub balance: BalanceSnapshot,
    pub team: TeamStatus,
    pub blackouts: Vec<BlackoutEntry>,
    pub monthly_used: f64,
    /// Set when any data source could not be read and a conservative
    /// default was substituted. Lets callers tell "genuinely passed" from
    /// "passed on defaults".
    pub degraded: bool,
    pub unavailable_sources: Vec<&'static str>,
}

/// Per-rule outcome. `details` stays an open map for audit fidelity; each
/// evaluator documents the keys it always writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub passed: bool,
    pub is_blocking: bool,
    #[serde(default)]
    pub skipped: bool,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl RuleResult {
    pub fn pass(rule_id: &str, rule_name: &str, is_blocking: bool, message: String) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            passed: true,
            is_blocking,
            skipped: false,
            message,
            details: BTreeMap::new(),
        }
    }

    pub fn fail(rule_id: &str, rule_name: &str, is_blocking: bool, message: String) -> Self {
        Self {
            passed: false,
            ..Self::pass(rule_id, rule_name, is_blocking, message)
        }
    }

    /// Passed-but-not-evaluated, e.g. a disabled or out-of-scope rule.
    pub fn skip(rule_id: &str, rule_name: &str, is_blocking: bool, message: String) -> Self {
        Self {
            skipped: true,
            ..Self::pass(rule_id, rule_name, is_blocking, message)
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Final routing for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Escalate,
}

impl Recommendation {
    pub const fn label(self) -> &'static str {
        match self {
            Recommendation::Approve => "approve",
            Recommendation::Escalate => "escalate",
        }
    }

    pub const fn status_label(self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVED",
            Recommendation::Escalate => "ESCALATE_TO_HR",
        }
    }
}

/// Aggregate of all rule results for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    pub recommendation: Recommendation,
    pub passed_rules: Vec<String>,
    pub violations: Vec<RuleResult>,
    pub warnings: Vec<RuleResult>,
    pub skipped_rules: Vec<String>,
    pub all_checks: Vec<RuleResult>,
    pub decision_reason: String,
    pub processing_time_ms: f64,
    pub degraded: bool,
    pub unavailable_sources: Vec<String>,
}

impl Decision {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Inclusive range-overlap test shared by team, blackout, and custom checks.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    !(b_end < a_start || b_start > a_end)
}
