//! Leave decision service: validates caller input, resolves the applicable
//! rule set, gathers context, evaluates, and records the outcome. The HTTP
//! layer stays thin; everything interesting happens here.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::catalog::Rule;
use super::context::ContextGatherer;
use super::domain::{
    Decision, Employee, EmployeeId, LeaveRequest, LeaveRequestId, OrgId, TeamStatus,
};
use super::evaluation::ConstraintEngine;
use super::registry::{Clock, RuleRegistry};
use super::store::{AuditRecord, DecisionStatus, LeaveStore, PolicyStore};
use super::suggestions::generate_suggestions;

/// Error for caller mistakes. Store failures never surface here; the
/// engine degrades instead.
#[derive(Debug, thiserror::Error)]
pub enum LeaveServiceError {
    #[error("invalid leave request: {0}")]
    InvalidRequest(String),
}

/// Caller input for an analysis. `total_days` may be omitted and is then
/// derived from the date range (or 0.5 for a half-day).
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub employee_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub total_days: Option<f64>,
    #[serde(default)]
    pub is_half_day: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
}

/// Employee summary echoed back with a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeView {
    pub employee_id: EmployeeId,
    pub full_name: String,
    pub department: String,
}

/// Balance before and after a hypothetical approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub leave_type: String,
    pub current_available: f64,
    pub after_approval: f64,
}

/// Full analysis payload returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Present when the decision was persisted.
    pub request_id: Option<LeaveRequestId>,
    pub status: String,
    pub employee: Option<EmployeeView>,
    pub leave_request: LeaveRequest,
    pub decision: Decision,
    pub suggestions: Vec<String>,
    pub balance: BalanceView,
    pub team_status: TeamStatus,
}

/// Rule listing for admin and debugging endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RulesResponse {
    pub source: String,
    pub count: usize,
    pub rules: Vec<Rule>,
}

pub struct LeaveDecisionService<S, P> {
    store: Arc<S>,
    registry: RuleRegistry<P>,
    gatherer: ContextGatherer<S>,
    engine: ConstraintEngine,
}

impl<S: LeaveStore, P: PolicyStore> LeaveDecisionService<S, P> {
    pub fn new(
        store: Arc<S>,
        policy_store: Arc<P>,
        cache_ttl: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: store.clone(),
            registry: RuleRegistry::new(policy_store, cache_ttl, clock.clone()),
            gatherer: ContextGatherer::new(store, clock),
            engine: ConstraintEngine::new(),
        }
    }

    /// Evaluate and persist. The audit write is best-effort: a failed write
    /// is logged and the response carries no request id.
    pub fn analyze(&self, input: AnalyzeRequest) -> Result<DecisionResponse, LeaveServiceError> {
        self.run(input, true)
    }

    /// Evaluate without persisting anything, for what-if checks.
    pub fn validate(&self, input: AnalyzeRequest) -> Result<DecisionResponse, LeaveServiceError> {
        self.run(input, false)
    }

    /// Applicable rules for an organization, or the active defaults.
    pub fn rules(&self, org: Option<&OrgId>) -> RulesResponse {
        let rules = self.registry.rules_for(org);
        RulesResponse {
            source: org
                .map(|org| org.0.clone())
                .unwrap_or_else(|| "default".to_string()),
            count: rules.len(),
            rules: rules.values().cloned().collect(),
        }
    }

    /// Drop the cached rule set for one organization, or all of them.
    pub fn clear_rule_cache(&self, org: Option<&OrgId>) {
        self.registry.invalidate(org);
        info!(org = org.map(|org| org.0.as_str()).unwrap_or("all"), "rule cache cleared");
    }

    fn run(
        &self,
        input: AnalyzeRequest,
        persist: bool,
    ) -> Result<DecisionResponse, LeaveServiceError> {
        let started = Instant::now();
        let request = self.build_request(input)?;

        // Single employee lookup: the same fetch result drives org
        // resolution and the context's degradation tracking.
        let employee = self.store.fetch_employee(&request.employee_id);
        let org = request.org_id.clone().or_else(|| {
            employee
                .as_ref()
                .ok()
                .and_then(|found| found.as_ref())
                .and_then(|employee| employee.org_id.clone())
        });

        let rules = self.registry.rules_for(org.as_ref());
        let ctx = self.gatherer.gather(&request, &rules, employee);
        let decision = self.engine.evaluate(&rules, &request, &ctx, started);
        let suggestions = generate_suggestions(&decision.violations, &decision.warnings);

        let available = ctx.balance.available();
        let balance = BalanceView {
            leave_type: ctx.balance.leave_type.clone(),
            current_available: available,
            after_approval: available - request.total_days,
        };

        let status = match decision.recommendation {
            super::domain::Recommendation::Approve => DecisionStatus::Approved,
            super::domain::Recommendation::Escalate => DecisionStatus::Escalated,
        };

        let request_id = if persist {
            self.persist(&request, status, &decision)
        } else {
            None
        };

        info!(
            employee = %request.employee_id.0,
            leave_type = %request.leave_type,
            approved = decision.approved,
            recommendation = decision.recommendation.label(),
            violations = decision.violations.len(),
            "leave request analyzed"
        );

        Ok(DecisionResponse {
            request_id,
            status: decision.recommendation.status_label().to_string(),
            employee: ctx.employee.as_ref().map(employee_view),
            leave_request: request,
            decision,
            suggestions,
            balance,
            team_status: ctx.team,
        })
    }

    fn persist(
        &self,
        request: &LeaveRequest,
        status: DecisionStatus,
        decision: &Decision,
    ) -> Option<LeaveRequestId> {
        let record = AuditRecord {
            request_id: LeaveRequestId(String::new()),
            request: request.clone(),
            status,
            decision: serde_json::to_value(decision).unwrap_or_default(),
        };
        match self.store.record_decision(record) {
            Ok(request_id) => Some(request_id),
            Err(err) => {
                warn!(employee = %request.employee_id.0, error = %err, "failed to persist decision");
                None
            }
        }
    }

    fn build_request(&self, input: AnalyzeRequest) -> Result<LeaveRequest, LeaveServiceError> {
        if input.employee_id.trim().is_empty() {
            return Err(LeaveServiceError::InvalidRequest(
                "employee_id must not be empty".to_string(),
            ));
        }
        if input.leave_type.trim().is_empty() {
            return Err(LeaveServiceError::InvalidRequest(
                "leave_type must not be empty".to_string(),
            ));
        }
        if input.end_date < input.start_date {
            return Err(LeaveServiceError::InvalidRequest(
                "end_date must not precede start_date".to_string(),
            ));
        }

        let span_days = (input.end_date - input.start_date).num_days() as f64 + 1.0;
        let total_days = match input.total_days {
            Some(days) => days,
            None if input.is_half_day => 0.5,
            None => span_days,
        };
        if total_days <= 0.0 {
            return Err(LeaveServiceError::InvalidRequest(
                "total_days must be positive".to_string(),
            ));
        }
        if total_days > span_days {
            return Err(LeaveServiceError::InvalidRequest(format!(
                "total_days {} exceeds the {} day date range",
                total_days, span_days
            )));
        }

        Ok(LeaveRequest {
            employee_id: EmployeeId(input.employee_id),
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            total_days,
            is_half_day: input.is_half_day,
            reason: input.reason,
            org_id: input.org_id.map(OrgId),
        })
    }
}

fn employee_view(employee: &Employee) -> EmployeeView {
    EmployeeView {
        employee_id: employee.employee_id.clone(),
        full_name: employee.full_name.clone(),
        department: employee.department.clone(),
    }
}
