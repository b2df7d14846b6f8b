//! Leave request analysis: rule catalog and per-organization overrides,
//! context gathering, constraint evaluation, and decision recording.

pub mod catalog;
pub mod context;
pub mod domain;
pub mod evaluation;
pub mod registry;
pub mod router;
pub mod service;
pub mod store;
pub mod suggestions;

#[cfg(test)]
mod tests;

pub use catalog::{default_catalog, normalize_rule_set, Rule, RuleCategory, RuleConfig};
pub use context::ContextGatherer;
pub use domain::{
    BalanceSnapshot, BlackoutEntry, Decision, Employee, EmployeeId, EvaluationContext,
    LeaveRequest, LeaveRequestId, OrgId, Recommendation, RuleResult, TeamStatus,
};
pub use evaluation::ConstraintEngine;
pub use registry::{Clock, RuleCache, RuleRegistry, SystemClock};
pub use router::leave_router;
pub use service::{
    AnalyzeRequest, DecisionResponse, LeaveDecisionService, LeaveServiceError, RulesResponse,
};
pub use store::{
    AuditRecord, DecisionStatus, LeaveStatus, LeaveStore, MemoryLeaveStore, MemoryPolicyStore,
    PolicyStore, StoreError,
};
pub use suggestions::generate_suggestions;
