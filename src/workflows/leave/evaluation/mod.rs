//! Constraint evaluation: runs every applicable rule against a request and
//! folds the results into a single [`Decision`].

pub mod checks;
pub mod custom;

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::debug;

use super::catalog::Rule;
use super::domain::{Decision, EvaluationContext, LeaveRequest, Recommendation, RuleResult};

type Evaluator = fn(&Rule, &LeaveRequest, &EvaluationContext) -> RuleResult;

/// Built-in evaluator for a catalog rule id. Catalog entries without one
/// (informational rules applied elsewhere in the leave lifecycle) are
/// reported as skipped.
fn evaluator_for(rule: &Rule) -> Option<Evaluator> {
    match rule.id.as_str() {
        "RULE001" => Some(checks::max_duration),
        "RULE002" => Some(checks::balance_check),
        "RULE003" => Some(checks::team_coverage),
        "RULE004" => Some(checks::max_concurrent),
        "RULE005" => Some(checks::blackout_period),
        "RULE006" => Some(checks::advance_notice),
        "RULE007" => Some(checks::consecutive_limit),
        "RULE010" => Some(checks::probation_restriction),
        "RULE012" => Some(checks::document_requirement),
        "RULE013" => Some(checks::monthly_quota),
        "RULE014" => Some(checks::half_day_escalation),
        _ if rule.is_custom => Some(custom::evaluate_custom),
        _ => None,
    }
}

/// Stateless rule runner. All inputs arrive through the rule map and the
/// gathered context, so evaluation is deterministic and freely testable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstraintEngine;

impl ConstraintEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every rule, highest priority first, and aggregate. A
    /// request is approved exactly when no blocking rule failed; failed
    /// non-blocking rules surface as warnings and never withhold approval
    /// on their own.
    pub fn evaluate(
        &self,
        rules: &BTreeMap<String, Rule>,
        request: &LeaveRequest,
        ctx: &EvaluationContext,
        started: Instant,
    ) -> Decision {
        let mut ordered: Vec<&Rule> = rules.values().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut all_checks = Vec::with_capacity(ordered.len());
        for rule in ordered {
            let result = match evaluator_for(rule) {
                Some(evaluate) => evaluate(rule, request, ctx),
                None => RuleResult::skip(
                    &rule.id,
                    &rule.name,
                    rule.is_blocking,
                    "Not evaluated automatically".to_string(),
                ),
            };
            debug!(
                rule = %result.rule_id,
                passed = result.passed,
                skipped = result.skipped,
                "evaluated constraint"
            );
            all_checks.push(result);
        }

        let mut passed_rules = Vec::new();
        let mut skipped_rules = Vec::new();
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        for result in &all_checks {
            if result.skipped {
                skipped_rules.push(result.rule_id.clone());
            } else if result.passed {
                passed_rules.push(result.rule_id.clone());
            } else if result.is_blocking {
                violations.push(result.clone());
            } else {
                warnings.push(result.clone());
            }
        }

        let approved = violations.is_empty();
        let recommendation = if approved {
            Recommendation::Approve
        } else {
            Recommendation::Escalate
        };
        let decision_reason = if approved {
            "All constraints satisfied".to_string()
        } else {
            format!("{} blocking constraint(s) violated", violations.len())
        };

        Decision {
            approved,
            recommendation,
            passed_rules,
            violations,
            warnings,
            skipped_rules,
            all_checks,
            decision_reason,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            degraded: ctx.degraded,
            unavailable_sources: ctx
                .unavailable_sources
                .iter()
                .map(|source| source.to_string())
                .collect(),
        }
    }
}
