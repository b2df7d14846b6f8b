//! Turns failed checks into actionable suggestions for the requester.
//! Deterministic: suggestions derive only from the rule results, keep the
//! order the failures occurred in, and are deduplicated and capped.

use serde_json::Value;

use super::domain::RuleResult;

const MAX_SUGGESTIONS: usize = 5;

/// Suggestions for a decision's failed checks, violations first. Duplicate
/// texts are kept once, first occurrence wins, at most [`MAX_SUGGESTIONS`].
pub fn generate_suggestions(violations: &[RuleResult], warnings: &[RuleResult]) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();
    for result in violations.iter().chain(warnings) {
        for suggestion in suggestions_for(result) {
            if suggestions.len() == MAX_SUGGESTIONS {
                return suggestions;
            }
            if !suggestions.contains(&suggestion) {
                suggestions.push(suggestion);
            }
        }
    }
    suggestions
}

fn detail_f64(result: &RuleResult, key: &str) -> Option<f64> {
    result.details.get(key).and_then(Value::as_f64)
}

fn suggestions_for(result: &RuleResult) -> Vec<String> {
    match result.rule_id.as_str() {
        "RULE001" => match detail_f64(result, "max_allowed") {
            Some(max) => vec![format!("Reduce the request to at most {max} days")],
            None => vec!["Reduce the requested duration".to_string()],
        },
        "RULE002" => match detail_f64(result, "available") {
            Some(available) if available > 0.0 => vec![format!(
                "Only {available} days are available; shorten the request or use unpaid leave"
            )],
            _ => vec!["No balance remains for this leave type; consider unpaid leave".to_string()],
        },
        "RULE003" | "RULE004" => {
            vec!["Pick dates when fewer team members are already on leave".to_string()]
        }
        "RULE005" => vec!["Choose dates outside the blackout period".to_string()],
        "RULE006" => match detail_f64(result, "notice_required") {
            Some(required) => vec![format!(
                "Submit the request at least {required} days in advance"
            )],
            None => vec!["Submit the request further in advance".to_string()],
        },
        "RULE007" => vec!["Split the leave into multiple shorter requests".to_string()],
        "RULE010" => {
            vec!["Wait until the probation period completes, or use an eligible leave type"
                .to_string()]
        }
        "RULE013" => vec!["Spread the leave across more than one month".to_string()],
        "RULE014" => vec!["Half-day requests are reviewed by HR before approval".to_string()],
        _ => vec![format!("Review: {}", result.message)],
    }
}
