//! Dynamic evaluation of organization-authored rules. The rule's category
//! selects which configuration fields are interpreted; a rule whose config
//! carries nothing interpretable is skipped rather than guessed at.

use chrono::Datelike;
use serde_json::{json, Value};

use crate::workflows::leave::catalog::{
    CustomRuleConfig, Rule, RuleCategory, RuleConfig, ThresholdCondition,
};
use crate::workflows::leave::domain::{EvaluationContext, LeaveRequest, RuleResult};

use super::checks::months_between;

/// Outcome of one interpreted constraint within a custom rule. A note
/// annotates the result without failing it.
enum Verdict {
    Pass,
    Note(Vec<(&'static str, Value)>),
    Fail {
        message: String,
        details: Vec<(&'static str, Value)>,
    },
}

pub fn evaluate_custom(
    rule: &Rule,
    request: &LeaveRequest,
    ctx: &EvaluationContext,
) -> RuleResult {
    let RuleConfig::Custom(config) = &rule.config else {
        return RuleResult::skip(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "Custom rule carries no custom configuration".to_string(),
        );
    };

    // Scope gate: a rule limited to other leave types does not apply here.
    if !config.applies_to_types.is_empty()
        && !config
            .applies_to_types
            .iter()
            .any(|leave_type| leave_type == &request.leave_type)
    {
        return RuleResult::skip(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("Rule does not apply to {}", request.leave_type),
        );
    }
    if config
        .excluded_types
        .iter()
        .any(|leave_type| leave_type == &request.leave_type)
    {
        return RuleResult::skip(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} is excluded from this rule", request.leave_type),
        );
    }

    let mut verdicts: Vec<Verdict> = Vec::new();
    let checks: Vec<Option<Verdict>> = match rule.category {
        RuleCategory::Limits | RuleCategory::Business | RuleCategory::Compliance => {
            vec![check_max_days(config, request), check_min_days(config, request)]
        }
        RuleCategory::Blackout => vec![
            check_blocked_dates(config, request),
            check_blocked_days(config, request),
        ],
        RuleCategory::Notice => vec![check_notice(config, request, ctx)],
        RuleCategory::Coverage => vec![
            check_team_available(config, ctx),
            check_max_concurrent(config, ctx),
        ],
        RuleCategory::Eligibility => {
            vec![check_tenure(config, ctx), check_departments(config, ctx)]
        }
        RuleCategory::Escalation => vec![
            check_escalate_always(config),
            check_escalate_above(config, request),
        ],
        RuleCategory::Documentation => vec![check_documentation(config, request)],
        RuleCategory::Balance | RuleCategory::Calculation => Vec::new(),
    };
    verdicts.extend(checks.into_iter().flatten());

    // The generic threshold applies on top of any category.
    verdicts.extend(check_threshold(config, request));

    if verdicts.is_empty() {
        return RuleResult::skip(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "Rule configuration has nothing to evaluate".to_string(),
        );
    }

    let mut details: Vec<(&'static str, Value)> = Vec::new();
    let mut failure: Option<String> = None;
    for verdict in verdicts {
        match verdict {
            Verdict::Pass => {}
            Verdict::Note(mut noted) => details.append(&mut noted),
            Verdict::Fail {
                message,
                details: mut noted,
            } => {
                details.append(&mut noted);
                failure.get_or_insert(message);
            }
        }
    }

    let documents_noted = details.iter().any(|(key, _)| *key == "documents_required");
    let mut result = match failure {
        Some(default_message) => {
            let message = config
                .custom_message
                .clone()
                .unwrap_or(default_message);
            RuleResult::fail(&rule.id, &rule.name, rule.is_blocking, message)
        }
        None if documents_noted => RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{}: supporting documents required", rule.name),
        ),
        None => RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} satisfied", rule.name),
        ),
    };
    result = result.with_detail("category", json!(rule.category.as_str()));
    for (key, value) in details {
        result = result.with_detail(key, value);
    }
    result
}

fn check_max_days(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    let max = config.max_days?;
    Some(if request.total_days > max {
        Verdict::Fail {
            message: format!(
                "Requested {} days exceeds the {} day limit",
                request.total_days, max
            ),
            details: vec![("limit", json!(max)), ("requested", json!(request.total_days))],
        }
    } else {
        Verdict::Pass
    })
}

fn check_min_days(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    let min = config.min_days?;
    Some(if request.total_days < min {
        Verdict::Fail {
            message: format!(
                "Requested {} days is below the {} day minimum",
                request.total_days, min
            ),
            details: vec![
                ("minimum", json!(min)),
                ("requested", json!(request.total_days)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

fn check_blocked_dates(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    if config.blocked_dates.is_empty() {
        return None;
    }
    let hit = config
        .blocked_dates
        .iter()
        .find(|date| **date >= request.start_date && **date <= request.end_date);
    Some(match hit {
        Some(date) => Verdict::Fail {
            message: format!("Leave not permitted on {date}"),
            details: vec![("blocked_date", json!(date))],
        },
        None => Verdict::Pass,
    })
}

fn check_blocked_days(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    if config.blocked_days.is_empty() {
        return None;
    }
    let mut day = request.start_date;
    while day <= request.end_date {
        let weekday = weekday_name(day);
        if config
            .blocked_days
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(weekday))
        {
            return Some(Verdict::Fail {
                message: format!("Leave not permitted on {weekday}s"),
                details: vec![("blocked_day", json!(weekday))],
            });
        }
        day = day.succ_opt()?;
    }
    Some(Verdict::Pass)
}

fn check_notice(
    config: &CustomRuleConfig,
    request: &LeaveRequest,
    ctx: &EvaluationContext,
) -> Option<Verdict> {
    let required = config.min_notice_days?;
    let given = (request.start_date - ctx.today).num_days();
    Some(if given < required {
        Verdict::Fail {
            message: format!("Only {given} days notice given, {required} required"),
            details: vec![
                ("required_notice", json!(required)),
                ("actual_notice", json!(given)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

fn check_team_available(config: &CustomRuleConfig, ctx: &EvaluationContext) -> Option<Verdict> {
    let min = config.min_team_available?;
    let available = ctx.team.would_be_available();
    Some(if available < min {
        Verdict::Fail {
            message: format!(
                "Only {available} team members would remain, minimum is {min}"
            ),
            details: vec![
                ("min_required", json!(min)),
                ("would_be_available", json!(available)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

fn check_max_concurrent(config: &CustomRuleConfig, ctx: &EvaluationContext) -> Option<Verdict> {
    let max = config.max_concurrent?;
    Some(if ctx.team.on_leave >= max {
        Verdict::Fail {
            message: format!(
                "{} team members already on leave, maximum is {max}",
                ctx.team.on_leave
            ),
            details: vec![
                ("max_concurrent", json!(max)),
                ("would_be_on_leave", json!(ctx.team.on_leave + 1)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

fn check_tenure(config: &CustomRuleConfig, ctx: &EvaluationContext) -> Option<Verdict> {
    let required = config.min_tenure_months?;
    let employee = ctx.employee.as_ref()?;
    let tenure = months_between(employee.hire_date, ctx.today);
    Some(if tenure < required as i64 {
        Verdict::Fail {
            message: format!(
                "Requires {required} months tenure, employee has {tenure}"
            ),
            details: vec![
                ("required_months", json!(required)),
                ("current_months", json!(tenure)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

fn check_departments(config: &CustomRuleConfig, ctx: &EvaluationContext) -> Option<Verdict> {
    if config.allowed_departments.is_empty() && config.blocked_departments.is_empty() {
        return None;
    }
    let employee = ctx.employee.as_ref()?;
    if config
        .blocked_departments
        .iter()
        .any(|department| department == &employee.department)
    {
        return Some(Verdict::Fail {
            message: format!("Not available to the {} department", employee.department),
            details: vec![("department", json!(employee.department))],
        });
    }
    if !config.allowed_departments.is_empty()
        && !config
            .allowed_departments
            .iter()
            .any(|department| department == &employee.department)
    {
        return Some(Verdict::Fail {
            message: format!("Only available to: {}", config.allowed_departments.join(", ")),
            details: vec![("department", json!(employee.department))],
        });
    }
    Some(Verdict::Pass)
}

fn check_escalate_always(config: &CustomRuleConfig) -> Option<Verdict> {
    if !config.escalate_always {
        return None;
    }
    Some(Verdict::Fail {
        message: "This leave type always requires review".to_string(),
        details: vec![("escalation_reason", json!("Always requires review"))],
    })
}

fn check_escalate_above(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    let above = config.escalate_above_days?;
    Some(if request.total_days > above {
        Verdict::Fail {
            message: format!("Requests above {above} days require review"),
            details: vec![
                ("threshold_days", json!(above)),
                ("requested_days", json!(request.total_days)),
            ],
        }
    } else {
        Verdict::Pass
    })
}

/// Documentation rules never fail: nothing in the request says whether a
/// document is attached, so the result only flags that one is required.
fn check_documentation(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    if config.always_require {
        return Some(Verdict::Note(vec![
            ("documents_required", json!(true)),
            ("requirement_reason", json!("Always required")),
        ]));
    }
    let above = config.require_above_days?;
    Some(if request.total_days > above {
        Verdict::Note(vec![
            ("documents_required", json!(true)),
            (
                "requirement_reason",
                json!(format!("Required for leaves over {above} days")),
            ),
        ])
    } else {
        Verdict::Pass
    })
}

/// Generic threshold on requested days, for rules that only carry a
/// comparison.
fn check_threshold(config: &CustomRuleConfig, request: &LeaveRequest) -> Option<Verdict> {
    let threshold = config.threshold?;
    let condition = config.condition?;
    let breached = match condition {
        ThresholdCondition::GreaterThan => request.total_days > threshold,
        ThresholdCondition::LessThan => request.total_days < threshold,
        ThresholdCondition::Equals => request.total_days == threshold,
    };
    Some(if breached {
        Verdict::Fail {
            message: format!(
                "Requested days breach the configured threshold of {threshold}"
            ),
            details: Vec::new(),
        }
    } else {
        Verdict::Pass
    })
}

fn weekday_name(date: chrono::NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}
