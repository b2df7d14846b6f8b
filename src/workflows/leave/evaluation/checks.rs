//! Built-in constraint evaluators. Each takes the rule (for its config and
//! blocking flag), the request, and the gathered context, and returns a
//! [`RuleResult`]. Evaluators never abort: an unusable configuration yields
//! a skipped result rather than an error.

use chrono::Datelike;
use serde_json::json;

use crate::workflows::leave::catalog::{Rule, RuleConfig};
use crate::workflows::leave::domain::{EvaluationContext, LeaveRequest, RuleResult};

/// Result when a rule's configuration does not match its evaluator. Counted
/// as skipped so it neither blocks nor silently passes as evaluated.
fn unusable_config(rule: &Rule) -> RuleResult {
    RuleResult::skip(
        &rule.id,
        &rule.name,
        rule.is_blocking,
        "Rule configuration could not be evaluated".to_string(),
    )
}

/// RULE001: requested days against the per-type maximum.
pub fn max_duration(rule: &Rule, request: &LeaveRequest, _ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::DurationLimits(config) = &rule.config else {
        return unusable_config(rule);
    };
    let Some(limit) = config.limits.get(&request.leave_type).copied() else {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("No duration limit configured for {}", request.leave_type),
        );
    };

    let result = if request.total_days > limit {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Requested {} days exceeds maximum {} days for {}",
                request.total_days, limit, request.leave_type
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("Duration {} days within limit of {}", request.total_days, limit),
        )
    };
    result
        .with_detail("requested_days", json!(request.total_days))
        .with_detail("max_allowed", json!(limit))
}

/// RULE002: sufficient balance, with optional negative allowance.
pub fn balance_check(rule: &Rule, request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::Balance(config) = &rule.config else {
        return unusable_config(rule);
    };
    let available = ctx.balance.available();
    let floor = if config.allow_negative {
        -config.negative_limit
    } else {
        0.0
    };

    let result = if available - request.total_days < floor {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Insufficient balance: {} days available, {} requested",
                available, request.total_days
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("Sufficient balance: {} days available", available),
        )
    };
    result
        .with_detail("available", json!(available))
        .with_detail("requested", json!(request.total_days))
        .with_detail("after_approval", json!(available - request.total_days))
}

/// RULE003: minimum coverage in the requester's unit.
pub fn team_coverage(rule: &Rule, _request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::Coverage(config) = &rule.config else {
        return unusable_config(rule);
    };
    let team = &ctx.team;
    let min_required =
        ((team.unit_size as f64 * config.min_coverage_percent / 100.0).round() as i64).max(1);
    let would_be_available = team.would_be_available();

    let result = if would_be_available < min_required {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Team coverage too low: {} of {} members would remain, minimum is {}",
                would_be_available, team.unit_size, min_required
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Adequate coverage: {} of {} members remain available",
                would_be_available, team.unit_size
            ),
        )
    };
    result
        .with_detail("team_size", json!(team.unit_size))
        .with_detail("on_leave", json!(team.on_leave))
        .with_detail("would_be_available", json!(would_be_available))
        .with_detail("min_required", json!(min_required))
        .with_detail("coverage_percent", json!(team.coverage_percent()))
}

/// RULE004: concurrent absences in the unit.
pub fn max_concurrent(rule: &Rule, _request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::Concurrency(config) = &rule.config else {
        return unusable_config(rule);
    };
    let on_leave = ctx.team.on_leave;

    let result = if on_leave >= config.max_concurrent {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "{} team members already on leave, maximum concurrent is {}",
                on_leave, config.max_concurrent
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} team members on leave, within concurrent limit", on_leave),
        )
    };
    result
        .with_detail("current_on_leave", json!(on_leave))
        .with_detail("max_concurrent", json!(config.max_concurrent))
}

/// RULE005: blackout calendar, with exempt leave types.
pub fn blackout_period(rule: &Rule, request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::BlackoutCalendar(config) = &rule.config else {
        return unusable_config(rule);
    };
    if config
        .exception_leave_types
        .iter()
        .any(|exempt| exempt == &request.leave_type)
    {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} is exempt from blackout periods", request.leave_type),
        );
    }

    if ctx.blackouts.is_empty() {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "No blackout period overlaps the requested dates".to_string(),
        );
    }

    let names: Vec<&str> = ctx.blackouts.iter().map(|entry| entry.name.as_str()).collect();
    RuleResult::fail(
        &rule.id,
        &rule.name,
        rule.is_blocking,
        format!("Requested dates fall in blackout period: {}", names.join(", ")),
    )
    .with_detail(
        "blackout_periods",
        serde_json::to_value(&ctx.blackouts).unwrap_or_default(),
    )
}

/// RULE006: advance notice. A required notice of zero days exempts the type.
pub fn advance_notice(rule: &Rule, request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::Notice(config) = &rule.config else {
        return unusable_config(rule);
    };
    let required = config
        .notice_days
        .get(&request.leave_type)
        .copied()
        .unwrap_or(0);
    if required == 0 {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} requires no advance notice", request.leave_type),
        );
    }

    let given = (request.start_date - ctx.today).num_days();
    let result = if given < required {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Only {} days notice given, {} requires {} days",
                given, request.leave_type, required
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} days notice given, {} required", given, required),
        )
    };
    result
        .with_detail("notice_given", json!(given))
        .with_detail("notice_required", json!(required))
}

/// RULE007: consecutive-day ceiling per leave type.
pub fn consecutive_limit(
    rule: &Rule,
    request: &LeaveRequest,
    _ctx: &EvaluationContext,
) -> RuleResult {
    let RuleConfig::Consecutive(config) = &rule.config else {
        return unusable_config(rule);
    };
    let Some(limit) = config.max_consecutive.get(&request.leave_type).copied() else {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("No consecutive-day limit for {}", request.leave_type),
        );
    };

    let result = if request.total_days > limit {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "{} consecutive days exceeds the {} day limit for {}",
                request.total_days, limit, request.leave_type
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} consecutive days within the {} day limit", request.total_days, limit),
        )
    };
    result
        .with_detail("requested_days", json!(request.total_days))
        .with_detail("max_consecutive", json!(limit))
}

/// RULE010: restricted leave types during probation. Without an employee
/// record the tenure is unknown and the rule is skipped.
pub fn probation_restriction(
    rule: &Rule,
    request: &LeaveRequest,
    ctx: &EvaluationContext,
) -> RuleResult {
    let RuleConfig::Probation(config) = &rule.config else {
        return unusable_config(rule);
    };
    let Some(employee) = &ctx.employee else {
        return RuleResult::skip(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "Employee record unavailable, probation status unknown".to_string(),
        );
    };

    let tenure = months_between(employee.hire_date, ctx.today);
    if tenure >= config.probation_months as i64 {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("Probation completed ({} months tenure)", tenure),
        )
        .with_detail("tenure_months", json!(tenure))
        .with_detail("probation_months", json!(config.probation_months));
    }

    let restricted = config
        .restricted_types
        .iter()
        .any(|restricted| restricted == &request.leave_type);
    let result = if restricted {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "{} is not available during probation ({} of {} months served)",
                request.leave_type, tenure, config.probation_months
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} is permitted during probation", request.leave_type),
        )
    };
    result
        .with_detail("tenure_months", json!(tenure))
        .with_detail("probation_months", json!(config.probation_months))
}

/// RULE012: flags when a supporting document must accompany the request.
/// Informational: it passes either way, and approvers read the details.
pub fn document_requirement(
    rule: &Rule,
    request: &LeaveRequest,
    _ctx: &EvaluationContext,
) -> RuleResult {
    let RuleConfig::Documentation(config) = &rule.config else {
        return unusable_config(rule);
    };
    let always = config
        .always_require_for
        .iter()
        .any(|leave_type| leave_type == &request.leave_type);
    let above_threshold = request.total_days > config.require_document_above_days;
    let required = always || above_threshold;

    let message = if required {
        format!("Supporting document must accompany this {} request", request.leave_type)
    } else {
        "No supporting document required".to_string()
    };
    RuleResult::pass(&rule.id, &rule.name, rule.is_blocking, message)
        .with_detail("document_required", json!(required))
        .with_detail("document_types", json!(config.document_types))
}

/// RULE013: per-month quota, with exempt leave types.
pub fn monthly_quota(rule: &Rule, request: &LeaveRequest, ctx: &EvaluationContext) -> RuleResult {
    let RuleConfig::MonthlyQuota(config) = &rule.config else {
        return unusable_config(rule);
    };
    if config
        .exception_types
        .iter()
        .any(|exempt| exempt == &request.leave_type)
    {
        return RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("{} is exempt from the monthly quota", request.leave_type),
        );
    }

    let projected = ctx.monthly_used + request.total_days;
    let result = if projected > config.max_per_month {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!(
                "Monthly quota exceeded: {} days used, {} requested, maximum {} per month",
                ctx.monthly_used, request.total_days, config.max_per_month
            ),
        )
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            format!("Within monthly quota ({} of {} days)", projected, config.max_per_month),
        )
    };
    result
        .with_detail("used_this_month", json!(ctx.monthly_used))
        .with_detail("requested", json!(request.total_days))
        .with_detail("max_per_month", json!(config.max_per_month))
}

/// RULE014: half-day requests always route to HR. Fails (non-blocking by
/// default) whenever a half-day is detected, regardless of configuration.
pub fn half_day_escalation(
    rule: &Rule,
    request: &LeaveRequest,
    _ctx: &EvaluationContext,
) -> RuleResult {
    if request.half_day_detected() {
        RuleResult::fail(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "Half-day leave requires HR approval".to_string(),
        )
        .with_detail("half_day", json!(true))
    } else {
        RuleResult::pass(
            &rule.id,
            &rule.name,
            rule.is_blocking,
            "Not a half-day request".to_string(),
        )
    }
}

/// Whole months elapsed between two dates, floored.
pub fn months_between(from: chrono::NaiveDate, to: chrono::NaiveDate) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0)
}
