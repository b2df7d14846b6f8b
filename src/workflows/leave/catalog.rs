//! Canonical rule catalog and the normalization layer that turns stored
//! rule-set JSON (nested or legacy flat) into strongly typed [`Rule`]s.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Policy area a rule belongs to; drives dispatch for custom rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Limits,
    Balance,
    Coverage,
    Blackout,
    Notice,
    Calculation,
    Eligibility,
    Documentation,
    Escalation,
    Compliance,
    Business,
}

impl RuleCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleCategory::Limits => "limits",
            RuleCategory::Balance => "balance",
            RuleCategory::Coverage => "coverage",
            RuleCategory::Blackout => "blackout",
            RuleCategory::Notice => "notice",
            RuleCategory::Calculation => "calculation",
            RuleCategory::Eligibility => "eligibility",
            RuleCategory::Documentation => "documentation",
            RuleCategory::Escalation => "escalation",
            RuleCategory::Compliance => "compliance",
            RuleCategory::Business => "business",
        }
    }
}

/// One entry of the policy catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub is_blocking: bool,
    pub priority: u32,
    pub is_active: bool,
    pub is_custom: bool,
    pub config: RuleConfig,
}

/// Category-specific configuration, one variant per catalog rule shape.
/// Stored rule JSON is normalized into these at load time so evaluators
/// never probe loose maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleConfig {
    DurationLimits(DurationLimitsConfig),
    Balance(BalanceConfig),
    Coverage(CoverageConfig),
    Concurrency(ConcurrencyConfig),
    BlackoutCalendar(BlackoutCalendarConfig),
    Notice(NoticeConfig),
    Consecutive(ConsecutiveConfig),
    SandwichCounting(SandwichCountingConfig),
    MinimumGap(MinimumGapConfig),
    Probation(ProbationConfig),
    FreezeWindows(FreezeWindowsConfig),
    Documentation(DocumentationConfig),
    MonthlyQuota(MonthlyQuotaConfig),
    HalfDayEscalation(HalfDayEscalationConfig),
    Custom(CustomRuleConfig),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationLimitsConfig {
    pub limits: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub allow_negative: bool,
    pub negative_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub min_coverage_percent: f64,
    pub applies_to_departments: Vec<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_coverage_percent: 60.0,
            applies_to_departments: vec!["all".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent: u32,
    pub scope: String,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            scope: "department".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackoutCalendarConfig {
    pub exception_leave_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    pub notice_days: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsecutiveConfig {
    pub max_consecutive: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandwichCountingConfig {
    pub enabled: bool,
    pub min_gap_days: i64,
    pub applies_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumGapConfig {
    pub min_gap_days: i64,
    pub applies_to: Vec<String>,
    pub exception_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbationConfig {
    pub probation_months: u32,
    pub allowed_during_probation: Vec<String>,
    pub restricted_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeWindowsConfig {
    pub enabled: bool,
    pub freeze_periods: Vec<FreezePeriod>,
    pub exception_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezePeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentationConfig {
    pub require_document_above_days: f64,
    pub always_require_for: Vec<String>,
    pub document_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyQuotaConfig {
    pub max_per_month: f64,
    pub exception_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalfDayEscalationConfig {
    pub always_escalate: bool,
    pub escalate_to: String,
}

impl Default for HalfDayEscalationConfig {
    fn default() -> Self {
        Self {
            always_escalate: true,
            escalate_to: "hr".to_string(),
        }
    }
}

/// Comparison operator for the generic threshold check on custom rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdCondition {
    GreaterThan,
    LessThan,
    Equals,
}

/// Free-form configuration for organization-authored rules. Every field is
/// optional; the dynamic evaluator interprets whichever are present for the
/// rule's category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomRuleConfig {
    pub max_days: Option<f64>,
    pub min_days: Option<f64>,
    pub applies_to_types: Vec<String>,
    pub excluded_types: Vec<String>,
    pub blocked_dates: Vec<NaiveDate>,
    pub blocked_days: Vec<String>,
    pub min_notice_days: Option<i64>,
    pub min_team_available: Option<i64>,
    pub max_concurrent: Option<u32>,
    pub min_tenure_months: Option<u32>,
    pub allowed_departments: Vec<String>,
    pub blocked_departments: Vec<String>,
    pub escalate_always: bool,
    pub escalate_above_days: Option<f64>,
    pub require_above_days: Option<f64>,
    pub always_require: bool,
    pub threshold: Option<f64>,
    pub condition: Option<ThresholdCondition>,
    pub custom_message: Option<String>,
}

fn day_limits(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, days)| (name.to_string(), *days))
        .collect()
}

fn notice_table(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
    entries
        .iter()
        .map(|(name, days)| (name.to_string(), *days))
        .collect()
}

fn strings(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn rule(
    id: &str,
    name: &str,
    description: &str,
    category: RuleCategory,
    is_blocking: bool,
    priority: u32,
    is_active: bool,
    config: RuleConfig,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        is_blocking,
        priority,
        is_active,
        is_custom: false,
        config,
    }
}

/// The canonical 14-rule default catalog. Organization overrides shadow
/// individual entries; anything missing in an override falls back to the
/// matching entry here.
pub fn default_catalog() -> BTreeMap<String, Rule> {
    let rules = vec![
        rule(
            "RULE001",
            "Maximum Leave Duration",
            "Check if requested days exceed maximum allowed per leave type",
            RuleCategory::Limits,
            true,
            100,
            true,
            RuleConfig::DurationLimits(DurationLimitsConfig {
                limits: day_limits(&[
                    ("Annual Leave", 20.0),
                    ("Sick Leave", 15.0),
                    ("Emergency Leave", 5.0),
                    ("Personal Leave", 5.0),
                    ("Maternity Leave", 180.0),
                    ("Paternity Leave", 15.0),
                    ("Bereavement Leave", 5.0),
                    ("Study Leave", 10.0),
                    ("LWP", 30.0),
                    ("Comp Off", 5.0),
                ]),
            }),
        ),
        rule(
            "RULE002",
            "Leave Balance Check",
            "Verify sufficient leave balance available before approval",
            RuleCategory::Balance,
            true,
            99,
            true,
            RuleConfig::Balance(BalanceConfig::default()),
        ),
        rule(
            "RULE003",
            "Minimum Team Coverage",
            "Ensure minimum team members present during leave period",
            RuleCategory::Coverage,
            true,
            90,
            true,
            RuleConfig::Coverage(CoverageConfig::default()),
        ),
        rule(
            "RULE004",
            "Maximum Concurrent Leave",
            "Limit simultaneous leaves in a team/department",
            RuleCategory::Coverage,
            true,
            89,
            true,
            RuleConfig::Concurrency(ConcurrencyConfig::default()),
        ),
        rule(
            "RULE005",
            "Blackout Period Check",
            "No leaves during specified blackout dates",
            RuleCategory::Blackout,
            true,
            95,
            true,
            RuleConfig::BlackoutCalendar(BlackoutCalendarConfig {
                exception_leave_types: strings(&["Emergency Leave", "Bereavement Leave"]),
            }),
        ),
        rule(
            "RULE006",
            "Advance Notice Requirement",
            "Minimum notice period required for leave requests",
            RuleCategory::Notice,
            false,
            80,
            true,
            RuleConfig::Notice(NoticeConfig {
                notice_days: notice_table(&[
                    ("Annual Leave", 7),
                    ("Sick Leave", 0),
                    ("Emergency Leave", 0),
                    ("Personal Leave", 3),
                    ("Maternity Leave", 30),
                    ("Paternity Leave", 14),
                    ("Bereavement Leave", 0),
                    ("Study Leave", 14),
                    ("LWP", 7),
                    ("Comp Off", 1),
                ]),
            }),
        ),
        rule(
            "RULE007",
            "Consecutive Leave Limit",
            "Maximum consecutive days allowed for each leave type",
            RuleCategory::Limits,
            true,
            85,
            true,
            RuleConfig::Consecutive(ConsecutiveConfig {
                max_consecutive: day_limits(&[
                    ("Annual Leave", 10.0),
                    ("Sick Leave", 5.0),
                    ("Emergency Leave", 3.0),
                    ("Personal Leave", 3.0),
                    ("Study Leave", 5.0),
                    ("LWP", 15.0),
                    ("Comp Off", 2.0),
                ]),
            }),
        ),
        rule(
            "RULE008",
            "Weekend/Holiday Sandwich Rule",
            "Count weekends/holidays between leave days as leave",
            RuleCategory::Calculation,
            false,
            70,
            true,
            RuleConfig::SandwichCounting(SandwichCountingConfig {
                enabled: true,
                min_gap_days: 1,
                applies_to: strings(&["Annual Leave", "Personal Leave"]),
            }),
        ),
        rule(
            "RULE009",
            "Minimum Gap Between Leaves",
            "Required gap between consecutive leave requests",
            RuleCategory::Limits,
            false,
            75,
            true,
            RuleConfig::MinimumGap(MinimumGapConfig {
                min_gap_days: 7,
                applies_to: strings(&["Annual Leave", "Personal Leave"]),
                exception_types: strings(&[
                    "Sick Leave",
                    "Emergency Leave",
                    "Bereavement Leave",
                ]),
            }),
        ),
        rule(
            "RULE010",
            "Probation Period Restriction",
            "Limit leave types available during probation",
            RuleCategory::Eligibility,
            true,
            98,
            true,
            RuleConfig::Probation(ProbationConfig {
                probation_months: 6,
                allowed_during_probation: strings(&[
                    "Sick Leave",
                    "Emergency Leave",
                    "Bereavement Leave",
                ]),
                restricted_types: strings(&["Annual Leave", "Personal Leave", "Study Leave"]),
            }),
        ),
        rule(
            "RULE011",
            "Critical Project Freeze",
            "Restrict leaves during critical project periods",
            RuleCategory::Blackout,
            false,
            85,
            false,
            RuleConfig::FreezeWindows(FreezeWindowsConfig {
                enabled: false,
                freeze_periods: Vec::new(),
                exception_types: strings(&[
                    "Sick Leave",
                    "Emergency Leave",
                    "Bereavement Leave",
                ]),
            }),
        ),
        rule(
            "RULE012",
            "Document Requirement",
            "Require supporting documents for certain leave types/durations",
            RuleCategory::Documentation,
            false,
            60,
            true,
            RuleConfig::Documentation(DocumentationConfig {
                require_document_above_days: 3.0,
                always_require_for: strings(&[
                    "Sick Leave",
                    "Study Leave",
                    "Maternity Leave",
                    "Paternity Leave",
                ]),
                document_types: strings(&["medical_certificate", "proof_of_event", "other"]),
            }),
        ),
        rule(
            "RULE013",
            "Monthly Leave Quota",
            "Maximum leaves per month per employee",
            RuleCategory::Limits,
            false,
            65,
            true,
            RuleConfig::MonthlyQuota(MonthlyQuotaConfig {
                max_per_month: 5.0,
                exception_types: strings(&[
                    "Sick Leave",
                    "Emergency Leave",
                    "Bereavement Leave",
                ]),
            }),
        ),
        rule(
            "RULE014",
            "Half-Day Leave Escalation",
            "Half-day leaves require HR approval - never auto-approved",
            RuleCategory::Escalation,
            false,
            50,
            true,
            RuleConfig::HalfDayEscalation(HalfDayEscalationConfig::default()),
        ),
    ];

    rules
        .into_iter()
        .map(|entry| (entry.id.clone(), entry))
        .collect()
}

/// Default annual entitlement used to seed a missing balance row, taken
/// from the RULE001 limits table.
pub fn default_entitlement(rules: &BTreeMap<String, Rule>, leave_type: &str) -> f64 {
    match rules.get("RULE001").map(|rule| &rule.config) {
        Some(RuleConfig::DurationLimits(config)) => {
            config.limits.get(leave_type).copied().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Normalize a stored rule set (object of id -> rule, possibly serialized as
/// a JSON string) into typed rules, dropping inactive entries. Unknown rule
/// ids become custom rules.
pub fn normalize_rule_set(raw: &Value) -> BTreeMap<String, Rule> {
    let parsed;
    let object = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).unwrap_or(Value::Null);
            parsed.as_object()
        }
        other => other.as_object(),
    };

    let defaults = default_catalog();
    let mut rules = BTreeMap::new();
    let Some(entries) = object else {
        return rules;
    };

    for (rule_id, rule_data) in entries {
        let normalized = normalize_rule(rule_id, rule_data, &defaults);
        if normalized.is_active {
            rules.insert(rule_id.clone(), normalized);
        }
    }
    rules
}

/// Normalize one stored rule, accepting both the nested `{config: {...}}`
/// shape and the legacy flat shape, and filling gaps from the default rule
/// with the same id.
pub fn normalize_rule(rule_id: &str, raw: &Value, defaults: &BTreeMap<String, Rule>) -> Rule {
    let default = defaults.get(rule_id);

    let name = string_field(raw, "name")
        .or_else(|| default.map(|rule| rule.name.clone()))
        .unwrap_or_else(|| rule_id.to_string());
    let description = string_field(raw, "description")
        .or_else(|| default.map(|rule| rule.description.clone()))
        .unwrap_or_default();
    let category = raw
        .get("category")
        .and_then(|value| serde_json::from_value::<RuleCategory>(value.clone()).ok())
        .or_else(|| default.map(|rule| rule.category))
        .unwrap_or(RuleCategory::Limits);
    let is_blocking = bool_field(raw, "is_blocking")
        .unwrap_or_else(|| default.map(|rule| rule.is_blocking).unwrap_or(true));
    let priority = raw
        .get("priority")
        .and_then(Value::as_u64)
        .map(|value| value as u32)
        .unwrap_or_else(|| default.map(|rule| rule.priority).unwrap_or(50));
    let is_active = bool_field(raw, "is_active").unwrap_or(true);
    let is_custom = bool_field(raw, "is_custom").unwrap_or(default.is_none());

    let config = normalize_config(rule_id, raw, default, is_custom);

    Rule {
        id: rule_id.to_string(),
        name,
        description,
        category,
        is_blocking,
        priority,
        is_active,
        is_custom,
        config,
    }
}

fn normalize_config(
    rule_id: &str,
    raw: &Value,
    default: Option<&Rule>,
    is_custom: bool,
) -> RuleConfig {
    // Base layer: the default rule's config; overlay: the stored config
    // object, or the flat rule object itself for legacy rows.
    let mut merged = default
        .map(|rule| serde_json::to_value(&rule.config).unwrap_or(Value::Null))
        .unwrap_or(Value::Null);
    if !merged.is_object() {
        merged = Value::Object(serde_json::Map::new());
    }

    let overlay = match raw.get("config") {
        Some(value @ Value::Object(_)) => value.clone(),
        _ => raw.clone(),
    };
    if let (Value::Object(base), Value::Object(over)) = (&mut merged, overlay) {
        for (key, value) in over {
            base.insert(key, value);
        }
    }

    if is_custom || default.is_none() {
        return RuleConfig::Custom(
            serde_json::from_value::<CustomRuleConfig>(merged).unwrap_or_default(),
        );
    }

    typed_config(rule_id, merged).unwrap_or_else(|| {
        default
            .map(|rule| rule.config.clone())
            .unwrap_or(RuleConfig::Custom(CustomRuleConfig::default()))
    })
}

fn typed_config(rule_id: &str, merged: Value) -> Option<RuleConfig> {
    let config = match rule_id {
        "RULE001" => RuleConfig::DurationLimits(serde_json::from_value(merged).ok()?),
        "RULE002" => RuleConfig::Balance(serde_json::from_value(merged).ok()?),
        "RULE003" => RuleConfig::Coverage(serde_json::from_value(merged).ok()?),
        "RULE004" => RuleConfig::Concurrency(serde_json::from_value(merged).ok()?),
        "RULE005" => RuleConfig::BlackoutCalendar(serde_json::from_value(merged).ok()?),
        "RULE006" => RuleConfig::Notice(serde_json::from_value(merged).ok()?),
        "RULE007" => RuleConfig::Consecutive(serde_json::from_value(merged).ok()?),
        "RULE008" => RuleConfig::SandwichCounting(serde_json::from_value(merged).ok()?),
        "RULE009" => RuleConfig::MinimumGap(serde_json::from_value(merged).ok()?),
        "RULE010" => RuleConfig::Probation(serde_json::from_value(merged).ok()?),
        "RULE011" => RuleConfig::FreezeWindows(serde_json::from_value(merged).ok()?),
        "RULE012" => RuleConfig::Documentation(serde_json::from_value(merged).ok()?),
        "RULE013" => RuleConfig::MonthlyQuota(serde_json::from_value(merged).ok()?),
        "RULE014" => RuleConfig::HalfDayEscalation(serde_json::from_value(merged).ok()?),
        _ => return None,
    };
    Some(config)
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(raw: &Value, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}
