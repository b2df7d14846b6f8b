use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::workflows::leave::catalog::{self, RuleConfig};
use crate::workflows::leave::domain::OrgId;
use crate::workflows::leave::registry::RuleRegistry;
use crate::workflows::leave::store::MemoryPolicyStore;

use super::common::{today, FixedClock, ManualClock};

fn org() -> OrgId {
    OrgId("org-42".to_string())
}

fn registry_with(
    policy: MemoryPolicyStore,
    ttl_secs: u64,
    clock: Arc<dyn crate::workflows::leave::registry::Clock>,
) -> RuleRegistry<MemoryPolicyStore> {
    RuleRegistry::new(Arc::new(policy), Duration::from_secs(ttl_secs), clock)
}

#[test]
fn active_defaults_exclude_inactive_catalog_entries() {
    let defaults = RuleRegistry::<MemoryPolicyStore>::active_defaults();

    assert_eq!(defaults.len(), 13);
    assert!(!defaults.contains_key("RULE011"));
    assert_eq!(RuleRegistry::<MemoryPolicyStore>::full_defaults().len(), 14);
}

#[test]
fn requests_without_an_org_use_active_defaults() {
    let registry = registry_with(MemoryPolicyStore::new(), 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(None);

    assert_eq!(rules.len(), 13);
}

#[test]
fn org_overrides_shadow_default_rule_config() {
    let policy = MemoryPolicyStore::new();
    policy.set_rules(
        &org(),
        json!({
            "RULE001": {
                "config": { "limits": { "Annual Leave": 10.0 } }
            }
        }),
    );
    let registry = registry_with(policy, 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(Some(&org()));

    assert_eq!(rules.len(), 1);
    let rule = rules.get("RULE001").expect("rule present");
    assert_eq!(rule.name, "Maximum Leave Duration");
    let RuleConfig::DurationLimits(config) = &rule.config else {
        panic!("expected duration limits config");
    };
    assert_eq!(config.limits.get("Annual Leave"), Some(&10.0));
}

#[test]
fn unknown_rule_ids_become_custom_rules() {
    let policy = MemoryPolicyStore::new();
    policy.set_rules(
        &org(),
        json!({
            "ORG-100": {
                "name": "Summer cap",
                "category": "limits",
                "max_days": 3.0
            }
        }),
    );
    let registry = registry_with(policy, 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(Some(&org()));

    let rule = rules.get("ORG-100").expect("rule present");
    assert!(rule.is_custom);
    let RuleConfig::Custom(config) = &rule.config else {
        panic!("expected custom config");
    };
    assert_eq!(config.max_days, Some(3.0));
}

#[test]
fn inactive_overrides_are_dropped_at_read_time() {
    let policy = MemoryPolicyStore::new();
    policy.set_rules(
        &org(),
        json!({
            "RULE001": { "is_active": false },
            "RULE002": {}
        }),
    );
    let registry = registry_with(policy, 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(Some(&org()));

    assert!(!rules.contains_key("RULE001"));
    assert!(rules.contains_key("RULE002"));
}

#[test]
fn malformed_rule_sets_fall_back_to_defaults() {
    let policy = MemoryPolicyStore::new();
    policy.set_rules(&org(), json!("not an object"));
    let registry = registry_with(policy, 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(Some(&org()));

    assert_eq!(rules.len(), 13);
}

#[test]
fn rule_sets_serialized_as_strings_are_accepted() {
    let policy = MemoryPolicyStore::new();
    let raw = json!({ "RULE001": { "config": { "limits": { "Annual Leave": 12.0 } } } });
    policy.set_rules(&org(), json!(raw.to_string()));
    let registry = registry_with(policy, 300, Arc::new(FixedClock(today())));

    let rules = registry.rules_for(Some(&org()));

    let rule = rules.get("RULE001").expect("rule present");
    let RuleConfig::DurationLimits(config) = &rule.config else {
        panic!("expected duration limits config");
    };
    assert_eq!(config.limits.get("Annual Leave"), Some(&12.0));
}

#[test]
fn legacy_flat_configs_normalize_like_nested_ones() {
    let defaults = catalog::default_catalog();
    let raw = json!({ "limits": { "Annual Leave": 8.0 } });

    let rule = catalog::normalize_rule("RULE001", &raw, &defaults);

    let RuleConfig::DurationLimits(config) = &rule.config else {
        panic!("expected duration limits config");
    };
    assert_eq!(config.limits.get("Annual Leave"), Some(&8.0));
    assert!(!rule.is_custom);
    assert_eq!(rule.priority, 100);
}

#[test]
fn cached_rule_sets_expire_after_the_ttl() {
    let clock = Arc::new(ManualClock::new(today()));
    let policy = MemoryPolicyStore::new();
    policy.set_rules(&org(), json!({ "RULE001": {} }));
    let registry = RuleRegistry::new(
        Arc::new(policy.clone()),
        Duration::from_secs(300),
        clock.clone(),
    );

    assert_eq!(registry.rules_for(Some(&org())).len(), 1);

    // A policy change inside the TTL window is not observed.
    policy.set_rules(&org(), json!({ "RULE001": {}, "RULE002": {} }));
    clock.advance(299);
    assert_eq!(registry.rules_for(Some(&org())).len(), 1);

    clock.advance(2);
    assert_eq!(registry.rules_for(Some(&org())).len(), 2);
}

#[test]
fn invalidation_forces_an_immediate_refetch() {
    let clock = Arc::new(ManualClock::new(today()));
    let policy = MemoryPolicyStore::new();
    policy.set_rules(&org(), json!({ "RULE001": {} }));
    let registry = RuleRegistry::new(
        Arc::new(policy.clone()),
        Duration::from_secs(300),
        clock,
    );

    assert_eq!(registry.rules_for(Some(&org())).len(), 1);
    policy.set_rules(&org(), json!({ "RULE001": {}, "RULE002": {} }));

    registry.invalidate(Some(&org()));

    assert_eq!(registry.rules_for(Some(&org())).len(), 2);
}
