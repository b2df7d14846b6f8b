//! Rule resolution: default catalog, per-organization overrides, and the
//! TTL cache in front of the policy store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::catalog::{self, Rule};
use super::domain::OrgId;
use super::store::PolicyStore;

/// Time source injected everywhere "now" matters, so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    rules: Arc<BTreeMap<String, Rule>>,
    fetched_at: DateTime<Utc>,
}

/// In-memory per-organization cache with a fixed expiry. Concurrent
/// refreshes for the same key are last-write-wins; staleness is bounded by
/// the TTL, not correctness-critical.
pub struct RuleCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<BTreeMap<String, Rule>>> {
        let entries = self.entries.lock().expect("rule cache mutex poisoned");
        let entry = entries.get(key)?;
        let age = now.signed_duration_since(entry.fetched_at);
        if age.to_std().map(|age| age < self.ttl).unwrap_or(false) {
            Some(entry.rules.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: &str, rules: Arc<BTreeMap<String, Rule>>, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("rule cache mutex poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                rules,
                fetched_at: now,
            },
        );
    }

    /// Drop one organization's entry, or everything when `key` is `None`.
    pub fn invalidate(&self, key: Option<&str>) {
        let mut entries = self.entries.lock().expect("rule cache mutex poisoned");
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }
}

/// Resolves the applicable rule set for a request. Inactive rules are
/// excluded here, at read time; evaluators may assume every rule they
/// receive is active.
pub struct RuleRegistry<P> {
    policy_store: Arc<P>,
    cache: RuleCache,
    clock: Arc<dyn Clock>,
}

impl<P: PolicyStore> RuleRegistry<P> {
    pub fn new(policy_store: Arc<P>, cache_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy_store,
            cache: RuleCache::new(cache_ttl),
            clock,
        }
    }

    /// The default catalog with inactive entries removed.
    pub fn active_defaults() -> BTreeMap<String, Rule> {
        catalog::default_catalog()
            .into_iter()
            .filter(|(_, rule)| rule.is_active)
            .collect()
    }

    /// Full default catalog, inactive entries included, for admin listings.
    pub fn full_defaults() -> BTreeMap<String, Rule> {
        catalog::default_catalog()
    }

    /// Rules applicable to `org`, falling back to defaults when the
    /// organization has no override set or the store cannot be read.
    pub fn rules_for(&self, org: Option<&OrgId>) -> Arc<BTreeMap<String, Rule>> {
        let Some(org) = org else {
            return Arc::new(Self::active_defaults());
        };

        let now = self.clock.now();
        if let Some(cached) = self.cache.get(&org.0, now) {
            debug!(org = %org.0, "using cached rule set");
            return cached;
        }

        let rules = match self.policy_store.fetch_rule_set(org) {
            Ok(Some(raw)) => {
                let normalized = catalog::normalize_rule_set(&raw);
                if normalized.is_empty() {
                    warn!(org = %org.0, "override rule set empty after normalization, using defaults");
                    Self::active_defaults()
                } else {
                    debug!(org = %org.0, count = normalized.len(), "loaded organization rule set");
                    normalized
                }
            }
            Ok(None) => Self::active_defaults(),
            Err(err) => {
                warn!(org = %org.0, error = %err, "policy store unavailable, using default rules");
                Self::active_defaults()
            }
        };

        let rules = Arc::new(rules);
        self.cache.put(&org.0, rules.clone(), now);
        rules
    }

    pub fn invalidate(&self, org: Option<&OrgId>) {
        self.cache.invalidate(org.map(|org| org.0.as_str()));
    }
}
