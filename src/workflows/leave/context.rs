//! Context gathering. Pulls everything the evaluators need from the store
//! up front, fail-soft: a source that cannot be read is replaced with a
//! conservative default and noted on the context instead of aborting the
//! evaluation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Datelike;
use tracing::warn;

use super::catalog::{default_entitlement, Rule};
use super::domain::{BalanceSnapshot, Employee, EvaluationContext, LeaveRequest, TeamStatus};
use super::registry::Clock;
use super::store::{LeaveStore, StoreError};

/// Assembles the [`EvaluationContext`] for one request.
pub struct ContextGatherer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LeaveStore> ContextGatherer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The employee row is fetched once by the caller (it also drives org
    /// resolution) and handed in; a failed fetch degrades here like any
    /// other source.
    pub fn gather(
        &self,
        request: &LeaveRequest,
        rules: &BTreeMap<String, Rule>,
        employee: Result<Option<Employee>, StoreError>,
    ) -> EvaluationContext {
        let today = self.clock.now().date_naive();
        let mut unavailable: Vec<&'static str> = Vec::new();

        let employee = match employee {
            Ok(found) => found,
            Err(err) => {
                warn!(employee = %request.employee_id.0, error = %err, "employee lookup failed");
                unavailable.push("employee");
                None
            }
        };

        let balance = self.gather_balance(request, rules, &mut unavailable);
        let team = self.gather_team(request, employee.as_ref(), &mut unavailable);
        let blackouts = match self
            .store
            .blackouts_overlapping(request.start_date, request.end_date)
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "blackout calendar unavailable");
                unavailable.push("blackouts");
                Vec::new()
            }
        };

        let monthly_used = match self.store.monthly_leave_total(
            &request.employee_id,
            request.start_date.month(),
            request.start_date.year(),
        ) {
            Ok(total) => total,
            Err(err) => {
                warn!(employee = %request.employee_id.0, error = %err, "monthly usage unavailable");
                unavailable.push("monthly_usage");
                0.0
            }
        };

        EvaluationContext {
            today,
            employee,
            balance,
            team,
            blackouts,
            monthly_used,
            degraded: !unavailable.is_empty(),
            unavailable_sources: unavailable,
        }
    }

    /// Balance lookup with lazy materialization: a missing row is seeded
    /// from the default entitlement for the leave type. The seed write is
    /// best-effort; a failed write only logs.
    fn gather_balance(
        &self,
        request: &LeaveRequest,
        rules: &BTreeMap<String, Rule>,
        unavailable: &mut Vec<&'static str>,
    ) -> BalanceSnapshot {
        let key = request.balance_key();
        let year = request.start_date.year();
        let fallback = || {
            BalanceSnapshot::seeded(&key, year, default_entitlement(rules, &request.leave_type))
        };

        match self.store.fetch_balance(&request.employee_id, &key, year) {
            Ok(Some(balance)) => balance,
            Ok(None) => {
                let seeded = fallback();
                if let Err(err) = self.store.seed_balance(&request.employee_id, seeded.clone()) {
                    warn!(employee = %request.employee_id.0, error = %err, "balance seed write failed");
                }
                seeded
            }
            Err(err) => {
                warn!(employee = %request.employee_id.0, error = %err, "balance lookup failed");
                unavailable.push("balance");
                fallback()
            }
        }
    }

    fn gather_team(
        &self,
        request: &LeaveRequest,
        employee: Option<&Employee>,
        unavailable: &mut Vec<&'static str>,
    ) -> TeamStatus {
        let Some(employee) = employee else {
            return TeamStatus::solo("unknown");
        };
        let department = employee.department.as_str();

        let size = match self.store.department_size(department) {
            Ok(size) => size.max(1),
            Err(err) => {
                warn!(department, error = %err, "department roster unavailable");
                unavailable.push("team");
                return TeamStatus::solo(department);
            }
        };

        let overlaps = match self.store.overlapping_leave(
            department,
            &request.employee_id,
            request.start_date,
            request.end_date,
        ) {
            Ok(overlaps) => overlaps,
            Err(err) => {
                warn!(department, error = %err, "overlapping leave query failed");
                unavailable.push("team");
                return TeamStatus::solo(department);
            }
        };

        // A member with several overlapping requests still counts once.
        let on_leave = overlaps
            .iter()
            .map(|overlap| &overlap.employee_id)
            .collect::<HashSet<_>>()
            .len() as u32;

        TeamStatus {
            unit_name: department.to_string(),
            unit_size: size,
            on_leave,
            members_on_leave: overlaps,
        }
    }
}
