//! Periodic alert check
//!
//! Ties together the baseline snapshot, the threshold table, deduplication,
//! and delivery. State machine per run: load the persisted baseline; if
//! absent or stale, recompute from recent history and persist before
//! continuing. The ledger is only touched on confirmed delivery, and always
//! as one atomic batch write.

use super::{compute_baseline, evaluate, filter_duplicates, format_alert_message, Thresholds};
use crate::db::Database;
use crate::error::Result;
use crate::notify::Notifier;
use crate::state::StateStore;
use chrono::{DateTime, Utc};

/// Baseline window plus one spare day for exclusions.
const BASELINE_FETCH_DAYS: usize = 8;

/// What one check accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No history rows yet; nothing to compare
    NoData,
    /// Every threshold held
    NoAlerts,
    /// Alerts triggered but all fell inside the dedup window
    AllDeduplicated,
    /// Message delivered covering this many alerts
    Sent(usize),
    /// Delivery failed; ledger untouched so the alerts retry next cycle
    DeliveryFailed(usize),
}

/// The periodic alert checker.
///
/// Generic over state storage and delivery so the whole pipeline runs
/// against an in-memory store and a fake notifier in tests.
pub struct AlertMonitor<'a, S: StateStore + ?Sized, N: Notifier + ?Sized> {
    store: &'a S,
    notifier: &'a N,
    thresholds: Thresholds,
    dedup_window_hours: i64,
    baseline_freshness_hours: i64,
}

impl<'a, S: StateStore + ?Sized, N: Notifier + ?Sized> AlertMonitor<'a, S, N> {
    pub fn new(
        store: &'a S,
        notifier: &'a N,
        thresholds: Thresholds,
        dedup_window_hours: i64,
        baseline_freshness_hours: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            thresholds,
            dedup_window_hours,
            baseline_freshness_hours,
        }
    }

    /// Runs one check against the latest history in `db`.
    pub fn run_check(&self, db: &Database, now: DateTime<Utc>) -> Result<CheckOutcome> {
        let Some(latest) = db.latest_daily()? else {
            tracing::info!("Alert check skipped, no metric history");
            return Ok(CheckOutcome::NoData);
        };

        let baseline = self.fresh_baseline(db, now)?;

        let candidates = evaluate(&latest, &baseline, &self.thresholds);
        if candidates.is_empty() {
            tracing::debug!(day = %latest.day, "Alert check clean");
            return Ok(CheckOutcome::NoAlerts);
        }

        let mut ledger = self.store.load_ledger()?;
        let survivors =
            filter_duplicates(candidates, &ledger, now, self.dedup_window_hours);
        if survivors.is_empty() {
            return Ok(CheckOutcome::AllDeduplicated);
        }

        let message = format_alert_message(&survivors);
        match self.notifier.send(&message) {
            Ok(()) => {
                // One batch write covering every delivered metric; a partial
                // send is never reflected as a partial ledger update.
                for alert in &survivors {
                    ledger.last_sent.insert(alert.metric, now);
                }
                self.store.store_ledger(&ledger)?;
                tracing::info!(alerts = survivors.len(), "Alerts delivered");
                Ok(CheckOutcome::Sent(survivors.len()))
            }
            Err(e) => {
                tracing::warn!(error = %e, alerts = survivors.len(), "Alert delivery failed");
                Ok(CheckOutcome::DeliveryFailed(survivors.len()))
            }
        }
    }

    /// Loads the persisted baseline, recomputing and persisting it when
    /// absent or older than the freshness window.
    fn fresh_baseline(
        &self,
        db: &Database,
        now: DateTime<Utc>,
    ) -> Result<crate::types::BaselineSnapshot> {
        if let Some(baseline) = self.store.load_baseline()? {
            if !baseline.is_stale(now, self.baseline_freshness_hours) {
                return Ok(baseline);
            }
            tracing::debug!(updated_at = %baseline.updated_at, "Baseline stale, recomputing");
        }

        // Fetch one extra day and drop the newest record: today's partial
        // values belong in the comparison, not in the baseline.
        let recent = db.recent_daily(BASELINE_FETCH_DAYS)?;
        let prior = if recent.len() > 1 {
            &recent[..recent.len() - 1]
        } else {
            &recent[..]
        };
        let baseline = compute_baseline(prior, now);
        self.store.store_baseline(&baseline)?;
        Ok(baseline)
    }
}
