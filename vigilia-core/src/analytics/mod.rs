//! Analytics engine
//!
//! Derives health signals from the canonical history:
//!
//! - [`percentiles`] — distributional position per metric over full history
//! - [`correlation`] — event/metric same-day association, per time bucket
//! - [`streaks`] — consecutive-day habit tracking
//! - [`sleep_debt`] — deficit-only accumulated sleep shortfall
//! - [`circadian`] — bedtime regularity scoring
//! - [`weekday`] — weekday vs weekend metric comparison
//!
//! The nightly batch recomputes the persisted derived tables (percentiles,
//! correlations, streaks); sleep debt, circadian stability, and the
//! weekday split are computed on demand at report time.

pub mod circadian;
pub mod correlation;
pub mod percentiles;
pub mod sleep_debt;
pub mod streaks;
pub mod weekday;

use crate::db::Database;
use crate::error::Result;
use std::time::Instant;

/// What the nightly batch accomplished. Failed stages are reported, never
/// propagated: one broken stage must not starve the others or the next run.
#[derive(Debug, Default)]
pub struct NightlyOutcome {
    pub percentiles_updated: usize,
    pub correlations_updated: usize,
    pub streaks_updated: usize,
    pub failures: Vec<String>,
}

impl NightlyOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the full nightly recompute: percentiles, correlations, streaks.
///
/// Stages are independent and fault-isolated; each failure is logged and
/// recorded in the outcome while the remaining stages still run. All writes
/// are natural-key upserts, so a rerun after a mid-batch crash is safe.
pub fn run_nightly(db: &Database) -> NightlyOutcome {
    let started = Instant::now();
    let mut outcome = NightlyOutcome::default();

    let history = match db.daily_history() {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(error = %e, "Nightly batch aborted, history unavailable");
            outcome.failures.push(format!("history: {}", e));
            return outcome;
        }
    };
    if history.is_empty() {
        tracing::info!("Nightly batch skipped, no history yet");
        return outcome;
    }

    match recompute_percentiles(db, &history) {
        Ok(n) => outcome.percentiles_updated = n,
        Err(e) => {
            tracing::warn!(error = %e, "Percentile stage failed");
            outcome.failures.push(format!("percentiles: {}", e));
        }
    }

    match recompute_correlations(db, &history) {
        Ok(n) => outcome.correlations_updated = n,
        Err(e) => {
            tracing::warn!(error = %e, "Correlation stage failed");
            outcome.failures.push(format!("correlations: {}", e));
        }
    }

    match recompute_streaks(db, &history) {
        Ok(n) => outcome.streaks_updated = n,
        Err(e) => {
            tracing::warn!(error = %e, "Streak stage failed");
            outcome.failures.push(format!("streaks: {}", e));
        }
    }

    tracing::info!(
        days = history.len(),
        percentiles = outcome.percentiles_updated,
        correlations = outcome.correlations_updated,
        streaks = outcome.streaks_updated,
        failures = outcome.failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Nightly batch complete"
    );
    outcome
}

fn recompute_percentiles(
    db: &Database,
    history: &[crate::types::DailyMetrics],
) -> Result<usize> {
    let records = percentiles::compute_percentiles(history);
    for (metric, record) in &records {
        db.upsert_percentile(*metric, record)?;
    }
    Ok(records.len())
}

fn recompute_correlations(
    db: &Database,
    history: &[crate::types::DailyMetrics],
) -> Result<usize> {
    let events = db.events()?;
    let records = correlation::compute_correlations(&events, history);
    for record in &records {
        db.upsert_correlation(record)?;
    }
    Ok(records.len())
}

fn recompute_streaks(db: &Database, history: &[crate::types::DailyMetrics]) -> Result<usize> {
    let prior = db.streaks()?;
    let records = streaks::update_streaks(history, &streaks::default_habits(), &prior);
    for record in &records {
        db.upsert_streak(record)?;
    }
    Ok(records.len())
}
