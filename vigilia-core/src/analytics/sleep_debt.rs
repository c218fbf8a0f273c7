//! Sleep debt calculator
//!
//! A deficit-only ledger over a recent window: short nights accumulate debt,
//! long nights do not pay it back. The payoff estimate assumes a fixed extra
//! half hour of sleep per night.

use crate::types::{DailyMetrics, DebtLabel, SleepDebt};

/// Nights with data required before a debt figure is produced.
const MIN_SAMPLES: usize = 3;
/// Assumed extra sleep per recovery night, in hours.
const RECOVERY_RATE_HOURS: f64 = 0.5;

/// Computes accumulated sleep debt over the last `window_days` days.
///
/// Returns `None` with fewer than 3 nights of sleep data in the window.
pub fn compute_sleep_debt(
    history: &[DailyMetrics],
    window_days: usize,
    target_hours: f64,
) -> Option<SleepDebt> {
    let start = history.len().saturating_sub(window_days);
    let hours: Vec<f64> = history[start..]
        .iter()
        .filter_map(|d| d.total_sleep_duration)
        .map(|seconds| seconds / 3600.0)
        .collect();

    if hours.len() < MIN_SAMPLES {
        tracing::debug!(samples = hours.len(), "Skipping sleep debt, not enough nights");
        return None;
    }

    let debt_hours: f64 = hours.iter().map(|h| (target_hours - h).max(0.0)).sum();
    let avg_sleep_hours = hours.iter().sum::<f64>() / hours.len() as f64;

    let days_to_payoff = if debt_hours > 0.0 {
        (debt_hours / RECOVERY_RATE_HOURS).ceil() as u32
    } else {
        0
    };

    Some(SleepDebt {
        debt_hours,
        avg_sleep_hours,
        days_to_payoff,
        label: label_for(debt_hours),
    })
}

fn label_for(debt_hours: f64) -> DebtLabel {
    if debt_hours <= 0.0 {
        DebtLabel::None
    } else if debt_hours < 3.0 {
        DebtLabel::Small
    } else if debt_hours < 7.0 {
        DebtLabel::Significant
    } else {
        DebtLabel::Critical
    }
}
