//! Circadian stability analyzer
//!
//! Measures how regular bedtimes are over a recent window. Bedtimes before
//! 6:00 AM are shifted by a full day so that 00:30 counts as "24:30" of the
//! prior evening; without the shift, post-midnight nights would blow up the
//! variance across the wrap-around.

use crate::types::{CircadianStability, DailyMetrics, StabilityLabel};
use chrono::{NaiveTime, Timelike};

/// Bedtime samples required before a stability figure is produced.
const MIN_SAMPLES: usize = 5;
/// Minutes-past-midnight below which a bedtime belongs to the prior evening.
const EARLY_MORNING_CUTOFF_MIN: f64 = 360.0;

/// Computes bedtime regularity over the last `window_days` days.
///
/// Returns `None` with fewer than 5 bedtime samples in the window.
pub fn compute_stability(
    history: &[DailyMetrics],
    window_days: usize,
) -> Option<CircadianStability> {
    let start = history.len().saturating_sub(window_days);
    let minutes: Vec<f64> = history[start..]
        .iter()
        .filter_map(|d| d.bedtime_start)
        .map(|bt| {
            let m = (bt.time().hour() * 60 + bt.time().minute()) as f64;
            if m < EARLY_MORNING_CUTOFF_MIN {
                m + 1440.0
            } else {
                m
            }
        })
        .collect();

    if minutes.len() < MIN_SAMPLES {
        tracing::debug!(
            samples = minutes.len(),
            "Skipping circadian stability, not enough bedtimes"
        );
        return None;
    }

    let mean = minutes.iter().sum::<f64>() / minutes.len() as f64;
    let variance = minutes
        .iter()
        .map(|m| (m - mean).powi(2))
        .sum::<f64>()
        / (minutes.len() - 1) as f64;
    let stdev_minutes = variance.sqrt();

    let normalized = mean.rem_euclid(1440.0);
    let avg_bedtime =
        NaiveTime::from_hms_opt(normalized as u32 / 60, normalized as u32 % 60, 0)?;

    // 0 minutes of spread scores 100, an hour or more scores 0
    let stability_score = (100.0 - stdev_minutes / 60.0 * 100.0).clamp(0.0, 100.0) as u8;

    Some(CircadianStability {
        stdev_minutes,
        avg_bedtime,
        stability_score,
        label: label_for(stdev_minutes),
    })
}

fn label_for(stdev_minutes: f64) -> StabilityLabel {
    if stdev_minutes <= 15.0 {
        StabilityLabel::Excellent
    } else if stdev_minutes <= 30.0 {
        StabilityLabel::Good
    } else if stdev_minutes <= 45.0 {
        StabilityLabel::Moderate
    } else {
        StabilityLabel::Unstable
    }
}
