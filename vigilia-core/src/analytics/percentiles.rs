//! Percentile engine
//!
//! Computes p10/p25/p50/p75/p90 per metric over the full history, plus a
//! classifier that places a single value within its metric's personal
//! distribution. Metrics with fewer than [`MIN_SAMPLES`] values are skipped,
//! leaving any prior cached record untouched.

use crate::types::{DailyMetrics, Metric, PercentileBand, PercentileRecord};
use std::collections::BTreeMap;

/// Minimum non-missing values before a percentile record is materialized.
pub const MIN_SAMPLES: usize = 7;

/// Computes percentile records for every metric with enough history.
pub fn compute_percentiles(history: &[DailyMetrics]) -> BTreeMap<Metric, PercentileRecord> {
    let mut out = BTreeMap::new();

    for metric in Metric::PERCENTILED {
        let mut values: Vec<f64> = history.iter().filter_map(|d| metric.value_in(d)).collect();
        if values.len() < MIN_SAMPLES {
            tracing::debug!(
                metric = %metric,
                samples = values.len(),
                "Skipping percentiles, not enough samples"
            );
            continue;
        }

        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        out.insert(
            metric,
            PercentileRecord {
                p10: interpolate(&values, 10.0),
                p25: interpolate(&values, 25.0),
                p50: interpolate(&values, 50.0),
                p75: interpolate(&values, 75.0),
                p90: interpolate(&values, 90.0),
                count: values.len(),
            },
        );
    }

    out
}

/// Linear interpolation between order statistics.
///
/// For percentile `p` over `n` sorted values: index k = (n-1)*p/100, with
/// the result interpolated between the floor and ceil order statistics.
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    debug_assert!(n > 0);
    let k = (n as f64 - 1.0) * p / 100.0;
    let f = k.floor() as usize;
    let c = (f + 1).min(n - 1);
    sorted[f] + (k - f as f64) * (sorted[c] - sorted[f])
}

/// Places `value` within the metric's distribution.
///
/// Direction is metric-dependent: for lower-is-better metrics a value at or
/// below p10 is the top band. Returns `None` for mid-distribution values.
pub fn classify(
    metric: Metric,
    value: f64,
    record: &PercentileRecord,
) -> Option<PercentileBand> {
    if metric.lower_is_better() {
        if value <= record.p10 {
            Some(PercentileBand::Top10)
        } else if value <= record.p25 {
            Some(PercentileBand::Top25)
        } else if value >= record.p90 {
            Some(PercentileBand::Bottom10)
        } else if value >= record.p75 {
            Some(PercentileBand::Bottom25)
        } else {
            None
        }
    } else if value >= record.p90 {
        Some(PercentileBand::Top10)
    } else if value >= record.p75 {
        Some(PercentileBand::Top25)
    } else if value <= record.p10 {
        Some(PercentileBand::Bottom10)
    } else if value <= record.p25 {
        Some(PercentileBand::Bottom25)
    } else {
        None
    }
}
