//! Threshold alerting
//!
//! Compares the latest daily values against a rolling 7-day baseline using a
//! fixed threshold table, classifies severity, and renders one batched
//! message. Deduplication and delivery live in [`monitor`].

pub mod monitor;

pub use monitor::{AlertMonitor, CheckOutcome};

use crate::types::{Alert, AlertLedger, BaselineSnapshot, DailyMetrics, Metric, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics the threshold table watches.
pub const ALERT_METRICS: [Metric; 7] = [
    Metric::ReadinessScore,
    Metric::SleepScore,
    Metric::AverageHrv,
    Metric::LowestHeartRate,
    Metric::TemperatureDeviation,
    Metric::StressHigh,
    Metric::Spo2Average,
];

/// Days of history folded into the baseline mean.
pub const BASELINE_WINDOW_DAYS: usize = 7;

/// Yellow/red cutoff pair for one signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Band {
    pub yellow: f64,
    pub red: f64,
}

/// The fixed threshold table. Every field has a default; config may
/// override individual bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Absolute readiness score drop below baseline
    pub readiness_drop: Band,
    /// Absolute sleep score drop below baseline
    pub sleep_drop: Band,
    /// HRV drop as a percentage of baseline
    pub hrv_drop_pct: Band,
    /// Resting heart rate rise above baseline, bpm
    pub resting_hr_rise: Band,
    /// Absolute temperature deviation, degrees Celsius
    pub temperature_deviation: Band,
    /// Stress-high seconds as a multiple of baseline
    pub stress_multiplier: Band,
    /// SpO2 floor, percent (red is the lower cutoff)
    pub spo2_floor: Band,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            readiness_drop: Band { yellow: 20.0, red: 30.0 },
            sleep_drop: Band { yellow: 20.0, red: 30.0 },
            hrv_drop_pct: Band { yellow: 30.0, red: 40.0 },
            resting_hr_rise: Band { yellow: 10.0, red: 15.0 },
            temperature_deviation: Band { yellow: 1.0, red: 1.5 },
            stress_multiplier: Band { yellow: 2.0, red: 3.0 },
            spo2_floor: Band { yellow: 95.0, red: 92.0 },
        }
    }
}

/// 7-day rolling mean per metric over the most recent history.
///
/// `recent` is oldest-first; only the last [`BASELINE_WINDOW_DAYS`] records
/// contribute. Metrics with no values in the window are absent.
pub fn compute_baseline(recent: &[DailyMetrics], now: DateTime<Utc>) -> BaselineSnapshot {
    let start = recent.len().saturating_sub(BASELINE_WINDOW_DAYS);
    let window = &recent[start..];

    let mut values = BTreeMap::new();
    for metric in Metric::ALL {
        let samples: Vec<f64> = window.iter().filter_map(|d| metric.value_in(d)).collect();
        if !samples.is_empty() {
            values.insert(metric, samples.iter().sum::<f64>() / samples.len() as f64);
        }
    }

    BaselineSnapshot {
        values,
        updated_at: now,
    }
}

/// Evaluates every threshold row against the latest values.
///
/// Signals with a missing latest value or missing required baseline are
/// skipped, never treated as zero.
pub fn evaluate(
    latest: &DailyMetrics,
    baseline: &BaselineSnapshot,
    thresholds: &Thresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // Readiness score drop
    if let (Some(value), Some(base)) = (
        latest.readiness_score,
        baseline.get(Metric::ReadinessScore),
    ) {
        let drop = base - value;
        if let Some(severity) = grade(drop, thresholds.readiness_drop) {
            alerts.push(Alert {
                metric: Metric::ReadinessScore,
                severity,
                message: format!(
                    "Readiness {:.0} is {:.0} below your baseline {:.0}",
                    value, drop, base
                ),
            });
        }
    }

    // Sleep score drop
    if let (Some(value), Some(base)) = (latest.sleep_score, baseline.get(Metric::SleepScore)) {
        let drop = base - value;
        if let Some(severity) = grade(drop, thresholds.sleep_drop) {
            alerts.push(Alert {
                metric: Metric::SleepScore,
                severity,
                message: format!(
                    "Sleep score {:.0} is {:.0} below your baseline {:.0}",
                    value, drop, base
                ),
            });
        }
    }

    // HRV drop, relative to baseline
    if let (Some(value), Some(base)) = (latest.average_hrv, baseline.get(Metric::AverageHrv)) {
        if base > 0.0 {
            let drop_pct = (base - value) / base * 100.0;
            if let Some(severity) = grade(drop_pct, thresholds.hrv_drop_pct) {
                alerts.push(Alert {
                    metric: Metric::AverageHrv,
                    severity,
                    message: format!(
                        "HRV {:.0} ms is {:.0}% below your baseline {:.0} ms",
                        value, drop_pct, base
                    ),
                });
            }
        }
    }

    // Resting heart rate rise
    if let (Some(value), Some(base)) = (
        latest.lowest_heart_rate,
        baseline.get(Metric::LowestHeartRate),
    ) {
        let rise = value - base;
        if let Some(severity) = grade(rise, thresholds.resting_hr_rise) {
            alerts.push(Alert {
                metric: Metric::LowestHeartRate,
                severity,
                message: format!(
                    "Resting HR {:.0} bpm is {:.0} above your baseline {:.0}",
                    value, rise, base
                ),
            });
        }
    }

    // Temperature deviation, absolute (no baseline needed)
    if let Some(value) = latest.temperature_deviation {
        let band = thresholds.temperature_deviation;
        let severity = if value.abs() > band.red {
            Some(Severity::Red)
        } else if value.abs() > band.yellow {
            Some(Severity::Yellow)
        } else {
            None
        };
        if let Some(severity) = severity {
            alerts.push(Alert {
                metric: Metric::TemperatureDeviation,
                severity,
                message: format!("Body temperature is {:+.1}\u{b0}C off your norm", value),
            });
        }
    }

    // Stress-high as a multiple of baseline
    if let (Some(value), Some(base)) = (latest.stress_high, baseline.get(Metric::StressHigh)) {
        if base > 0.0 {
            let multiple = value / base;
            if let Some(severity) = grade(multiple, thresholds.stress_multiplier) {
                alerts.push(Alert {
                    metric: Metric::StressHigh,
                    severity,
                    message: format!(
                        "High stress time is {:.1}x your usual ({:.0} vs {:.0} min)",
                        multiple,
                        value / 60.0,
                        base / 60.0
                    ),
                });
            }
        }
    }

    // SpO2 floor (no baseline needed; red cutoff is below yellow)
    if let Some(value) = latest.spo2_average {
        let band = thresholds.spo2_floor;
        let severity = if value < band.red {
            Some(Severity::Red)
        } else if value < band.yellow {
            Some(Severity::Yellow)
        } else {
            None
        };
        if let Some(severity) = severity {
            alerts.push(Alert {
                metric: Metric::Spo2Average,
                severity,
                message: format!("Average SpO2 dropped to {:.1}%", value),
            });
        }
    }

    alerts
}

/// Yellow/red classification for a "bigger is worse" measure.
fn grade(measure: f64, band: Band) -> Option<Severity> {
    if measure >= band.red {
        Some(Severity::Red)
    } else if measure >= band.yellow {
        Some(Severity::Yellow)
    } else {
        None
    }
}

/// Drops candidates whose metric already alerted inside the dedup window.
pub fn filter_duplicates(
    alerts: Vec<Alert>,
    ledger: &AlertLedger,
    now: DateTime<Utc>,
    window_hours: i64,
) -> Vec<Alert> {
    alerts
        .into_iter()
        .filter(|alert| {
            let suppressed = ledger.is_suppressed(alert.metric, now, window_hours);
            if suppressed {
                tracing::debug!(metric = %alert.metric, "Alert suppressed by dedup window");
            }
            !suppressed
        })
        .collect()
}

/// One outbound message for the whole batch: a severity-tagged line per
/// alert and a single closing recommendation.
pub fn format_alert_message(alerts: &[Alert]) -> String {
    let mut message = String::from("\u{26a0}\u{fe0f} Health alert\n\n");
    for alert in alerts {
        message.push_str(&format!("{} {}\n", alert.severity.icon(), alert.message));
    }

    let any_red = alerts.iter().any(|a| a.severity == Severity::Red);
    message.push('\n');
    if any_red {
        message.push_str("Take it easy today: skip intense training and prioritize recovery.");
    } else {
        message.push_str("Worth keeping an eye on; consider an earlier night.");
    }
    message
}
