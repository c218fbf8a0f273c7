//! Weekday vs weekend comparison
//!
//! Splits recent history by the weekend flag and compares per-metric means.
//! Feeds the weekly report; nothing here is persisted.

use crate::types::{DailyMetrics, Metric};
use std::collections::BTreeMap;

const MAX_WEEKDAYS: usize = 60;
const MAX_WEEKEND_DAYS: usize = 30;
const MIN_WEEKDAYS: usize = 5;
const MIN_WEEKEND_DAYS: usize = 2;

/// Metrics worth comparing across the week boundary.
const COMPARED: [Metric; 7] = [
    Metric::SleepScore,
    Metric::ReadinessScore,
    Metric::TotalSleepDuration,
    Metric::AverageHrv,
    Metric::LowestHeartRate,
    Metric::Steps,
    Metric::StressHigh,
];

/// Mean of one metric on weekdays vs weekends.
#[derive(Debug, Clone, Copy)]
pub struct WeekdayComparison {
    pub weekday: f64,
    pub weekend: f64,
    pub delta: f64,
    pub delta_pct: f64,
}

/// Compares weekday and weekend means over recent history (oldest-first).
///
/// Returns `None` with fewer than 5 weekdays or 2 weekend days of data.
pub fn compute_weekday_weekend(
    history: &[DailyMetrics],
) -> Option<BTreeMap<Metric, WeekdayComparison>> {
    let mut weekdays: Vec<&DailyMetrics> = Vec::new();
    let mut weekends: Vec<&DailyMetrics> = Vec::new();
    for day in history.iter().rev() {
        if day.is_weekend() {
            if weekends.len() < MAX_WEEKEND_DAYS {
                weekends.push(day);
            }
        } else if weekdays.len() < MAX_WEEKDAYS {
            weekdays.push(day);
        }
    }

    if weekdays.len() < MIN_WEEKDAYS || weekends.len() < MIN_WEEKEND_DAYS {
        return None;
    }

    let mut out = BTreeMap::new();
    for metric in COMPARED {
        let wd = mean_of(&weekdays, metric);
        let we = mean_of(&weekends, metric);
        if let (Some(wd), Some(we)) = (wd, we) {
            let delta = we - wd;
            let delta_pct = if wd != 0.0 { delta / wd * 100.0 } else { 0.0 };
            out.insert(
                metric,
                WeekdayComparison {
                    weekday: wd,
                    weekend: we,
                    delta,
                    delta_pct,
                },
            );
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn mean_of(days: &[&DailyMetrics], metric: Metric) -> Option<f64> {
    let values: Vec<f64> = days.iter().filter_map(|d| metric.value_in(d)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2026-08-03 is a Monday
    fn two_weeks() -> Vec<DailyMetrics> {
        (0..14)
            .map(|i| {
                let day =
                    NaiveDate::from_ymd_opt(2026, 8, 3).unwrap() + chrono::Duration::days(i);
                let mut record = DailyMetrics::empty(day);
                record.sleep_score = Some(if record.is_weekend() { 85.0 } else { 75.0 });
                record
            })
            .collect()
    }

    #[test]
    fn test_weekend_delta() {
        let stats = compute_weekday_weekend(&two_weeks()).unwrap();
        let sleep = stats[&Metric::SleepScore];

        assert_eq!(sleep.weekday, 75.0);
        assert_eq!(sleep.weekend, 85.0);
        assert_eq!(sleep.delta, 10.0);
        assert!((sleep.delta_pct - 10.0 / 75.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_weekend_days() {
        // One week minus the Sunday leaves a single weekend day
        let mut history = two_weeks();
        history.truncate(6);
        assert!(compute_weekday_weekend(&history).is_none());
    }

    #[test]
    fn test_metric_with_no_values_is_absent() {
        let stats = compute_weekday_weekend(&two_weeks()).unwrap();
        assert!(!stats.contains_key(&Metric::Steps));
    }
}
