//! Correlation engine
//!
//! For every (event kind, metric) pair, compares the average metric value on
//! days the event occurred against days it did not, overall and per
//! time-of-day bucket. The result is a descriptive same-day association; no
//! lag is applied and no causal claim is made.

use crate::types::{CorrelationRecord, DailyMetrics, EventKind, EventRecord, Metric, TimeBucket};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// History shorter than this produces no correlations at all.
pub const MIN_HISTORY_DAYS: usize = 14;

/// Distinct event days required before a kind is considered, "all" bucket.
const MIN_EVENT_DAYS_ALL: usize = 3;
/// Distinct event days required within a single time bucket.
const MIN_EVENT_DAYS_BUCKET: usize = 2;
/// Sample floors per partition: (days with event, days without).
const MIN_SAMPLES_ALL: (usize, usize) = (3, 3);
const MIN_SAMPLES_BUCKET: (usize, usize) = (2, 3);

/// Computes all correlation records for the given event and metric history.
pub fn compute_correlations(
    events: &[EventRecord],
    history: &[DailyMetrics],
) -> Vec<CorrelationRecord> {
    if history.len() < MIN_HISTORY_DAYS {
        tracing::debug!(
            days = history.len(),
            "Skipping correlations, history too short"
        );
        return Vec::new();
    }

    // Distinct calendar days per event kind, overall and per bucket
    let mut event_days: BTreeMap<EventKind, BTreeMap<TimeBucket, BTreeSet<NaiveDate>>> =
        BTreeMap::new();
    for event in events {
        let by_bucket = event_days.entry(event.kind.clone()).or_default();
        by_bucket
            .entry(TimeBucket::All)
            .or_default()
            .insert(event.day());
        for bucket in TimeBucket::HOURLY {
            if bucket.contains_hour(event.hour()) {
                by_bucket.entry(bucket).or_default().insert(event.day());
            }
        }
    }

    let mut out = Vec::new();

    for (kind, by_bucket) in &event_days {
        for (&bucket, days_with_event) in by_bucket {
            let (min_event_days, (min_with, min_without)) = match bucket {
                TimeBucket::All => (MIN_EVENT_DAYS_ALL, MIN_SAMPLES_ALL),
                _ => (MIN_EVENT_DAYS_BUCKET, MIN_SAMPLES_BUCKET),
            };
            if days_with_event.len() < min_event_days {
                continue;
            }

            for metric in Metric::CORRELATED {
                if let Some(record) = correlate_one(
                    kind,
                    metric,
                    bucket,
                    days_with_event,
                    history,
                    min_with,
                    min_without,
                ) {
                    out.push(record);
                }
            }
        }
    }

    out
}

/// One (kind, metric, bucket) comparison; `None` when a partition is below
/// its sample floor.
fn correlate_one(
    kind: &EventKind,
    metric: Metric,
    bucket: TimeBucket,
    days_with_event: &BTreeSet<NaiveDate>,
    history: &[DailyMetrics],
    min_with: usize,
    min_without: usize,
) -> Option<CorrelationRecord> {
    let mut with_event = Vec::new();
    let mut without_event = Vec::new();

    for day in history {
        let Some(value) = metric.value_in(day) else {
            continue;
        };
        if days_with_event.contains(&day.day) {
            with_event.push(value);
        } else {
            without_event.push(value);
        }
    }

    if with_event.len() < min_with || without_event.len() < min_without {
        return None;
    }

    let avg_with = mean(&with_event);
    let avg_without = mean(&without_event);
    let delta = avg_with - avg_without;
    let delta_pct = if avg_without != 0.0 {
        delta / avg_without * 100.0
    } else {
        0.0
    };

    // Balance-of-evidence heuristic: 0.5 for equal partitions, near 0 for
    // heavily skewed ones. Not a p-value.
    let confidence = with_event.len().min(without_event.len()) as f64
        / (with_event.len() + without_event.len()) as f64;

    Some(CorrelationRecord {
        event_kind: kind.clone(),
        metric,
        bucket,
        avg_with_event: avg_with,
        avg_without_event: avg_without,
        delta,
        delta_pct,
        count_with: with_event.len(),
        count_without: without_event.len(),
        confidence,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventDetails;
    use chrono::{DateTime, NaiveDate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn history_sleep(values: &[(u32, Option<f64>)]) -> Vec<DailyMetrics> {
        values
            .iter()
            .map(|&(d, score)| {
                let mut record = DailyMetrics::empty(day(d));
                record.sleep_score = score;
                record
            })
            .collect()
    }

    fn event_on(d: u32, hour: u32, kind: EventKind) -> EventRecord {
        EventRecord {
            id: None,
            timestamp: DateTime::parse_from_rfc3339(&format!(
                "2026-03-{:02}T{:02}:00:00+00:00",
                d, hour
            ))
            .unwrap(),
            kind,
            details: EventDetails::None,
            raw_text: None,
            source: "test".to_string(),
        }
    }

    fn fourteen_days(days_with: &[u32], low: f64, high: f64) -> Vec<DailyMetrics> {
        let values: Vec<_> = (1..=14)
            .map(|d| {
                let score = if days_with.contains(&d) { low } else { high };
                (d, Some(score))
            })
            .collect();
        history_sleep(&values)
    }

    #[test]
    fn test_basic_partition_means() {
        let history = fourteen_days(&[2, 5, 9], 60.0, 80.0);
        let events: Vec<_> = [2, 5, 9]
            .iter()
            .map(|&d| event_on(d, 20, EventKind::Alcohol))
            .collect();

        let records = compute_correlations(&events, &history);
        let all = records
            .iter()
            .find(|r| r.metric == Metric::SleepScore && r.bucket == TimeBucket::All)
            .unwrap();

        assert_eq!(all.avg_with_event, 60.0);
        assert_eq!(all.avg_without_event, 80.0);
        assert_eq!(all.delta, -20.0);
        assert_eq!(all.delta_pct, -25.0);
        assert_eq!(all.count_with, 3);
        assert_eq!(all.count_without, 11);
        assert!((all.confidence - 3.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_history_is_a_noop() {
        let history = history_sleep(&[(1, Some(70.0)), (2, Some(75.0))]);
        let events = vec![
            event_on(1, 9, EventKind::Coffee),
            event_on(2, 9, EventKind::Coffee),
        ];
        assert!(compute_correlations(&events, &history).is_empty());
    }

    #[test]
    fn test_sample_floor_for_all_bucket() {
        // Only 2 distinct event days: below the floor of 3
        let history = fourteen_days(&[3, 8], 60.0, 80.0);
        let events = vec![
            event_on(3, 20, EventKind::Alcohol),
            event_on(8, 20, EventKind::Alcohol),
        ];
        let records = compute_correlations(&events, &history);
        assert!(records
            .iter()
            .all(|r| r.bucket != TimeBucket::All || r.count_with >= 3));
        assert!(records
            .iter()
            .find(|r| r.bucket == TimeBucket::All)
            .is_none());
    }

    #[test]
    fn test_bucket_floor_is_lower() {
        // 2 evening events qualify for the evening bucket but not "all"
        let history = fourteen_days(&[3, 8], 60.0, 80.0);
        let events = vec![
            event_on(3, 19, EventKind::Alcohol),
            event_on(8, 22, EventKind::Alcohol),
        ];
        let records = compute_correlations(&events, &history);
        let evening = records
            .iter()
            .find(|r| r.bucket == TimeBucket::Evening && r.metric == Metric::SleepScore);
        assert!(evening.is_some());
        assert_eq!(evening.unwrap().count_with, 2);
    }

    #[test]
    fn test_multiple_events_same_day_count_once() {
        let history = fourteen_days(&[2, 5, 9], 60.0, 80.0);
        let mut events: Vec<_> = [2, 5, 9]
            .iter()
            .map(|&d| event_on(d, 10, EventKind::Coffee))
            .collect();
        // Second coffee on an already-counted day
        events.push(event_on(2, 15, EventKind::Coffee));

        let records = compute_correlations(&events, &history);
        let all = records
            .iter()
            .find(|r| r.metric == Metric::SleepScore && r.bucket == TimeBucket::All)
            .unwrap();
        assert_eq!(all.count_with, 3);
    }

    #[test]
    fn test_missing_metric_days_excluded() {
        let mut history = fourteen_days(&[2, 5, 9], 60.0, 80.0);
        history[0].sleep_score = None;
        let events: Vec<_> = [2, 5, 9]
            .iter()
            .map(|&d| event_on(d, 10, EventKind::Coffee))
            .collect();

        let all = compute_correlations(&events, &history)
            .into_iter()
            .find(|r| r.metric == Metric::SleepScore && r.bucket == TimeBucket::All)
            .unwrap();
        assert_eq!(all.count_with + all.count_without, 13);
    }

    #[test]
    fn test_zero_baseline_avoids_division() {
        let mut history: Vec<DailyMetrics> = (1..=14)
            .map(|d| {
                let mut record = DailyMetrics::empty(day(d));
                record.steps = Some(0.0);
                record
            })
            .collect();
        for d in [2usize, 5, 9] {
            history[d - 1].steps = Some(4000.0);
        }
        let events: Vec<_> = [2, 5, 9]
            .iter()
            .map(|&d| event_on(d, 10, EventKind::Walk))
            .collect();

        let all = compute_correlations(&events, &history)
            .into_iter()
            .find(|r| r.metric == Metric::Steps && r.bucket == TimeBucket::All)
            .unwrap();
        assert_eq!(all.avg_without_event, 0.0);
        assert_eq!(all.delta_pct, 0.0);
    }
}
