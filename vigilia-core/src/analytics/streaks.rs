//! Habit streak tracking
//!
//! Each habit is a pass/fail predicate over one daily field. A chronological
//! scan of the recent window counts consecutive passing days; a missing
//! value breaks the streak the same way a failing one does.

use crate::types::{DailyMetrics, HabitStreakRecord, Metric};
use chrono::{NaiveDate, Timelike};

/// Days of history scanned per recomputation.
pub const STREAK_WINDOW_DAYS: usize = 90;

/// How a habit decides whether a day qualifies.
#[derive(Debug, Clone)]
pub enum HabitRule {
    /// Metric value at or above a fixed target
    AtLeast(Metric, f64),
    /// Bedtime at or before a wall-clock cutoff, compared hour:minute only
    BedtimeBefore { hour: u32, minute: u32 },
    /// Metric value at or above its own mean over the scanned window
    AbovePersonalMean(Metric),
}

/// A named habit with its qualification rule.
#[derive(Debug, Clone)]
pub struct Habit {
    pub name: &'static str,
    pub rule: HabitRule,
}

/// The built-in habit set.
pub fn default_habits() -> Vec<Habit> {
    vec![
        Habit {
            name: "sleep_7h",
            rule: HabitRule::AtLeast(Metric::TotalSleepDuration, 7.0 * 3600.0),
        },
        Habit {
            name: "steps_8k",
            rule: HabitRule::AtLeast(Metric::Steps, 8000.0),
        },
        Habit {
            name: "bedtime_2300",
            rule: HabitRule::BedtimeBefore { hour: 23, minute: 0 },
        },
        Habit {
            name: "hrv_above_avg",
            rule: HabitRule::AbovePersonalMean(Metric::AverageHrv),
        },
    ]
}

/// Scans `history` (oldest-first) for every habit.
///
/// `prior` carries previously stored records so that best streaks never
/// decrease when the scan window slides past an old run.
pub fn update_streaks(
    history: &[DailyMetrics],
    habits: &[Habit],
    prior: &[HabitStreakRecord],
) -> Vec<HabitStreakRecord> {
    let window = if history.len() > STREAK_WINDOW_DAYS {
        &history[history.len() - STREAK_WINDOW_DAYS..]
    } else {
        history
    };

    let mut out = Vec::new();
    for habit in habits {
        let target = match resolve_target(&habit.rule, window) {
            Some(t) => t,
            None => continue,
        };

        let (current, best, last_day) = scan(window, &habit.rule, target);
        let prior_best = prior
            .iter()
            .find(|r| r.habit == habit.name)
            .map(|r| r.best_streak)
            .unwrap_or(0);

        out.push(HabitStreakRecord {
            habit: habit.name.to_string(),
            current_streak: current,
            best_streak: best.max(prior_best),
            last_day,
            target,
        });
    }
    out
}

/// Numeric target for storage; `None` skips the habit when the dynamic
/// target has no samples to compute from.
fn resolve_target(rule: &HabitRule, window: &[DailyMetrics]) -> Option<f64> {
    match rule {
        HabitRule::AtLeast(_, target) => Some(*target),
        HabitRule::BedtimeBefore { hour, minute } => Some((hour * 60 + minute) as f64),
        HabitRule::AbovePersonalMean(metric) => {
            let values: Vec<f64> = window.iter().filter_map(|d| metric.value_in(d)).collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
    }
}

fn scan(window: &[DailyMetrics], rule: &HabitRule, target: f64) -> (u32, u32, Option<NaiveDate>) {
    let mut streak: u32 = 0;
    let mut best: u32 = 0;
    let mut last_day = None;

    for day in window {
        match qualifies(day, rule, target) {
            Some(true) => {
                streak += 1;
                best = best.max(streak);
                last_day = Some(day.day);
            }
            // A fail and a missing value both break the run
            Some(false) | None => streak = 0,
        }
    }

    (streak, best, last_day)
}

/// `None` when the day carries no value for the habit's field.
fn qualifies(day: &DailyMetrics, rule: &HabitRule, target: f64) -> Option<bool> {
    match rule {
        HabitRule::AtLeast(metric, _) | HabitRule::AbovePersonalMean(metric) => {
            metric.value_in(day).map(|v| v >= target)
        }
        HabitRule::BedtimeBefore { hour, minute } => {
            let bedtime = day.bedtime_start.or(day.bedtime_end)?;
            let time = bedtime.time();
            Some(
                time.hour() < *hour
                    || (time.hour() == *hour && time.minute() <= *minute),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn sleep_history(hours: &[Option<f64>]) -> Vec<DailyMetrics> {
        hours
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let mut record = DailyMetrics::empty(day(i as u32 + 1));
                record.total_sleep_duration = h.map(|v| v * 3600.0);
                record
            })
            .collect()
    }

    fn sleep_habit() -> Vec<Habit> {
        vec![Habit {
            name: "sleep_7h",
            rule: HabitRule::AtLeast(Metric::TotalSleepDuration, 7.0 * 3600.0),
        }]
    }

    #[test]
    fn test_streak_breaks_mid_run() {
        // 8h 8h 6h 8h 8h against a 7h target: run breaks on day 3
        let history =
            sleep_history(&[Some(8.0), Some(8.0), Some(6.0), Some(8.0), Some(8.0)]);
        let records = update_streaks(&history, &sleep_habit(), &[]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].current_streak, 2);
        assert_eq!(records[0].best_streak, 2);
        assert_eq!(records[0].last_day, Some(day(5)));
    }

    #[test]
    fn test_missing_value_breaks_streak() {
        let history = sleep_history(&[Some(8.0), Some(8.0), None, Some(8.0)]);
        let records = update_streaks(&history, &sleep_habit(), &[]);

        assert_eq!(records[0].current_streak, 1);
        assert_eq!(records[0].best_streak, 2);
        // Missing day never updates the last qualifying day
        assert_eq!(records[0].last_day, Some(day(4)));
    }

    #[test]
    fn test_best_streak_never_decreases() {
        let history = sleep_history(&[Some(6.0), Some(8.0)]);
        let prior = vec![HabitStreakRecord {
            habit: "sleep_7h".to_string(),
            current_streak: 0,
            best_streak: 12,
            last_day: None,
            target: 7.0 * 3600.0,
        }];
        let records = update_streaks(&history, &sleep_habit(), &prior);

        assert_eq!(records[0].current_streak, 1);
        assert_eq!(records[0].best_streak, 12);
    }

    #[test]
    fn test_bedtime_cutoff_inclusive_at_the_minute() {
        let habit = vec![Habit {
            name: "bedtime_2300",
            rule: HabitRule::BedtimeBefore { hour: 23, minute: 0 },
        }];
        let mut history: Vec<DailyMetrics> = Vec::new();
        for (i, bt) in [
            "2026-05-01T22:40:00+03:00", // pass
            "2026-05-02T23:00:00+03:00", // pass, exactly at the cutoff
            "2026-05-03T23:01:00+03:00", // fail
            "2026-05-04T22:10:00+03:00", // pass
        ]
        .iter()
        .enumerate()
        {
            let mut record = DailyMetrics::empty(day(i as u32 + 1));
            record.bedtime_start = Some(DateTime::parse_from_rfc3339(bt).unwrap());
            history.push(record);
        }

        let records = update_streaks(&history, &habit, &[]);
        assert_eq!(records[0].current_streak, 1);
        assert_eq!(records[0].best_streak, 2);
    }

    #[test]
    fn test_hrv_target_is_personal_mean() {
        let habit = vec![Habit {
            name: "hrv_above_avg",
            rule: HabitRule::AbovePersonalMean(Metric::AverageHrv),
        }];
        let mut history: Vec<DailyMetrics> = Vec::new();
        for (i, hrv) in [30.0, 50.0, 40.0, 44.0].iter().enumerate() {
            let mut record = DailyMetrics::empty(day(i as u32 + 1));
            record.average_hrv = Some(*hrv);
            history.push(record);
        }

        // Mean = 41; days 2 and 4 pass, day 3 fails between them
        let records = update_streaks(&history, &habit, &[]);
        assert_eq!(records[0].target, 41.0);
        assert_eq!(records[0].current_streak, 1);
        assert_eq!(records[0].best_streak, 1);
    }

    #[test]
    fn test_no_hrv_data_skips_the_habit() {
        let habit = vec![Habit {
            name: "hrv_above_avg",
            rule: HabitRule::AbovePersonalMean(Metric::AverageHrv),
        }];
        let history = sleep_history(&[Some(8.0); 3]);
        assert!(update_streaks(&history, &habit, &[]).is_empty());
    }
}
