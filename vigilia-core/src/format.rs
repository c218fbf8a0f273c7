//! Report formatting
//!
//! Renders the derived analytics into plain-text report sections. Each
//! section returns `None` when its data is missing so the assembled report
//! only contains what can actually be said.

use crate::analytics::weekday::WeekdayComparison;
use crate::analytics::{circadian, percentiles, sleep_debt, weekday};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::types::{
    CircadianStability, CorrelationRecord, DailyMetrics, HabitStreakRecord, Metric,
    PercentileRecord, SleepDebt, TimeBucket,
};
use std::collections::BTreeMap;

/// Correlations below this confidence are too skewed to report.
const MIN_REPORT_CONFIDENCE: f64 = 0.1;
/// Event-day floor for reported correlations.
const MIN_REPORT_COUNT_WITH: usize = 3;
/// Strongest correlations shown per report.
const MAX_REPORTED_CORRELATIONS: usize = 5;

/// Assembles the full status report from the database.
pub fn build_status_report(db: &Database, config: &Config) -> Result<String> {
    let mut report = String::from("VIGILIA STATUS\n");

    let Some(latest) = db.latest_daily()? else {
        report.push_str("\nNo metric history yet.\n");
        return Ok(report);
    };
    report.push_str(&format!("Latest data: {}\n\n", latest.day));

    let history = db.daily_history()?;

    if let Some(section) = percentile_section(&latest, &db.percentiles()?) {
        report.push_str(&section);
    }
    if let Some(section) = streaks_section(&db.streaks()?) {
        report.push_str(&section);
    }
    if let Some(debt) = sleep_debt::compute_sleep_debt(
        &history,
        config.analytics.window_days,
        config.analytics.sleep_target_hours,
    ) {
        report.push_str(&sleep_debt_section(&debt));
    }
    if let Some(stability) = circadian::compute_stability(&history, config.analytics.window_days)
    {
        report.push_str(&circadian_section(&stability));
    }
    if let Some(section) = correlations_section(&db.correlations(Some(TimeBucket::All))?) {
        report.push_str(&section);
    }
    if let Some(stats) = weekday::compute_weekday_weekend(&history) {
        report.push_str(&weekday_section(&stats));
    }

    Ok(report)
}

/// Where the latest values sit in the personal distribution.
///
/// Only values landing in a top or bottom band are worth a line;
/// mid-distribution metrics stay silent.
pub fn percentile_section(
    latest: &DailyMetrics,
    percentiles: &BTreeMap<Metric, PercentileRecord>,
) -> Option<String> {
    let mut lines = Vec::new();
    for (metric, record) in percentiles {
        let Some(value) = metric.value_in(latest) else {
            continue;
        };
        if let Some(band) = percentiles::classify(*metric, value, record) {
            lines.push(format!("  {}: {:.0} ({})\n", metric, value, band.label()));
        }
    }
    if lines.is_empty() {
        return None;
    }

    let mut section = String::from("PERCENTILE POSITION\n");
    for line in lines {
        section.push_str(&line);
    }
    section.push('\n');
    Some(section)
}

/// Habit streaks section.
pub fn streaks_section(streaks: &[HabitStreakRecord]) -> Option<String> {
    if streaks.is_empty() {
        return None;
    }

    let mut section = String::from("HABIT STREAKS\n");
    for record in streaks {
        let label = match record.habit.as_str() {
            "sleep_7h" => "Sleep \u{2265}7h",
            "steps_8k" => "Steps \u{2265}8K",
            "bedtime_2300" => "Bedtime by 23:00",
            "hrv_above_avg" => "HRV above average",
            other => other,
        };
        let badge = if record.current_streak >= 7 {
            " \u{1f525}"
        } else if record.current_streak >= 3 {
            " \u{2b50}"
        } else {
            ""
        };
        section.push_str(&format!(
            "  {}: {} days{}",
            label, record.current_streak, badge
        ));
        if record.best_streak > record.current_streak {
            section.push_str(&format!(" (best: {})", record.best_streak));
        }
        section.push('\n');
    }
    section.push('\n');
    Some(section)
}

/// Sleep debt section.
pub fn sleep_debt_section(debt: &SleepDebt) -> String {
    let mut section = String::from("SLEEP DEBT\n");
    section.push_str(&format!(
        "  {:.1}h accumulated ({}), avg {:.1}h/night\n",
        debt.debt_hours,
        debt.label.label(),
        debt.avg_sleep_hours
    ));
    if debt.days_to_payoff > 0 {
        section.push_str(&format!(
            "  ~{} nights of +30 min sleep to pay off\n",
            debt.days_to_payoff
        ));
    }
    section.push('\n');
    section
}

/// Circadian rhythm section.
pub fn circadian_section(stability: &CircadianStability) -> String {
    let mut section = String::from("CIRCADIAN RHYTHM\n");
    section.push_str(&format!(
        "  Average bedtime: {}\n",
        stability.avg_bedtime.format("%H:%M")
    ));
    section.push_str(&format!(
        "  Spread: \u{b1}{:.0} min (target: <30)\n",
        stability.stdev_minutes
    ));
    section.push_str(&format!(
        "  {} (score {})\n\n",
        stability.label.label(),
        stability.stability_score
    ));
    section
}

/// Strongest event/metric correlations, filtered for sample quality.
pub fn correlations_section(records: &[CorrelationRecord]) -> Option<String> {
    let mut reportable: Vec<&CorrelationRecord> = records
        .iter()
        .filter(|r| {
            r.confidence >= MIN_REPORT_CONFIDENCE && r.count_with >= MIN_REPORT_COUNT_WITH
        })
        .collect();
    if reportable.is_empty() {
        return None;
    }

    // Pairs the event is expected to move sort ahead of incidental ones,
    // strongest delta first within each group.
    reportable.sort_by(|a, b| {
        let a_expected = a.event_kind.affected_metrics().contains(&a.metric);
        let b_expected = b.event_kind.affected_metrics().contains(&b.metric);
        b_expected.cmp(&a_expected).then_with(|| {
            b.delta_pct
                .abs()
                .partial_cmp(&a.delta_pct.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let mut section = String::from("EVENT CORRELATIONS\n");
    for record in reportable.iter().take(MAX_REPORTED_CORRELATIONS) {
        let direction = if record.delta > 0.0 { "+" } else { "" };
        section.push_str(&format!(
            "  {} \u{2192} {}: {}{:.1}% ({} days with, {} without)\n",
            record.event_kind,
            record.metric,
            direction,
            record.delta_pct,
            record.count_with,
            record.count_without
        ));
    }
    section.push('\n');
    Some(section)
}

/// Weekday vs weekend section.
pub fn weekday_section(stats: &BTreeMap<Metric, WeekdayComparison>) -> String {
    let mut section = String::from("WEEKDAYS VS WEEKENDS\n");
    for (metric, comparison) in stats {
        let (weekday, weekend, unit) = if *metric == Metric::TotalSleepDuration {
            (
                comparison.weekday / 3600.0,
                comparison.weekend / 3600.0,
                "h",
            )
        } else {
            (comparison.weekday, comparison.weekend, "")
        };
        let arrow = if comparison.delta > 0.0 {
            "\u{2197}"
        } else if comparison.delta < 0.0 {
            "\u{2198}"
        } else {
            "\u{2192}"
        };
        section.push_str(&format!(
            "  {}: weekdays {:.1}{} | weekends {:.1}{} {}\n",
            metric, weekday, unit, weekend, unit, arrow
        ));
    }
    section.push('\n');
    section
}
