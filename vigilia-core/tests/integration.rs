//! Integration tests for the vigilia analytics and alerting pipeline
//!
//! These tests exercise the full flow against a real on-disk SQLite
//! database: seed history and events, run the nightly batch, run alert
//! checks, and verify the derived tables and persisted state.

use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;
use vigilia_core::alerts::{AlertMonitor, CheckOutcome, Thresholds};
use vigilia_core::db::Database;
use vigilia_core::error::Result;
use vigilia_core::state::StateStore;
use vigilia_core::types::{
    DailyMetrics, EventDetails, EventKind, EventRecord, Metric, TimeBucket,
};
use vigilia_core::{analytics, format, Config};

/// Records sent messages; optionally refuses every delivery.
#[derive(Default)]
struct RecordingNotifier {
    sent: std::cell::RefCell<Vec<String>>,
    fail: bool,
}

impl vigilia_core::notify::Notifier for RecordingNotifier {
    fn send(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(vigilia_core::Error::Notify("refused".to_string()));
        }
        self.sent.borrow_mut().push(text.to_string());
        Ok(())
    }
}

fn open_db(dir: &TempDir) -> Database {
    let db = Database::open(&dir.path().join("vigilia.db")).unwrap();
    db.migrate().unwrap();
    db
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 1).unwrap() + chrono::Duration::days(offset)
}

/// Thirty days of steady metrics, with worse sleep on alcohol evenings.
fn seed(db: &Database) {
    for i in 0..30 {
        let drinking = i % 6 == 3;
        let mut record = DailyMetrics::empty(day(i));
        record.sleep_score = Some(if drinking { 58.0 } else { 79.0 });
        record.readiness_score = Some(77.0);
        record.total_sleep_duration = Some(if drinking { 6.0 * 3600.0 } else { 7.6 * 3600.0 });
        record.average_hrv = Some(46.0);
        record.lowest_heart_rate = Some(52.0);
        record.steps = Some(9000.0);
        record.bedtime_start = Some(
            DateTime::parse_from_rfc3339(&format!("{}T22:4{}:00+03:00", day(i), i % 3)).unwrap(),
        );
        db.upsert_daily(&record).unwrap();

        if drinking {
            db.insert_event(&EventRecord {
                id: None,
                timestamp: DateTime::parse_from_rfc3339(&format!("{}T20:30:00+03:00", day(i)))
                    .unwrap(),
                kind: EventKind::Alcohol,
                details: EventDetails::Consumption {
                    quantity: Some(2),
                    time: None,
                },
                raw_text: Some("two glasses of wine".to_string()),
                source: "cli".to_string(),
            })
            .unwrap();
        }
    }
}

#[test]
fn test_nightly_batch_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    seed(&db);

    let outcome = analytics::run_nightly(&db);
    assert!(outcome.is_clean());

    // Percentiles cover the metrics that have data
    let percentiles = db.percentiles().unwrap();
    assert!(percentiles.contains_key(&Metric::SleepScore));
    let sleep = percentiles[&Metric::SleepScore];
    assert!(sleep.p10 <= sleep.p50 && sleep.p50 <= sleep.p90);
    assert_eq!(sleep.count, 30);

    // Alcohol evenings depress sleep score in the "all" bucket
    let correlations = db.correlations(Some(TimeBucket::All)).unwrap();
    let alcohol_sleep = correlations
        .iter()
        .find(|r| r.event_kind == EventKind::Alcohol && r.metric == Metric::SleepScore)
        .expect("alcohol/sleep correlation should materialize");
    assert!(alcohol_sleep.delta < 0.0);
    assert_eq!(alcohol_sleep.count_with, 5);
    assert_eq!(alcohol_sleep.count_without, 25);

    // Evening bucket picks up the same pattern at its lower floor
    assert!(db
        .correlations(Some(TimeBucket::Evening))
        .unwrap()
        .iter()
        .any(|r| r.event_kind == EventKind::Alcohol));

    // All four default habits have data in this fixture
    let streaks = db.streaks().unwrap();
    assert_eq!(streaks.len(), 4);
    let bedtime = streaks.iter().find(|s| s.habit == "bedtime_2300").unwrap();
    assert_eq!(bedtime.current_streak, 30);
}

#[test]
fn test_nightly_rerun_leaves_same_derived_state() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    seed(&db);

    analytics::run_nightly(&db);
    let first = db.correlations(None).unwrap().len();
    analytics::run_nightly(&db);
    assert_eq!(db.correlations(None).unwrap().len(), first);
}

#[test]
fn test_alert_check_with_dedup_across_checks() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    seed(&db);

    // Crash readiness on a new latest day
    let mut crash = DailyMetrics::empty(day(30));
    crash.readiness_score = Some(40.0);
    crash.sleep_score = Some(79.0);
    db.upsert_daily(&crash).unwrap();

    let notifier = RecordingNotifier::default();
    let monitor = AlertMonitor::new(&db, &notifier, Thresholds::default(), 12, 24);
    let now = Utc::now();

    assert_eq!(monitor.run_check(&db, now).unwrap(), CheckOutcome::Sent(1));
    assert!(notifier.sent.borrow()[0].contains("Readiness"));

    // Half an hour later the same drop is still present but deduplicated
    let later = now + chrono::Duration::minutes(30);
    assert_eq!(
        monitor.run_check(&db, later).unwrap(),
        CheckOutcome::AllDeduplicated
    );
    assert_eq!(notifier.sent.borrow().len(), 1);

    // The ledger survives a process restart (it lives in the database)
    let reopened = Database::open(&dir.path().join("vigilia.db")).unwrap();
    reopened.migrate().unwrap();
    let ledger = reopened.load_ledger().unwrap();
    assert!(ledger.last_sent.contains_key(&Metric::ReadinessScore));
}

#[test]
fn test_failed_delivery_keeps_alerts_eligible() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    seed(&db);

    let mut crash = DailyMetrics::empty(day(30));
    crash.readiness_score = Some(40.0);
    db.upsert_daily(&crash).unwrap();

    let broken = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let now = Utc::now();
    let monitor = AlertMonitor::new(&db, &broken, Thresholds::default(), 12, 24);
    assert_eq!(
        monitor.run_check(&db, now).unwrap(),
        CheckOutcome::DeliveryFailed(1)
    );
    assert!(db.load_ledger().unwrap().last_sent.is_empty());

    // Next cycle with a working sender delivers and only then marks sent
    let working = RecordingNotifier::default();
    let monitor = AlertMonitor::new(&db, &working, Thresholds::default(), 12, 24);
    assert_eq!(
        monitor
            .run_check(&db, now + chrono::Duration::minutes(30))
            .unwrap(),
        CheckOutcome::Sent(1)
    );
    assert_eq!(db.load_ledger().unwrap().last_sent.len(), 1);
}

#[test]
fn test_status_report_sections() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    seed(&db);
    analytics::run_nightly(&db);

    let report = format::build_status_report(&db, &Config::default()).unwrap();
    assert!(report.contains("PERCENTILE POSITION"));
    assert!(report.contains("top 10%"));
    assert!(report.contains("HABIT STREAKS"));
    assert!(report.contains("CIRCADIAN RHYTHM"));
    assert!(report.contains("EVENT CORRELATIONS"));
    assert!(report.contains("alcohol"));
}

#[test]
fn test_empty_database_everything_noops() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);

    let outcome = analytics::run_nightly(&db);
    assert!(outcome.is_clean());
    assert_eq!(outcome.percentiles_updated, 0);

    let notifier = RecordingNotifier::default();
    let monitor = AlertMonitor::new(&db, &notifier, Thresholds::default(), 12, 24);
    assert_eq!(
        monitor.run_check(&db, Utc::now()).unwrap(),
        CheckOutcome::NoData
    );

    let report = format::build_status_report(&db, &Config::default()).unwrap();
    assert!(report.contains("No metric history"));
}
