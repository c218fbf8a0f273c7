//! Database repository layer
//!
//! Provides typed query and upsert operations for history and derived
//! tables. All derived-table writes are idempotent upserts keyed by their
//! natural key, so a re-run after a crash is safe to retry from the start.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

const DAY_FORMAT: &str = "%Y-%m-%d";

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Daily metrics
    // ============================================

    /// Insert or replace the record for a day (at most one row per day)
    pub fn upsert_daily(&self, daily: &DailyMetrics) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO daily_metrics (
                day, sleep_score, readiness_score, activity_score,
                total_sleep_duration, deep_sleep_duration, rem_sleep_duration,
                sleep_efficiency, sleep_latency, average_hrv,
                lowest_heart_rate, average_heart_rate, steps, stress_high,
                spo2_average, temperature_deviation, bedtime_start, bedtime_end,
                is_weekend, day_of_week
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            ON CONFLICT(day) DO UPDATE SET
                sleep_score = excluded.sleep_score,
                readiness_score = excluded.readiness_score,
                activity_score = excluded.activity_score,
                total_sleep_duration = excluded.total_sleep_duration,
                deep_sleep_duration = excluded.deep_sleep_duration,
                rem_sleep_duration = excluded.rem_sleep_duration,
                sleep_efficiency = excluded.sleep_efficiency,
                sleep_latency = excluded.sleep_latency,
                average_hrv = excluded.average_hrv,
                lowest_heart_rate = excluded.lowest_heart_rate,
                average_heart_rate = excluded.average_heart_rate,
                steps = excluded.steps,
                stress_high = excluded.stress_high,
                spo2_average = excluded.spo2_average,
                temperature_deviation = excluded.temperature_deviation,
                bedtime_start = excluded.bedtime_start,
                bedtime_end = excluded.bedtime_end,
                is_weekend = excluded.is_weekend,
                day_of_week = excluded.day_of_week
            "#,
            params![
                daily.day.format(DAY_FORMAT).to_string(),
                daily.sleep_score,
                daily.readiness_score,
                daily.activity_score,
                daily.total_sleep_duration,
                daily.deep_sleep_duration,
                daily.rem_sleep_duration,
                daily.sleep_efficiency,
                daily.sleep_latency,
                daily.average_hrv,
                daily.lowest_heart_rate,
                daily.average_heart_rate,
                daily.steps,
                daily.stress_high,
                daily.spo2_average,
                daily.temperature_deviation,
                daily.bedtime_start.map(|t| t.to_rfc3339()),
                daily.bedtime_end.map(|t| t.to_rfc3339()),
                daily.is_weekend() as i64,
                daily.day_of_week() as i64,
            ],
        )?;
        Ok(())
    }

    /// Full history, ordered oldest-first
    pub fn daily_history(&self) -> Result<Vec<DailyMetrics>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM daily_metrics ORDER BY day")?;
        let rows = stmt
            .query_map([], Self::row_to_daily)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The most recent `limit` days, ordered oldest-first
    pub fn recent_daily(&self, limit: usize) -> Result<Vec<DailyMetrics>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM daily_metrics ORDER BY day DESC LIMIT ?")?;
        let mut rows = stmt
            .query_map([limit], Self::row_to_daily)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// The newest record, if any
    pub fn latest_daily(&self) -> Result<Option<DailyMetrics>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM daily_metrics ORDER BY day DESC LIMIT 1",
            [],
            Self::row_to_daily,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_daily(row: &Row) -> rusqlite::Result<DailyMetrics> {
        let day_str: String = row.get("day")?;
        let day = NaiveDate::parse_from_str(&day_str, DAY_FORMAT)
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());

        Ok(DailyMetrics {
            day,
            sleep_score: row.get("sleep_score")?,
            readiness_score: row.get("readiness_score")?,
            activity_score: row.get("activity_score")?,
            total_sleep_duration: row.get("total_sleep_duration")?,
            deep_sleep_duration: row.get("deep_sleep_duration")?,
            rem_sleep_duration: row.get("rem_sleep_duration")?,
            sleep_efficiency: row.get("sleep_efficiency")?,
            sleep_latency: row.get("sleep_latency")?,
            average_hrv: row.get("average_hrv")?,
            lowest_heart_rate: row.get("lowest_heart_rate")?,
            average_heart_rate: row.get("average_heart_rate")?,
            steps: row.get("steps")?,
            stress_high: row.get("stress_high")?,
            spo2_average: row.get("spo2_average")?,
            temperature_deviation: row.get("temperature_deviation")?,
            bedtime_start: Self::parse_bedtime(row.get("bedtime_start")?),
            bedtime_end: Self::parse_bedtime(row.get("bedtime_end")?),
        })
    }

    /// A single malformed timestamp drops that value from aggregates, not
    /// the whole batch.
    fn parse_bedtime(raw: Option<String>) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        let raw = raw?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                tracing::debug!(value = %raw, error = %e, "Skipping malformed bedtime timestamp");
                None
            }
        }
    }

    // ============================================
    // Events
    // ============================================

    /// Append an event; returns the assigned row id
    pub fn insert_event(&self, event: &EventRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO events (ts, event_type, details, raw_text, source)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                event.timestamp.to_rfc3339(),
                event.kind.storage_key(),
                serde_json::to_string(&event.details)?,
                event.raw_text,
                event.source,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All events, ordered by timestamp
    pub fn events(&self) -> Result<Vec<EventRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM events ORDER BY ts")?;
        let rows = stmt
            .query_map([], Self::row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<EventRecord> {
        let ts_str: String = row.get("ts")?;
        let kind_str: String = row.get("event_type")?;
        let details_str: String = row.get("details")?;

        Ok(EventRecord {
            id: Some(row.get("id")?),
            timestamp: DateTime::parse_from_rfc3339(&ts_str).unwrap_or_else(|_| {
                DateTime::parse_from_rfc3339("1970-01-01T00:00:00+00:00").unwrap()
            }),
            kind: EventKind::from_storage(&kind_str),
            details: serde_json::from_str(&details_str).unwrap_or_default(),
            raw_text: row.get("raw_text")?,
            source: row.get("source")?,
        })
    }

    // ============================================
    // Correlations (derived)
    // ============================================

    /// Upsert by (event type, metric, time bucket); recomputation overwrites
    pub fn upsert_correlation(&self, record: &CorrelationRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO correlations (
                event_type, metric_name, time_bucket,
                avg_with_event, avg_without_event, delta, delta_pct,
                count_with, count_without, confidence, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(event_type, metric_name, time_bucket) DO UPDATE SET
                avg_with_event = excluded.avg_with_event,
                avg_without_event = excluded.avg_without_event,
                delta = excluded.delta,
                delta_pct = excluded.delta_pct,
                count_with = excluded.count_with,
                count_without = excluded.count_without,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at
            "#,
            params![
                record.event_kind.storage_key(),
                record.metric.as_str(),
                record.bucket.as_str(),
                record.avg_with_event,
                record.avg_without_event,
                record.delta,
                record.delta_pct,
                record.count_with as i64,
                record.count_without as i64,
                record.confidence,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Correlations, optionally restricted to one time bucket, strongest
    /// delta first
    pub fn correlations(&self, bucket: Option<TimeBucket>) -> Result<Vec<CorrelationRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = match bucket {
            Some(_) => {
                "SELECT * FROM correlations WHERE time_bucket = ? ORDER BY ABS(delta_pct) DESC"
            }
            None => "SELECT * FROM correlations ORDER BY ABS(delta_pct) DESC",
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = match bucket {
            Some(b) => stmt
                .query_map([b.as_str()], Self::row_to_correlation)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], Self::row_to_correlation)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    fn row_to_correlation(row: &Row) -> rusqlite::Result<CorrelationRecord> {
        let kind_str: String = row.get("event_type")?;
        let metric_str: String = row.get("metric_name")?;
        let bucket_str: String = row.get("time_bucket")?;
        let count_with: i64 = row.get("count_with")?;
        let count_without: i64 = row.get("count_without")?;

        Ok(CorrelationRecord {
            event_kind: EventKind::from_storage(&kind_str),
            metric: Metric::from_str(&metric_str)
                .map_err(|_| rusqlite::Error::InvalidQuery)?,
            bucket: TimeBucket::from_storage(&bucket_str).unwrap_or(TimeBucket::All),
            avg_with_event: row.get("avg_with_event")?,
            avg_without_event: row.get("avg_without_event")?,
            delta: row.get("delta")?,
            delta_pct: row.get("delta_pct")?,
            count_with: count_with as usize,
            count_without: count_without as usize,
            confidence: row.get("confidence")?,
        })
    }

    // ============================================
    // Percentiles (derived)
    // ============================================

    /// Upsert by metric name
    pub fn upsert_percentile(&self, metric: Metric, record: &PercentileRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO percentile_cache (metric_name, p10, p25, p50, p75, p90, count, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(metric_name) DO UPDATE SET
                p10 = excluded.p10,
                p25 = excluded.p25,
                p50 = excluded.p50,
                p75 = excluded.p75,
                p90 = excluded.p90,
                count = excluded.count,
                updated_at = excluded.updated_at
            "#,
            params![
                metric.as_str(),
                record.p10,
                record.p25,
                record.p50,
                record.p75,
                record.p90,
                record.count as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Cached percentiles for one metric
    pub fn percentile(&self, metric: Metric) -> Result<Option<PercentileRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM percentile_cache WHERE metric_name = ?",
            [metric.as_str()],
            Self::row_to_percentile,
        )
        .optional()
        .map_err(Error::from)
    }

    /// All cached percentiles keyed by metric
    pub fn percentiles(&self) -> Result<BTreeMap<Metric, PercentileRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM percentile_cache")?;
        let rows = stmt.query_map([], |row| {
            let metric_str: String = row.get("metric_name")?;
            Ok((metric_str, Self::row_to_percentile(row)?))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (metric_str, record) = row?;
            if let Ok(metric) = Metric::from_str(&metric_str) {
                map.insert(metric, record);
            }
        }
        Ok(map)
    }

    fn row_to_percentile(row: &Row) -> rusqlite::Result<PercentileRecord> {
        let count: i64 = row.get("count")?;
        Ok(PercentileRecord {
            p10: row.get("p10")?,
            p25: row.get("p25")?,
            p50: row.get("p50")?,
            p75: row.get("p75")?,
            p90: row.get("p90")?,
            count: count as usize,
        })
    }

    // ============================================
    // Habit streaks (derived)
    // ============================================

    /// Upsert by habit name
    pub fn upsert_streak(&self, record: &HabitStreakRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO habit_streaks
                (habit_name, current_streak, best_streak, last_day, target_value, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(habit_name) DO UPDATE SET
                current_streak = excluded.current_streak,
                best_streak = excluded.best_streak,
                last_day = excluded.last_day,
                target_value = excluded.target_value,
                updated_at = excluded.updated_at
            "#,
            params![
                record.habit,
                record.current_streak as i64,
                record.best_streak as i64,
                record.last_day.map(|d| d.format(DAY_FORMAT).to_string()),
                record.target,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All habit streaks, ordered by name
    pub fn streaks(&self) -> Result<Vec<HabitStreakRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM habit_streaks ORDER BY habit_name")?;
        let rows = stmt
            .query_map([], |row| {
                let current: i64 = row.get("current_streak")?;
                let best: i64 = row.get("best_streak")?;
                let last_day: Option<String> = row.get("last_day")?;
                Ok(HabitStreakRecord {
                    habit: row.get("habit_name")?,
                    current_streak: current as u32,
                    best_streak: best as u32,
                    last_day: last_day
                        .and_then(|s| NaiveDate::parse_from_str(&s, DAY_FORMAT).ok()),
                    target: row.get("target_value")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ============================================
    // Key-value engine state
    // ============================================

    pub(crate) fn state_get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM engine_state WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn state_set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO engine_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_upsert_is_one_row_per_day() {
        let db = test_db();
        let mut record = DailyMetrics::empty(day(2026, 8, 1));
        record.sleep_score = Some(70.0);
        db.upsert_daily(&record).unwrap();

        record.sleep_score = Some(82.0);
        db.upsert_daily(&record).unwrap();

        let history = db.daily_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sleep_score, Some(82.0));
    }

    #[test]
    fn test_missing_metrics_stay_absent() {
        let db = test_db();
        db.upsert_daily(&DailyMetrics::empty(day(2026, 8, 1))).unwrap();

        let history = db.daily_history().unwrap();
        assert_eq!(history[0].sleep_score, None);
        assert_eq!(history[0].average_hrv, None);
    }

    #[test]
    fn test_recent_daily_ordering() {
        let db = test_db();
        for d in 1..=10 {
            db.upsert_daily(&DailyMetrics::empty(day(2026, 8, d))).unwrap();
        }

        let recent = db.recent_daily(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].day, day(2026, 8, 8));
        assert_eq!(recent[2].day, day(2026, 8, 10));

        let latest = db.latest_daily().unwrap().unwrap();
        assert_eq!(latest.day, day(2026, 8, 10));
    }

    #[test]
    fn test_event_roundtrip() {
        let db = test_db();
        let event = EventRecord {
            id: None,
            timestamp: DateTime::parse_from_rfc3339("2026-08-01T18:30:00+03:00").unwrap(),
            kind: EventKind::Medication("lisinopril".to_string()),
            details: EventDetails::Medication {
                dosage: Some(10),
                unit: Some("mg".to_string()),
            },
            raw_text: Some("lisinopril 10mg".to_string()),
            source: "cli".to_string(),
        };
        let id = db.insert_event(&event).unwrap();
        assert!(id > 0);

        let events = db.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, event.kind);
        assert_eq!(events[0].details, event.details);
        assert_eq!(events[0].day(), day(2026, 8, 1));
    }

    #[test]
    fn test_correlation_upsert_overwrites() {
        let db = test_db();
        let mut record = CorrelationRecord {
            event_kind: EventKind::Coffee,
            metric: Metric::SleepScore,
            bucket: TimeBucket::All,
            avg_with_event: 70.0,
            avg_without_event: 80.0,
            delta: -10.0,
            delta_pct: -12.5,
            count_with: 4,
            count_without: 10,
            confidence: 4.0 / 14.0,
        };
        db.upsert_correlation(&record).unwrap();

        record.delta = -5.0;
        db.upsert_correlation(&record).unwrap();

        let rows = db.correlations(Some(TimeBucket::All)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta, -5.0);
    }

    #[test]
    fn test_percentile_upsert_and_fetch() {
        let db = test_db();
        let record = PercentileRecord {
            p10: 60.0,
            p25: 65.0,
            p50: 72.0,
            p75: 80.0,
            p90: 88.0,
            count: 30,
        };
        db.upsert_percentile(Metric::SleepScore, &record).unwrap();
        db.upsert_percentile(Metric::SleepScore, &record).unwrap();

        let fetched = db.percentile(Metric::SleepScore).unwrap().unwrap();
        assert_eq!(fetched.p50, 72.0);
        assert_eq!(db.percentiles().unwrap().len(), 1);
        assert!(db.percentile(Metric::Steps).unwrap().is_none());
    }

    #[test]
    fn test_streak_roundtrip() {
        let db = test_db();
        let record = HabitStreakRecord {
            habit: "sleep_7h".to_string(),
            current_streak: 3,
            best_streak: 9,
            last_day: Some(day(2026, 8, 10)),
            target: 7.0 * 3600.0,
        };
        db.upsert_streak(&record).unwrap();

        let rows = db.streaks().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current_streak, 3);
        assert_eq!(rows[0].best_streak, 9);
        assert_eq!(rows[0].last_day, Some(day(2026, 8, 10)));
    }

    #[test]
    fn test_state_roundtrip() {
        let db = test_db();
        assert!(db.state_get("baseline").unwrap().is_none());

        let value = serde_json::json!({"answer": 42});
        db.state_set("baseline", &value).unwrap();
        assert_eq!(db.state_get("baseline").unwrap(), Some(value));

        let replaced = serde_json::json!({"answer": 43});
        db.state_set("baseline", &replaced).unwrap();
        assert_eq!(db.state_get("baseline").unwrap(), Some(replaced));
    }
}
