//! Core domain types for vigilia
//!
//! These types form the canonical data model for a single subject's health
//! history and the derived analytics built on top of it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Metric** | One of the tracked daily physiological measurements |
//! | **DailyMetrics** | All metric values for one calendar day (one row per day) |
//! | **Event** | A user-logged lifestyle event (coffee, workout, medication, ...) |
//! | **Baseline** | Rolling 7-day mean per metric, refreshed at most once per 24h |
//! | **Streak** | Count of consecutive days a habit predicate held |
//! | **Time bucket** | Morning/afternoon/evening partition of event timestamps |
//!
//! `Metric` is the single declaration of the tracked metric set: the
//! percentile, correlation, and streak modules all iterate the slices
//! defined here rather than carrying their own field lists.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Metrics
// ============================================

/// Canonical enumeration of tracked daily metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepScore,
    ReadinessScore,
    ActivityScore,
    TotalSleepDuration,
    DeepSleepDuration,
    RemSleepDuration,
    SleepEfficiency,
    SleepLatency,
    AverageHrv,
    LowestHeartRate,
    AverageHeartRate,
    Steps,
    StressHigh,
    Spo2Average,
    TemperatureDeviation,
}

impl Metric {
    /// Every tracked metric.
    pub const ALL: [Metric; 15] = [
        Metric::SleepScore,
        Metric::ReadinessScore,
        Metric::ActivityScore,
        Metric::TotalSleepDuration,
        Metric::DeepSleepDuration,
        Metric::RemSleepDuration,
        Metric::SleepEfficiency,
        Metric::SleepLatency,
        Metric::AverageHrv,
        Metric::LowestHeartRate,
        Metric::AverageHeartRate,
        Metric::Steps,
        Metric::StressHigh,
        Metric::Spo2Average,
        Metric::TemperatureDeviation,
    ];

    /// Metrics included in the percentile cache.
    pub const PERCENTILED: [Metric; 13] = [
        Metric::SleepScore,
        Metric::ReadinessScore,
        Metric::ActivityScore,
        Metric::TotalSleepDuration,
        Metric::DeepSleepDuration,
        Metric::RemSleepDuration,
        Metric::AverageHrv,
        Metric::LowestHeartRate,
        Metric::Steps,
        Metric::SleepEfficiency,
        Metric::SleepLatency,
        Metric::TemperatureDeviation,
        Metric::StressHigh,
    ];

    /// Metrics compared against event occurrence by the correlation engine.
    pub const CORRELATED: [Metric; 11] = [
        Metric::SleepScore,
        Metric::ReadinessScore,
        Metric::TotalSleepDuration,
        Metric::DeepSleepDuration,
        Metric::RemSleepDuration,
        Metric::AverageHrv,
        Metric::LowestHeartRate,
        Metric::SleepEfficiency,
        Metric::SleepLatency,
        Metric::StressHigh,
        Metric::Steps,
    ];

    /// Returns the identifier used in database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::SleepScore => "sleep_score",
            Metric::ReadinessScore => "readiness_score",
            Metric::ActivityScore => "activity_score",
            Metric::TotalSleepDuration => "total_sleep_duration",
            Metric::DeepSleepDuration => "deep_sleep_duration",
            Metric::RemSleepDuration => "rem_sleep_duration",
            Metric::SleepEfficiency => "sleep_efficiency",
            Metric::SleepLatency => "sleep_latency",
            Metric::AverageHrv => "average_hrv",
            Metric::LowestHeartRate => "lowest_heart_rate",
            Metric::AverageHeartRate => "average_heart_rate",
            Metric::Steps => "steps",
            Metric::StressHigh => "stress_high",
            Metric::Spo2Average => "spo2_average",
            Metric::TemperatureDeviation => "temperature_deviation",
        }
    }

    /// True for metrics where a lower value is the better one.
    ///
    /// Percentile ranking direction inverts for these.
    pub fn lower_is_better(&self) -> bool {
        matches!(
            self,
            Metric::LowestHeartRate
                | Metric::SleepLatency
                | Metric::StressHigh
                | Metric::TemperatureDeviation
        )
    }

    /// Reads this metric's value out of a daily record; absent stays absent.
    pub fn value_in(&self, day: &DailyMetrics) -> Option<f64> {
        match self {
            Metric::SleepScore => day.sleep_score,
            Metric::ReadinessScore => day.readiness_score,
            Metric::ActivityScore => day.activity_score,
            Metric::TotalSleepDuration => day.total_sleep_duration,
            Metric::DeepSleepDuration => day.deep_sleep_duration,
            Metric::RemSleepDuration => day.rem_sleep_duration,
            Metric::SleepEfficiency => day.sleep_efficiency,
            Metric::SleepLatency => day.sleep_latency,
            Metric::AverageHrv => day.average_hrv,
            Metric::LowestHeartRate => day.lowest_heart_rate,
            Metric::AverageHeartRate => day.average_heart_rate,
            Metric::Steps => day.steps,
            Metric::StressHigh => day.stress_high,
            Metric::Spo2Average => day.spo2_average,
            Metric::TemperatureDeviation => day.temperature_deviation,
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown metric: {}", s))
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Daily metrics
// ============================================

/// All tracked metric values for one calendar day.
///
/// Missing metrics are `None`, never zero, and must be excluded from
/// aggregates. At most one record exists per day (upsert by day).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Calendar day this record belongs to (unique key)
    pub day: NaiveDate,
    pub sleep_score: Option<f64>,
    pub readiness_score: Option<f64>,
    pub activity_score: Option<f64>,
    /// Total sleep in seconds
    pub total_sleep_duration: Option<f64>,
    pub deep_sleep_duration: Option<f64>,
    pub rem_sleep_duration: Option<f64>,
    pub sleep_efficiency: Option<f64>,
    pub sleep_latency: Option<f64>,
    pub average_hrv: Option<f64>,
    pub lowest_heart_rate: Option<f64>,
    pub average_heart_rate: Option<f64>,
    pub steps: Option<f64>,
    /// Seconds of high stress recorded during the day
    pub stress_high: Option<f64>,
    pub spo2_average: Option<f64>,
    /// Degrees Celsius away from personal norm
    pub temperature_deviation: Option<f64>,
    /// Wall-clock instant sleep started, in the subject's local offset
    pub bedtime_start: Option<DateTime<FixedOffset>>,
    pub bedtime_end: Option<DateTime<FixedOffset>>,
}

impl DailyMetrics {
    /// A record for `day` with every metric absent.
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            sleep_score: None,
            readiness_score: None,
            activity_score: None,
            total_sleep_duration: None,
            deep_sleep_duration: None,
            rem_sleep_duration: None,
            sleep_efficiency: None,
            sleep_latency: None,
            average_hrv: None,
            lowest_heart_rate: None,
            average_heart_rate: None,
            steps: None,
            stress_high: None,
            spo2_average: None,
            temperature_deviation: None,
            bedtime_start: None,
            bedtime_end: None,
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.day.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Monday = 0 .. Sunday = 6
    pub fn day_of_week(&self) -> u32 {
        self.day.weekday().num_days_from_monday()
    }
}

// ============================================
// Events
// ============================================

/// User-logged lifestyle event vocabulary.
///
/// Fixed known kinds plus an open tail: medications carry their name,
/// anything unrecognized lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Coffee,
    Alcohol,
    Hookah,
    Walk,
    Workout,
    Stress,
    LateMeal,
    Supplement,
    Meditation,
    Nap,
    ColdShower,
    Sauna,
    Travel,
    Illness,
    Party,
    BloodPressure,
    BloodSugar,
    /// A named medication, stored as `med_<name>`
    Medication(String),
    Other(String),
}

impl EventKind {
    /// Identifier used in database storage.
    pub fn storage_key(&self) -> String {
        match self {
            EventKind::Coffee => "coffee".into(),
            EventKind::Alcohol => "alcohol".into(),
            EventKind::Hookah => "hookah".into(),
            EventKind::Walk => "walk".into(),
            EventKind::Workout => "workout".into(),
            EventKind::Stress => "stress".into(),
            EventKind::LateMeal => "late_meal".into(),
            EventKind::Supplement => "supplement".into(),
            EventKind::Meditation => "meditation".into(),
            EventKind::Nap => "nap".into(),
            EventKind::ColdShower => "cold_shower".into(),
            EventKind::Sauna => "sauna".into(),
            EventKind::Travel => "travel".into(),
            EventKind::Illness => "illness".into(),
            EventKind::Party => "party".into(),
            EventKind::BloodPressure => "blood_pressure".into(),
            EventKind::BloodSugar => "blood_sugar".into(),
            EventKind::Medication(name) => format!("med_{}", name),
            EventKind::Other(s) => s.clone(),
        }
    }

    /// Parses a storage identifier back into a kind. Never fails; unknown
    /// identifiers become `Other`.
    pub fn from_storage(s: &str) -> Self {
        match s {
            "coffee" => EventKind::Coffee,
            "alcohol" => EventKind::Alcohol,
            "hookah" => EventKind::Hookah,
            "walk" => EventKind::Walk,
            "workout" => EventKind::Workout,
            "stress" => EventKind::Stress,
            "late_meal" => EventKind::LateMeal,
            "supplement" => EventKind::Supplement,
            "meditation" => EventKind::Meditation,
            "nap" => EventKind::Nap,
            "cold_shower" => EventKind::ColdShower,
            "sauna" => EventKind::Sauna,
            "travel" => EventKind::Travel,
            "illness" => EventKind::Illness,
            "party" => EventKind::Party,
            "blood_pressure" => EventKind::BloodPressure,
            "blood_sugar" => EventKind::BloodSugar,
            other => match other.strip_prefix("med_") {
                Some(name) if !name.is_empty() => EventKind::Medication(name.to_string()),
                _ => EventKind::Other(other.to_string()),
            },
        }
    }

    /// Metrics this kind of event is expected to move; used only to order
    /// correlation report output, never to restrict the computation.
    pub fn affected_metrics(&self) -> &'static [Metric] {
        match self {
            EventKind::Coffee => &[
                Metric::SleepScore,
                Metric::AverageHrv,
                Metric::SleepLatency,
                Metric::LowestHeartRate,
            ],
            EventKind::Alcohol => &[
                Metric::SleepScore,
                Metric::AverageHrv,
                Metric::DeepSleepDuration,
                Metric::LowestHeartRate,
                Metric::ReadinessScore,
            ],
            EventKind::Hookah => &[
                Metric::SleepScore,
                Metric::AverageHrv,
                Metric::LowestHeartRate,
                Metric::Spo2Average,
            ],
            EventKind::Walk => &[Metric::ReadinessScore, Metric::Steps, Metric::StressHigh],
            EventKind::Workout => &[
                Metric::ReadinessScore,
                Metric::AverageHrv,
                Metric::DeepSleepDuration,
                Metric::SleepScore,
            ],
            EventKind::Stress => &[
                Metric::SleepScore,
                Metric::AverageHrv,
                Metric::LowestHeartRate,
                Metric::StressHigh,
            ],
            EventKind::LateMeal => &[
                Metric::SleepScore,
                Metric::SleepLatency,
                Metric::DeepSleepDuration,
            ],
            EventKind::Supplement => &[
                Metric::SleepScore,
                Metric::AverageHrv,
                Metric::DeepSleepDuration,
            ],
            EventKind::Meditation => &[
                Metric::StressHigh,
                Metric::AverageHrv,
                Metric::LowestHeartRate,
            ],
            EventKind::Nap => &[Metric::ReadinessScore, Metric::StressHigh],
            EventKind::ColdShower => &[
                Metric::AverageHrv,
                Metric::LowestHeartRate,
                Metric::ReadinessScore,
            ],
            EventKind::Sauna => &[
                Metric::AverageHrv,
                Metric::LowestHeartRate,
                Metric::DeepSleepDuration,
                Metric::SleepScore,
            ],
            EventKind::Travel => &[
                Metric::SleepScore,
                Metric::ReadinessScore,
                Metric::StressHigh,
            ],
            EventKind::Illness => &[
                Metric::ReadinessScore,
                Metric::SleepScore,
                Metric::LowestHeartRate,
                Metric::TemperatureDeviation,
            ],
            EventKind::Party => &[
                Metric::SleepScore,
                Metric::ReadinessScore,
                Metric::AverageHrv,
            ],
            EventKind::BloodPressure | EventKind::Medication(_) => &[
                Metric::LowestHeartRate,
                Metric::AverageHrv,
                Metric::StressHigh,
                Metric::ReadinessScore,
            ],
            EventKind::BloodSugar => &[
                Metric::SleepScore,
                Metric::ReadinessScore,
                Metric::StressHigh,
                Metric::AverageHrv,
            ],
            EventKind::Other(_) => &[],
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Typed per-kind detail payload for an event.
///
/// A closed variant set with fixed optional fields, so downstream code can
/// pattern-match exhaustively instead of probing a string-keyed map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetails {
    #[default]
    None,
    /// Consumables: coffee, alcohol, supplements, meals
    Consumption {
        quantity: Option<u32>,
        /// Wall-clock "HH:MM" if the user mentioned one
        time: Option<String>,
    },
    Medication {
        dosage: Option<u32>,
        unit: Option<String>,
    },
    BloodPressure {
        systolic: u32,
        diastolic: u32,
        pulse: Option<u32>,
    },
    BloodSugar {
        glucose: f64,
    },
    BodyWeight {
        weight_kg: f64,
    },
}

/// A single user-logged event. Immutable once analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Database row id, None before insertion
    pub id: Option<i64>,
    /// When the event happened, in the subject's local offset
    pub timestamp: DateTime<FixedOffset>,
    pub kind: EventKind,
    pub details: EventDetails,
    /// Original free text the event was logged from, if any
    pub raw_text: Option<String>,
    /// Ingestion channel ("text", "voice", "photo", "cli")
    pub source: String,
}

impl EventRecord {
    /// Calendar day the event belongs to, derived from its timestamp.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Local hour of day, 0-23.
    pub fn hour(&self) -> u32 {
        use chrono::Timelike;
        self.timestamp.time().hour()
    }
}

// EventKind serializes through its storage key so events round-trip the
// same identifier the database uses.
impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.storage_key())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::from_storage(&s))
    }
}

// ============================================
// Time buckets
// ============================================

/// Time-of-day partition used for finer-grained correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    All,
    Morning,
    Afternoon,
    Evening,
}

impl TimeBucket {
    /// Buckets covering specific hours, in scan order.
    pub const HOURLY: [TimeBucket; 3] =
        [TimeBucket::Morning, TimeBucket::Afternoon, TimeBucket::Evening];

    /// Half-open hour range [start, end) covered by this bucket.
    pub fn hours(&self) -> (u32, u32) {
        match self {
            TimeBucket::All => (0, 24),
            TimeBucket::Morning => (6, 12),
            TimeBucket::Afternoon => (12, 18),
            TimeBucket::Evening => (18, 24),
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        let (start, end) = self.hours();
        hour >= start && hour < end
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::All => "all",
            TimeBucket::Morning => "morning",
            TimeBucket::Afternoon => "afternoon",
            TimeBucket::Evening => "evening",
        }
    }

    pub fn from_storage(s: &str) -> Option<Self> {
        match s {
            "all" => Some(TimeBucket::All),
            "morning" => Some(TimeBucket::Morning),
            "afternoon" => Some(TimeBucket::Afternoon),
            "evening" => Some(TimeBucket::Evening),
            _ => None,
        }
    }
}

// ============================================
// Derived records
// ============================================

/// Association between an event kind and a metric within one time bucket.
///
/// Descriptive same-day correlation, not a causal or lagged effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub event_kind: EventKind,
    pub metric: Metric,
    pub bucket: TimeBucket,
    pub avg_with_event: f64,
    pub avg_without_event: f64,
    pub delta: f64,
    pub delta_pct: f64,
    pub count_with: usize,
    pub count_without: usize,
    /// Sample-balance heuristic in [0, 1]; NOT a statistical p-value.
    /// 0.5 means perfectly balanced partitions, near 0 means skewed.
    pub confidence: f64,
}

/// Distributional position of a metric over the full history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PercentileRecord {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub count: usize,
}

/// Where a value sits relative to its metric's personal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentileBand {
    Top10,
    Top25,
    Bottom25,
    Bottom10,
}

impl PercentileBand {
    pub fn label(&self) -> &'static str {
        match self {
            PercentileBand::Top10 => "top 10%",
            PercentileBand::Top25 => "top 25%",
            PercentileBand::Bottom25 => "bottom 25%",
            PercentileBand::Bottom10 => "bottom 10%",
        }
    }
}

/// Current and best consecutive-day runs for one habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitStreakRecord {
    pub habit: String,
    pub current_streak: u32,
    /// Monotonically non-decreasing across recomputations of the same window
    pub best_streak: u32,
    pub last_day: Option<NaiveDate>,
    pub target: f64,
}

/// Accumulated sleep deficit over a recent window.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepDebt {
    pub debt_hours: f64,
    pub avg_sleep_hours: f64,
    pub days_to_payoff: u32,
    pub label: DebtLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtLabel {
    None,
    Small,
    Significant,
    Critical,
}

impl DebtLabel {
    pub fn label(&self) -> &'static str {
        match self {
            DebtLabel::None => "no sleep debt",
            DebtLabel::Small => "small debt",
            DebtLabel::Significant => "significant debt",
            DebtLabel::Critical => "critical debt",
        }
    }
}

/// Bedtime regularity over a recent window.
#[derive(Debug, Clone, PartialEq)]
pub struct CircadianStability {
    pub stdev_minutes: f64,
    /// Mean bedtime renormalized into a 0-1439 minute-of-day for display
    pub avg_bedtime: NaiveTime,
    /// 0-100; 0 minutes of spread scores 100, >=60 minutes scores 0
    pub stability_score: u8,
    pub label: StabilityLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityLabel {
    Excellent,
    Good,
    Moderate,
    Unstable,
}

impl StabilityLabel {
    pub fn label(&self) -> &'static str {
        match self {
            StabilityLabel::Excellent => "excellent stability",
            StabilityLabel::Good => "good stability",
            StabilityLabel::Moderate => "moderate instability",
            StabilityLabel::Unstable => "unstable rhythm",
        }
    }
}

// ============================================
// Alerting state
// ============================================

/// Rolling 7-day mean per tracked metric plus a freshness timestamp.
///
/// Persisted through the state store and recomputed when older than the
/// configured freshness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub values: BTreeMap<Metric, f64>,
    pub updated_at: DateTime<Utc>,
}

impl BaselineSnapshot {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn is_stale(&self, now: DateTime<Utc>, freshness_hours: i64) -> bool {
        now.signed_duration_since(self.updated_at) >= chrono::Duration::hours(freshness_hours)
    }
}

/// Per-metric timestamp of the last alert actually delivered.
///
/// Entries are overwritten per key, never accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertLedger {
    pub last_sent: BTreeMap<Metric, DateTime<Utc>>,
}

impl AlertLedger {
    /// True when an alert for `metric` was delivered inside the dedup window.
    pub fn is_suppressed(
        &self,
        metric: Metric,
        now: DateTime<Utc>,
        window_hours: i64,
    ) -> bool {
        match self.last_sent.get(&metric) {
            Some(sent) => now.signed_duration_since(*sent) < chrono::Duration::hours(window_hours),
            None => false,
        }
    }
}

/// Alert severity. Red implies the stronger threshold was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Yellow,
    Red,
}

impl Severity {
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Yellow => "\u{1f7e1}",
            Severity::Red => "\u{1f534}",
        }
    }
}

/// A triggered threshold, ready for formatting and deduplication.
#[derive(Debug, Clone)]
pub struct Alert {
    pub metric: Metric,
    pub severity: Severity,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_roundtrip() {
        for metric in Metric::ALL {
            let parsed: Metric = metric.as_str().parse().unwrap();
            assert_eq!(parsed, metric);
        }
        assert!("not_a_metric".parse::<Metric>().is_err());
    }

    #[test]
    fn test_lower_is_better_set() {
        assert!(Metric::LowestHeartRate.lower_is_better());
        assert!(Metric::SleepLatency.lower_is_better());
        assert!(Metric::StressHigh.lower_is_better());
        assert!(Metric::TemperatureDeviation.lower_is_better());
        assert!(!Metric::SleepScore.lower_is_better());
        assert!(!Metric::AverageHrv.lower_is_better());
    }

    #[test]
    fn test_event_kind_storage_roundtrip() {
        let kinds = [
            EventKind::Coffee,
            EventKind::LateMeal,
            EventKind::Medication("lisinopril".to_string()),
            EventKind::Other("acupuncture".to_string()),
        ];
        for kind in kinds {
            assert_eq!(EventKind::from_storage(&kind.storage_key()), kind);
        }
        assert_eq!(
            EventKind::from_storage("med_glucophage"),
            EventKind::Medication("glucophage".to_string())
        );
    }

    #[test]
    fn test_time_bucket_hours() {
        assert!(TimeBucket::Morning.contains_hour(6));
        assert!(!TimeBucket::Morning.contains_hour(12));
        assert!(TimeBucket::Afternoon.contains_hour(12));
        assert!(TimeBucket::Evening.contains_hour(23));
        assert!(!TimeBucket::Evening.contains_hour(3));
    }

    #[test]
    fn test_event_day_derived_from_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2026-03-14T23:45:00+02:00").unwrap();
        let event = EventRecord {
            id: None,
            timestamp: ts,
            kind: EventKind::Coffee,
            details: EventDetails::None,
            raw_text: None,
            source: "cli".to_string(),
        };
        assert_eq!(event.day(), NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        assert_eq!(event.hour(), 23);
    }

    #[test]
    fn test_event_details_json_tagged() {
        let details = EventDetails::BloodPressure {
            systolic: 120,
            diastolic: 80,
            pulse: Some(72),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["type"], "blood_pressure");
        assert_eq!(json["systolic"], 120);
        let back: EventDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn test_alert_ledger_suppression() {
        let now = Utc::now();
        let mut ledger = AlertLedger::default();
        ledger
            .last_sent
            .insert(Metric::ReadinessScore, now - chrono::Duration::hours(2));
        assert!(ledger.is_suppressed(Metric::ReadinessScore, now, 12));
        assert!(!ledger.is_suppressed(Metric::SleepScore, now, 12));

        ledger
            .last_sent
            .insert(Metric::SleepScore, now - chrono::Duration::hours(13));
        assert!(!ledger.is_suppressed(Metric::SleepScore, now, 12));
    }

    #[test]
    fn test_baseline_staleness() {
        let now = Utc::now();
        let fresh = BaselineSnapshot {
            values: BTreeMap::new(),
            updated_at: now - chrono::Duration::hours(3),
        };
        assert!(!fresh.is_stale(now, 24));

        let stale = BaselineSnapshot {
            values: BTreeMap::new(),
            updated_at: now - chrono::Duration::hours(25),
        };
        assert!(stale.is_stale(now, 24));
    }

    #[test]
    fn test_weekend_flag() {
        // 2026-08-29 is a Saturday
        let sat = DailyMetrics::empty(NaiveDate::from_ymd_opt(2026, 8, 29).unwrap());
        let mon = DailyMetrics::empty(NaiveDate::from_ymd_opt(2026, 8, 31).unwrap());
        assert!(sat.is_weekend());
        assert!(!mon.is_weekend());
        assert_eq!(mon.day_of_week(), 0);
    }
}
