//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: canonical history tables plus derived analytics tables
    r#"
    -- ============================================
    -- LAYER 1: Canonical history (written by ingestion, read-only here)
    -- ============================================

    CREATE TABLE IF NOT EXISTS daily_metrics (
        day                   TEXT PRIMARY KEY,
        sleep_score           REAL,
        readiness_score       REAL,
        activity_score        REAL,
        total_sleep_duration  REAL,
        deep_sleep_duration   REAL,
        rem_sleep_duration    REAL,
        sleep_efficiency      REAL,
        sleep_latency         REAL,
        average_hrv           REAL,
        lowest_heart_rate     REAL,
        average_heart_rate    REAL,
        steps                 REAL,
        stress_high           REAL,
        spo2_average          REAL,
        temperature_deviation REAL,
        bedtime_start         TEXT,
        bedtime_end           TEXT,
        is_weekend            INTEGER NOT NULL DEFAULT 0,
        day_of_week           INTEGER,
        created_at            DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS events (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        ts          DATETIME NOT NULL,
        event_type  TEXT NOT NULL,
        details     JSON NOT NULL DEFAULT '{"type":"none"}',
        raw_text    TEXT,
        source      TEXT NOT NULL DEFAULT 'text',
        created_at  DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts);
    CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);

    -- ============================================
    -- LAYER 2: Derived (regenerable, idempotent natural-key upserts)
    -- ============================================

    CREATE TABLE IF NOT EXISTS correlations (
        event_type        TEXT NOT NULL,
        metric_name       TEXT NOT NULL,
        time_bucket       TEXT NOT NULL,
        avg_with_event    REAL NOT NULL,
        avg_without_event REAL NOT NULL,
        delta             REAL NOT NULL,
        delta_pct         REAL NOT NULL,
        count_with        INTEGER NOT NULL,
        count_without     INTEGER NOT NULL,
        confidence        REAL NOT NULL,
        updated_at        DATETIME NOT NULL,

        PRIMARY KEY (event_type, metric_name, time_bucket)
    );

    CREATE TABLE IF NOT EXISTS percentile_cache (
        metric_name TEXT PRIMARY KEY,
        p10         REAL NOT NULL,
        p25         REAL NOT NULL,
        p50         REAL NOT NULL,
        p75         REAL NOT NULL,
        p90         REAL NOT NULL,
        count       INTEGER NOT NULL,
        updated_at  DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS habit_streaks (
        habit_name     TEXT PRIMARY KEY,
        current_streak INTEGER NOT NULL DEFAULT 0,
        best_streak    INTEGER NOT NULL DEFAULT 0,
        last_day       TEXT,
        target_value   REAL NOT NULL DEFAULT 0,
        updated_at     DATETIME NOT NULL
    );

    -- Key-value state for baseline snapshots and the alert dedup ledger
    CREATE TABLE IF NOT EXISTS engine_state (
        key        TEXT PRIMARY KEY,
        value      JSON NOT NULL,
        updated_at DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
