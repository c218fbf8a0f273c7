//! # vigilia-core
//!
//! Core library for vigilia - a personal health analytics engine.
//!
//! This library provides:
//! - Domain types for daily metrics, lifestyle events, and derived records
//! - Database storage layer with SQLite
//! - The analytics engine (percentiles, correlations, streaks, sleep debt,
//!   circadian stability)
//! - Threshold alerting with baseline tracking and deduplication
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through two layers:
//! - **Layer 1 (Canonical):** daily metric rows and event rows, written by
//!   ingestion and read-only to the engine
//! - **Layer 2 (Derived):** correlations, percentiles, streaks, and the
//!   baseline/ledger state (regenerable, idempotent upserts)
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigilia_core::{analytics, Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! // Recompute the derived tables
//! let outcome = analytics::run_nightly(&db);
//! println!("{} correlations updated", outcome.correlations_updated);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use state::StateStore;
pub use types::*;

// Public modules
pub mod alerts;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod notify;
pub mod state;
pub mod types;
