//! vigilia - personal health analytics engine
//!
//! Command-line front end for the analytics and alerting pipeline: run the
//! nightly recompute, run alert checks, log lifestyle events, and print the
//! status report.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use clap::{Parser, Subcommand};
use vigilia_core::alerts::{AlertMonitor, CheckOutcome};
use vigilia_core::notify::{Notifier, TelegramNotifier};
use vigilia_core::types::{EventDetails, EventKind, EventRecord};
use vigilia_core::{analytics, format, Config, Database};

#[derive(Parser)]
#[command(name = "vigilia")]
#[command(about = "Personal health analytics engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute the derived tables (percentiles, correlations, streaks)
    Nightly,

    /// Run one alert check against the latest metrics
    Check,

    /// Run alert checks on an interval, with a nightly recompute
    Watch {
        /// Minutes between alert checks
        #[arg(long, default_value_t = 30)]
        interval_minutes: u64,

        /// Local hour (0-23) at which the nightly recompute runs
        #[arg(long, default_value_t = 2)]
        nightly_hour: u32,
    },

    /// Log a lifestyle event (coffee, alcohol, workout, med_<name>, ...)
    Event {
        /// Event kind identifier
        kind: String,

        /// How many (cups, glasses, ...)
        #[arg(long)]
        quantity: Option<u32>,

        /// Free-text note stored alongside the event
        #[arg(long)]
        note: Option<String>,

        /// Event time as RFC 3339; defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Print the status report
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Config::ensure_xdg_env();
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = vigilia_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match cli.command {
        Commands::Nightly => run_nightly(&db),
        Commands::Check => run_check(&db, &config),
        Commands::Watch {
            interval_minutes,
            nightly_hour,
        } => run_watch(&db, &config, interval_minutes, nightly_hour),
        Commands::Event {
            kind,
            quantity,
            note,
            at,
        } => log_event(&db, &kind, quantity, note, at),
        Commands::Status => {
            let report = format::build_status_report(&db, &config)
                .context("failed to build status report")?;
            println!("{}", report);
            Ok(())
        }
    }
}

fn run_nightly(db: &Database) -> Result<()> {
    let outcome = analytics::run_nightly(db);
    println!(
        "Nightly batch: {} percentiles, {} correlations, {} streaks updated",
        outcome.percentiles_updated, outcome.correlations_updated, outcome.streaks_updated
    );
    for failure in &outcome.failures {
        eprintln!("stage failed: {}", failure);
    }
    Ok(())
}

fn run_check(db: &Database, config: &Config) -> Result<()> {
    let notifier = build_notifier(config)?;
    let monitor = AlertMonitor::new(
        db,
        notifier.as_ref(),
        config.thresholds.clone(),
        config.alerts.dedup_window_hours,
        config.alerts.baseline_freshness_hours,
    );

    match monitor.run_check(db, Utc::now())? {
        CheckOutcome::NoData => println!("No metric history yet; nothing to check."),
        CheckOutcome::NoAlerts => println!("All metrics within normal range."),
        CheckOutcome::AllDeduplicated => {
            println!("Alerts triggered but were all sent recently; nothing new.")
        }
        CheckOutcome::Sent(n) => println!("Sent {} alert(s).", n),
        CheckOutcome::DeliveryFailed(n) => {
            eprintln!("Delivery failed for {} alert(s); will retry next check.", n)
        }
    }
    Ok(())
}

fn run_watch(
    db: &Database,
    config: &Config,
    interval_minutes: u64,
    nightly_hour: u32,
) -> Result<()> {
    let notifier = build_notifier(config)?;
    let monitor = AlertMonitor::new(
        db,
        notifier.as_ref(),
        config.thresholds.clone(),
        config.alerts.dedup_window_hours,
        config.alerts.baseline_freshness_hours,
    );
    let interval = std::time::Duration::from_secs(interval_minutes * 60);
    let mut last_nightly = None;

    tracing::info!(interval_minutes, nightly_hour, "Watch loop starting");
    loop {
        // Each tick is independently fault-isolated: a failed check must
        // never take down the loop.
        match monitor.run_check(db, Utc::now()) {
            Ok(outcome) => tracing::debug!(?outcome, "Alert check finished"),
            Err(e) => tracing::warn!(error = %e, "Alert check failed"),
        }

        let now = Local::now();
        let today = now.date_naive();
        if should_run_nightly(last_nightly, today, now.hour(), nightly_hour) {
            let outcome = analytics::run_nightly(db);
            if !outcome.is_clean() {
                tracing::warn!(failures = ?outcome.failures, "Nightly batch had failures");
            }
            last_nightly = Some(today);
        }

        std::thread::sleep(interval);
    }
}

/// Due when it has not run today and the nightly hour has passed.
///
/// Checked against "at or past the hour", not equality, so a check
/// interval longer than an hour cannot step over the slot.
fn should_run_nightly(
    last_nightly: Option<chrono::NaiveDate>,
    today: chrono::NaiveDate,
    hour_now: u32,
    nightly_hour: u32,
) -> bool {
    last_nightly != Some(today) && hour_now >= nightly_hour
}

fn log_event(
    db: &Database,
    kind: &str,
    quantity: Option<u32>,
    note: Option<String>,
    at: Option<String>,
) -> Result<()> {
    let timestamp: DateTime<FixedOffset> = match at {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("invalid --at timestamp: {}", raw))?,
        None => Local::now().fixed_offset(),
    };

    let kind = EventKind::from_storage(kind);
    let details = match quantity {
        Some(q) => EventDetails::Consumption {
            quantity: Some(q),
            time: None,
        },
        None => EventDetails::None,
    };

    let event = EventRecord {
        id: None,
        timestamp,
        kind: kind.clone(),
        details,
        raw_text: note,
        source: "cli".to_string(),
    };
    let id = db.insert_event(&event).context("failed to store event")?;
    println!("Logged {} at {} (#{})", kind, timestamp.format("%H:%M"), id);
    Ok(())
}

/// Telegram when credentials are configured, console otherwise.
fn build_notifier(config: &Config) -> Result<Box<dyn Notifier>> {
    if let Some(telegram) = &config.telegram {
        if let Some((token, chat_id)) = telegram.credentials() {
            return Ok(Box::new(TelegramNotifier::new(token, chat_id)?));
        }
        tracing::warn!("Telegram section present but credentials incomplete; using console");
    }
    Ok(Box::new(ConsoleNotifier))
}

/// Prints alerts to stdout when no delivery channel is configured.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, text: &str) -> vigilia_core::Result<()> {
        println!("{}", text);
        Ok(())
    }
}
