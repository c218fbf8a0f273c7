//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/vigilia/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/vigilia/` (~/.config/vigilia/)
//! - Data: `$XDG_DATA_HOME/vigilia/` (~/.local/share/vigilia/)
//! - State/Logs: `$XDG_STATE_HOME/vigilia/` (~/.local/state/vigilia/)
//!
//! Every numeric knob is a static constant with a config-file and
//! environment-variable override (`VIGILIA_*`); nothing is computed
//! dynamically at runtime.

use crate::alerts::Thresholds;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Alerting configuration
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Threshold table overrides
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Telegram delivery credentials (optional; console fallback otherwise)
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Alerting configuration
#[derive(Debug, Deserialize)]
pub struct AlertsConfig {
    /// Hours between two alerts for the same metric
    #[serde(default = "default_dedup_window_hours")]
    pub dedup_window_hours: i64,

    /// Hours before the persisted baseline is recomputed
    #[serde(default = "default_baseline_freshness_hours")]
    pub baseline_freshness_hours: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            dedup_window_hours: default_dedup_window_hours(),
            baseline_freshness_hours: default_baseline_freshness_hours(),
        }
    }
}

fn default_dedup_window_hours() -> i64 {
    12
}

fn default_baseline_freshness_hours() -> i64 {
    24
}

/// Analytics configuration
#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    /// Nightly sleep target in hours, for the debt ledger
    #[serde(default = "default_sleep_target_hours")]
    pub sleep_target_hours: f64,

    /// Window for sleep debt and circadian stability, in days
    #[serde(default = "default_window_days")]
    pub window_days: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sleep_target_hours: default_sleep_target_hours(),
            window_days: default_window_days(),
        }
    }
}

fn default_sleep_target_hours() -> f64 {
    7.5
}

fn default_window_days() -> usize {
    14
}

/// Telegram delivery credentials
#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Bot token (can also use VIGILIA_BOT_TOKEN)
    pub bot_token: Option<String>,
    /// Destination chat id (can also use VIGILIA_CHAT_ID)
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// Resolved (token, chat id) pair, env vars taking precedence.
    pub fn credentials(&self) -> Option<(String, String)> {
        let token = std::env::var("VIGILIA_BOT_TOKEN")
            .ok()
            .or_else(|| self.bot_token.clone())?;
        let chat_id = std::env::var("VIGILIA_CHAT_ID")
            .ok()
            .or_else(|| self.chat_id.clone())?;
        Some((token, chat_id))
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default().with_env_overrides());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config.with_env_overrides())
    }

    /// Applies `VIGILIA_*` environment overrides on top of file values.
    fn with_env_overrides(mut self) -> Self {
        if let Some(hours) = env_parse::<i64>("VIGILIA_DEDUP_HOURS") {
            self.alerts.dedup_window_hours = hours;
        }
        if let Some(hours) = env_parse::<i64>("VIGILIA_BASELINE_FRESHNESS_HOURS") {
            self.alerts.baseline_freshness_hours = hours;
        }
        if let Some(hours) = env_parse::<f64>("VIGILIA_SLEEP_TARGET_HOURS") {
            self.analytics.sleep_target_hours = hours;
        }
        self
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/vigilia/config.toml` (~/.config/vigilia/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("vigilia").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/vigilia/` (~/.local/share/vigilia/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("vigilia")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/vigilia/` (~/.local/state/vigilia/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("vigilia")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/vigilia/data.db` (~/.local/share/vigilia/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/vigilia/vigilia.log` (~/.local/state/vigilia/vigilia.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("vigilia.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
