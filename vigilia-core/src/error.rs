//! Error types for vigilia-core

use thiserror::Error;

/// Main error type for the vigilia-core library
///
/// Insufficient data is deliberately not an error: computations that lack
/// samples no-op and leave prior derived state untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Notification delivery error
    #[error("notification error: {0}")]
    Notify(String),
}

/// Result type alias for vigilia-core
pub type Result<T> = std::result::Result<T, Error>;
