//! Error types for the telemetry crate.
//!
//! None of these ever reach a caller of [`crate::send_event`]; they exist so
//! the internal dispatch steps can be tested and so the preference store can
//! report problems to the CLI.

use thiserror::Error;

/// Top-level error type for telemetry operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("git error: {0}")]
    Git(String),

    #[error("preference store error: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A convenience Result alias that defaults to [`TelemetryError`].
pub type Result<T> = std::result::Result<T, TelemetryError>;
