//! Error taxonomy for the telemetry pipeline.
//!
//! Each concern gets its own enum so callers can decide what is fatal:
//! - [`ParseError`]: one malformed device record (skip and continue)
//! - [`LoadError`]: flat-file access (missing historical log is recoverable)
//! - [`FeedError`]: live device feed (connection and per-read failures)
//! - [`ForecastError`]: forecaster preconditions and numerical failures
//!
//! Application edges (`main.rs`, the binaries) wrap these in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

// ---

/// A raw device record could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {index} has no ':' separator: '{field}'")]
    MissingSeparator { index: usize, field: String },

    #[error("field {index}: expected label '{expected}', found '{found}'")]
    UnexpectedLabel {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("field '{label}': '{value}' is not a number")]
    InvalidNumber { label: &'static str, value: String },

    #[error("invalid timestamp '{0}' (expected YYYY-MM-DD HH-MM-SS)")]
    InvalidTimestamp(String),
}

/// A flat file could not be read or written.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed model file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected header in {}: expected '{expected}', found '{found}'", path.display())]
    Header {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl LoadError {
    /// Map an `io::Error` for `path`, keeping "not found" distinguishable.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        // ---
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::FileNotFound(path)
        } else {
            LoadError::Io { path, source }
        }
    }
}

/// The live device feed failed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Device unavailable at startup; the real-time view is disabled.
    #[error("cannot open device {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single read failed; treated as "no data this tick".
    #[error("transient read error: {0}")]
    TransientRead(#[source] std::io::Error),
}

/// Forecaster preconditions were not met or the fit failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required} monthly points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid series: {0}")]
    InvalidSeries(String),

    #[error("invalid forecast horizon {horizon}: must be between {min} and {max} months")]
    InvalidHorizon { horizon: usize, min: usize, max: usize },

    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// A granularity label was not one of `daily`, `weekly`, `monthly`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown granularity '{0}' (expected daily, weekly or monthly)")]
pub struct UnknownGranularity(pub String);
