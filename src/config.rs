//! Configuration loader for the `hydromind` service and tools.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). By consolidating configuration logic
//! here, we avoid scattering `env::var` calls throughout the codebase.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::forecast::{ForecasterConfig, MAX_HORIZON, MIN_HORIZON};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional path environment variable with a default value.
macro_rules! path_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from($default))
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Raw reading log (CSV).
    pub historical_log_path: PathBuf,

    /// Daily aggregate file (CSV), written by `hydro-train`.
    pub daily_aggregate_path: PathBuf,

    /// Persisted forecast model (JSON).
    pub model_path: PathBuf,

    /// Forecast export (CSV).
    pub forecast_export_path: PathBuf,

    /// Serial device node of the live telemetry feed.
    pub device_path: PathBuf,

    /// Whether to start the live feed at all.
    pub live_feed_enabled: bool,

    /// Nominal seconds between readings, used for volume conversion.
    pub sample_interval_secs: f64,

    /// Default forecast horizon in months.
    pub forecast_horizon: usize,

    /// Minimum monthly points before a fit is attempted.
    pub forecast_min_points: usize,

    /// Months held out when validating the forecaster.
    pub holdout_months: usize,

    /// Retention cap of the live ring buffer.
    pub live_buffer_capacity: usize,

    /// Live feed polling tick.
    pub poll_interval: Duration,

    /// HTTP listen port.
    pub listen_port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `HISTORICAL_LOG_PATH` – raw log (default: `1_year_data.csv`)
/// - `DAILY_AGGREGATE_PATH` – daily aggregate (default: `daily_aggregated.csv`)
/// - `MODEL_PATH` – persisted model (default: `prediction/forecast_model.json`)
/// - `FORECAST_EXPORT_PATH` – forecast CSV (default: `forecast_data.csv`)
/// - `DEVICE_PATH` – serial device (default: `/dev/rfcomm0`)
/// - `LIVE_FEED_ENABLED` – start the live feed (default: true)
/// - `SAMPLE_INTERVAL_SECS` – nominal sampling interval (default: 1)
/// - `FORECAST_HORIZON` – months to project, 1..=36 (default: 24)
/// - `FORECAST_MIN_POINTS` – minimum monthly points (default: 24)
/// - `HOLDOUT_MONTHS` – validation hold-out (default: 24)
/// - `LIVE_BUFFER_CAPACITY` – live readings kept (default: 3600)
/// - `POLL_INTERVAL_MS` – live polling tick (default: 1000)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let sample_interval_secs = parse_env!("SAMPLE_INTERVAL_SECS", f64, 1.0);
    if !(sample_interval_secs.is_finite() && sample_interval_secs > 0.0) {
        return Err(anyhow!(
            "SAMPLE_INTERVAL_SECS must be positive, got {}",
            sample_interval_secs
        ));
    }

    let forecast_horizon = parse_env!("FORECAST_HORIZON", usize, 24);
    if !(MIN_HORIZON..=MAX_HORIZON).contains(&forecast_horizon) {
        return Err(anyhow!(
            "FORECAST_HORIZON must be between {} and {}, got {}",
            MIN_HORIZON,
            MAX_HORIZON,
            forecast_horizon
        ));
    }

    Ok(Config {
        historical_log_path: path_env!("HISTORICAL_LOG_PATH", "1_year_data.csv"),
        daily_aggregate_path: path_env!("DAILY_AGGREGATE_PATH", "daily_aggregated.csv"),
        model_path: path_env!("MODEL_PATH", "prediction/forecast_model.json"),
        forecast_export_path: path_env!("FORECAST_EXPORT_PATH", "forecast_data.csv"),
        device_path: path_env!("DEVICE_PATH", "/dev/rfcomm0"),
        live_feed_enabled: parse_env!("LIVE_FEED_ENABLED", bool, true),
        sample_interval_secs,
        forecast_horizon,
        forecast_min_points: parse_env!("FORECAST_MIN_POINTS", usize, 24),
        holdout_months: parse_env!("HOLDOUT_MONTHS", usize, crate::forecast::DEFAULT_HOLDOUT),
        live_buffer_capacity: parse_env!("LIVE_BUFFER_CAPACITY", usize, 3600),
        poll_interval: Duration::from_millis(parse_env!("POLL_INTERVAL_MS", u64, 1000)),
        listen_port: parse_env!("LISTEN_PORT", u16, 8080),
    })
}

impl Config {
    /// Forecaster settings derived from this configuration.
    pub fn forecaster(&self) -> ForecasterConfig {
        // ---
        ForecasterConfig {
            min_points: self.forecast_min_points,
            ..ForecasterConfig::default()
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  HISTORICAL_LOG_PATH  : {}", self.historical_log_path.display());
        tracing::info!("  DAILY_AGGREGATE_PATH : {}", self.daily_aggregate_path.display());
        tracing::info!("  MODEL_PATH           : {}", self.model_path.display());
        tracing::info!("  FORECAST_EXPORT_PATH : {}", self.forecast_export_path.display());
        tracing::info!("  DEVICE_PATH          : {}", self.device_path.display());
        tracing::info!("  LIVE_FEED_ENABLED    : {}", self.live_feed_enabled);
        tracing::info!("  SAMPLE_INTERVAL_SECS : {}", self.sample_interval_secs);
        tracing::info!("  FORECAST_HORIZON     : {}", self.forecast_horizon);
        tracing::info!("  FORECAST_MIN_POINTS  : {}", self.forecast_min_points);
        tracing::info!("  HOLDOUT_MONTHS       : {}", self.holdout_months);
        tracing::info!("  LIVE_BUFFER_CAPACITY : {}", self.live_buffer_capacity);
        tracing::info!("  POLL_INTERVAL_MS     : {}", self.poll_interval.as_millis());
        tracing::info!("  LISTEN_PORT          : {}", self.listen_port);
    }
}

impl Default for Config {
    /// The same values `load_from_env` yields with an empty environment.
    fn default() -> Self {
        // ---
        Config {
            historical_log_path: PathBuf::from("1_year_data.csv"),
            daily_aggregate_path: PathBuf::from("daily_aggregated.csv"),
            model_path: PathBuf::from("prediction/forecast_model.json"),
            forecast_export_path: PathBuf::from("forecast_data.csv"),
            device_path: PathBuf::from("/dev/rfcomm0"),
            live_feed_enabled: true,
            sample_interval_secs: 1.0,
            forecast_horizon: 24,
            forecast_min_points: 24,
            holdout_months: crate::forecast::DEFAULT_HOLDOUT,
            live_buffer_capacity: 3600,
            poll_interval: Duration::from_millis(1000),
            listen_port: 8080,
        }
    }
}
