//! Flat-file layout for `hydromind`.
//!
//! Declares the column layout of every CSV the pipeline reads or writes
//! and makes sure the directories holding them exist before the service
//! starts. Applied once on startup from `main.rs`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::error::LoadError;
use crate::Config;

// ---

/// Historical log columns. `purity` may also appear as `turbidity`.
pub const HISTORICAL_COLUMNS: [&str; 4] = ["timestamp", "flow_rate", "temperature", "purity"];

/// Daily aggregate columns, in file order.
pub const DAILY_COLUMNS: [&str; 13] = [
    "timestamp",
    "daily_liters_sum",
    "daily_flow_mean",
    "daily_flow_max",
    "daily_flow_min",
    "daily_temp_mean",
    "year",
    "month",
    "day",
    "day_of_week",
    "day_type",
    "rolling_7d_liters_mean",
    "rolling_30d_liters_mean",
];

/// Forecast export columns, in file order.
pub const FORECAST_COLUMNS: [&str; 4] = ["ds", "yhat", "yhat_lower", "yhat_upper"];

/// Create the parent directories of every configured data file (idempotent).
///
/// Safe to call on every startup; existing directories are left alone.
pub fn ensure_layout(cfg: &Config) -> Result<()> {
    // ---
    let files = [
        &cfg.historical_log_path,
        &cfg.daily_aggregate_path,
        &cfg.model_path,
        &cfg.forecast_export_path,
    ];

    for file in files {
        if let Some(dir) = parent_dir(file) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }
    }
    Ok(())
}

/// Check that a historical log header carries every required column.
///
/// Extra columns (the generator's `day_type`, `month`, ...) are allowed.
pub fn check_historical_header(path: &Path, headers: &StringRecord) -> Result<(), LoadError> {
    // ---
    let has = |name: &str| headers.iter().any(|h| h.trim() == name);
    let missing: Vec<&str> = HISTORICAL_COLUMNS
        .iter()
        .copied()
        .filter(|col| match *col {
            "purity" => !has("purity") && !has("turbidity"),
            other => !has(other),
        })
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(LoadError::Header {
        path: PathBuf::from(path),
        expected: HISTORICAL_COLUMNS.join(","),
        found: headers.iter().collect::<Vec<_>>().join(","),
    })
}

/// Check that a daily aggregate header matches [`DAILY_COLUMNS`] exactly.
pub fn check_daily_header(path: &Path, headers: &StringRecord) -> Result<(), LoadError> {
    // ---
    if headers.iter().map(str::trim).eq(DAILY_COLUMNS.iter().copied()) {
        return Ok(());
    }
    Err(LoadError::Header {
        path: PathBuf::from(path),
        expected: DAILY_COLUMNS.join(","),
        found: headers.iter().collect::<Vec<_>>().join(","),
    })
}

fn parent_dir(file: &Path) -> Option<&Path> {
    file.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_historical_header_accepts_turbidity_and_extras() {
        // ---
        let path = Path::new("log.csv");
        let headers = StringRecord::from(vec![
            "timestamp",
            "flow_rate",
            "day_type",
            "month",
            "temperature",
            "turbidity",
        ]);
        assert!(check_historical_header(path, &headers).is_ok());
    }

    #[test]
    fn test_historical_header_missing_column() {
        // ---
        let path = Path::new("log.csv");
        let headers = StringRecord::from(vec!["timestamp", "flow_rate", "day_type", "month"]);
        assert!(matches!(
            check_historical_header(path, &headers),
            Err(LoadError::Header { .. })
        ));
    }

    #[test]
    fn test_daily_header_must_match_order() {
        // ---
        let path = Path::new("daily.csv");
        let good = StringRecord::from(DAILY_COLUMNS.to_vec());
        assert!(check_daily_header(path, &good).is_ok());

        let mut swapped = DAILY_COLUMNS.to_vec();
        swapped.swap(1, 2);
        assert!(check_daily_header(path, &StringRecord::from(swapped)).is_err());
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        // ---
        assert!(parent_dir(Path::new("daily_aggregated.csv")).is_none());
        assert_eq!(
            parent_dir(Path::new("prediction/model.json")),
            Some(Path::new("prediction"))
        );
    }
}
