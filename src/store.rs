//! CSV readers and writers for the pipeline's flat files.
//!
//! - historical log (raw readings)
//! - daily aggregate (one row per [`DailyRecord`])
//! - forecast export (`ds, yhat, yhat_lower, yhat_upper`)
//!
//! A missing historical log is not an error: it yields an empty
//! [`Dataset`] carrying a single warning for the user.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LoadError;
use crate::models::{DailyRecord, DayType, ForecastRecord, Reading, LOG_TIMESTAMP_FORMAT};
use crate::schema;

// ---

/// Readings loaded from the historical log, plus anything the user
/// should be told about the load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    // ---
    pub readings: Vec<Reading>,
    pub warnings: Vec<String>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Calendar date of the newest reading.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.readings.last().map(|r| r.timestamp.date())
    }
}

/// Outcome of a pass over the historical log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    // ---
    /// Rows handed to the visitor.
    pub rows: u64,
    pub warnings: Vec<String>,
}

/// Stream the historical log, handing each parsed reading to `visit` in
/// file order without buffering the log.
///
/// A missing file visits nothing and produces exactly one warning. Rows
/// that fail to parse are skipped and reported in one summary warning.
pub fn scan_historical<F>(path: &Path, mut visit: F) -> Result<ScanSummary, LoadError>
where
    F: FnMut(Reading),
{
    // ---
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let warning = format!(
                "File '{}' not found. Please ensure the file exists.",
                path.display()
            );
            tracing::warn!("{}", warning);
            return Ok(ScanSummary {
                rows: 0,
                warnings: vec![warning],
            });
        }
        Err(e) => return Err(LoadError::from_io(path, e)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));
    let headers = reader
        .headers()
        .map_err(|source| csv_error(path, source))?
        .clone();
    schema::check_historical_header(path, &headers)?;

    let mut rows = 0u64;
    let mut skipped = 0usize;
    for (line, row) in reader.deserialize::<Reading>().enumerate() {
        match row {
            Ok(reading) => {
                visit(reading);
                rows += 1;
            }
            Err(e) => {
                skipped += 1;
                tracing::debug!("Skipping row {} of {}: {}", line + 2, path.display(), e);
            }
        }
    }

    let mut warnings = Vec::new();
    if skipped > 0 {
        let warning = format!(
            "Skipped {} malformed row(s) in '{}'",
            skipped,
            path.display()
        );
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }

    tracing::info!("Read {} readings from {}", rows, path.display());
    Ok(ScanSummary { rows, warnings })
}

/// Load the historical reading log into memory, sorted by timestamp.
///
/// Same missing-file and bad-row handling as [`scan_historical`].
pub fn load_historical(path: &Path) -> Result<Dataset, LoadError> {
    // ---
    let mut readings = Vec::new();
    let summary = scan_historical(path, |reading| readings.push(reading))?;
    readings.sort_by_key(|r| r.timestamp);
    Ok(Dataset {
        readings,
        warnings: summary.warnings,
    })
}

/// Write readings in the historical log layout.
pub fn write_historical<W: Write>(writer: W, readings: &[Reading]) -> Result<(), csv::Error> {
    // ---
    let mut csv_writer = csv::Writer::from_writer(writer);
    for reading in readings {
        csv_writer.serialize(reading)?;
    }
    csv_writer.flush()?;
    Ok(())
}

// ---

/// Daily aggregate file row; the on-disk twin of [`DailyRecord`].
#[derive(Debug, Serialize, Deserialize)]
struct DailyRow {
    // ---
    #[serde(deserialize_with = "date_or_datetime")]
    timestamp: NaiveDate,
    daily_liters_sum: f64,
    daily_flow_mean: f64,
    daily_flow_max: f64,
    daily_flow_min: f64,
    daily_temp_mean: f64,
    year: i32,
    month: u32,
    day: u32,
    day_of_week: u32,
    day_type: DayType,
    rolling_7d_liters_mean: f64,
    rolling_30d_liters_mean: f64,
}

impl From<&DailyRecord> for DailyRow {
    fn from(r: &DailyRecord) -> Self {
        // ---
        DailyRow {
            timestamp: r.date,
            daily_liters_sum: r.liters_used_sum,
            daily_flow_mean: r.flow_mean,
            daily_flow_max: r.flow_max,
            daily_flow_min: r.flow_min,
            daily_temp_mean: r.temperature_mean,
            year: r.date.year(),
            month: r.date.month(),
            day: r.date.day(),
            day_of_week: r.day_of_week,
            day_type: r.day_type,
            rolling_7d_liters_mean: r.rolling_7d_liters_mean,
            rolling_30d_liters_mean: r.rolling_30d_liters_mean,
        }
    }
}

impl From<DailyRow> for DailyRecord {
    fn from(row: DailyRow) -> Self {
        // ---
        DailyRecord {
            date: row.timestamp,
            liters_used_sum: row.daily_liters_sum,
            flow_mean: row.daily_flow_mean,
            flow_max: row.daily_flow_max,
            flow_min: row.daily_flow_min,
            temperature_mean: row.daily_temp_mean,
            day_of_week: row.day_of_week,
            day_type: row.day_type,
            rolling_7d_liters_mean: row.rolling_7d_liters_mean,
            rolling_30d_liters_mean: row.rolling_30d_liters_mean,
        }
    }
}

/// Write the daily aggregate file.
pub fn save_daily(path: &Path, records: &[DailyRecord]) -> Result<(), LoadError> {
    // ---
    let file = File::create(path).map_err(|e| LoadError::from_io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer
            .serialize(DailyRow::from(record))
            .map_err(|source| csv_error(path, source))?;
    }
    writer.flush().map_err(|e| LoadError::from_io(path, e))?;

    tracing::info!(
        "Saved {} daily records to {}",
        records.len(),
        path.display()
    );
    Ok(())
}

/// Read the daily aggregate file, sorted ascending by date.
pub fn load_daily(path: &Path) -> Result<Vec<DailyRecord>, LoadError> {
    // ---
    let file = File::open(path).map_err(|e| LoadError::from_io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));
    let headers = reader.headers().map_err(|source| csv_error(path, source))?.clone();
    schema::check_daily_header(path, &headers)?;

    let mut records: Vec<DailyRecord> = reader
        .deserialize::<DailyRow>()
        .map(|row| row.map(DailyRecord::from))
        .collect::<Result<_, _>>()
        .map_err(|source| csv_error(path, source))?;
    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);

    tracing::info!("Loaded {} daily records from {}", records.len(), path.display());
    Ok(records)
}

// ---

#[derive(Debug, Serialize)]
struct ForecastRow {
    // ---
    ds: NaiveDate,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
}

/// Write forecast records as `ds, yhat, yhat_lower, yhat_upper`.
pub fn write_forecast<W: Write>(writer: W, records: &[ForecastRecord]) -> Result<(), csv::Error> {
    // ---
    let mut csv_writer = csv::Writer::from_writer(writer);
    for r in records {
        csv_writer.serialize(ForecastRow {
            ds: r.date,
            yhat: r.point_estimate,
            yhat_lower: r.lower_bound,
            yhat_upper: r.upper_bound,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the forecast export file.
pub fn save_forecast(path: &Path, records: &[ForecastRecord]) -> Result<(), LoadError> {
    // ---
    let file = File::create(path).map_err(|e| LoadError::from_io(path, e))?;
    write_forecast(file, records).map_err(|source| csv_error(path, source))?;
    tracing::info!("Exported {} forecast rows to {}", records.len(), path.display());
    Ok(())
}

fn csv_error(path: &Path, source: csv::Error) -> LoadError {
    LoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Accept `%Y-%m-%d` or a full `%Y-%m-%d %H:%M:%S` timestamp.
fn date_or_datetime<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, LOG_TIMESTAMP_FORMAT).map(|ts| ts.date()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::aggregate::aggregate_daily;
    use chrono::Duration;

    fn readings() -> Vec<Reading> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..96)
            .map(|i| Reading {
                timestamp: start + Duration::hours(i),
                flow_rate: 2.0 + (i % 4) as f64,
                temperature: 15.0,
                purity: 88.0,
            })
            .collect()
    }

    #[test]
    fn test_missing_historical_file_yields_one_warning() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let dataset = load_historical(&dir.path().join("1_year_data.csv")).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.warnings.len(), 1);
        assert!(dataset.warnings[0].contains("not found"));
    }

    #[test]
    fn test_historical_log_skips_bad_rows() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(
            &path,
            "timestamp,flow_rate,temperature,turbidity\n\
             2024-01-01 00:00:02,2.5,18.0,80.0\n\
             2024-01-01 00:00:01,abc,18.0,80.0\n\
             2024-01-01 00:00:00,1.5,17.0,81.0\n",
        )
        .unwrap();

        let dataset = load_historical(&path).unwrap();
        assert_eq!(dataset.readings.len(), 2);
        assert_eq!(dataset.warnings.len(), 1);
        // Sorted by timestamp
        assert_eq!(dataset.readings[0].flow_rate, 1.5);
        assert_eq!(dataset.readings[1].purity, 80.0);
    }

    #[test]
    fn test_historical_log_rejects_missing_columns() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "timestamp,flow_rate,day_type,month\n").unwrap();
        assert!(matches!(
            load_historical(&path),
            Err(LoadError::Header { .. })
        ));
    }

    #[test]
    fn test_generated_log_reads_back() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let original = readings();
        write_historical(File::create(&path).unwrap(), &original).unwrap();

        let dataset = load_historical(&path).unwrap();
        assert!(dataset.warnings.is_empty());
        assert_eq!(dataset.readings, original);
    }

    #[test]
    fn test_daily_file_layout_and_reload() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        let daily = aggregate_daily(&readings(), 3600.0);
        save_daily(&path, &daily).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, schema::DAILY_COLUMNS.join(","));
        assert!(text.lines().nth(1).unwrap().starts_with("2024-01-30,"));

        let reloaded = load_daily(&path).unwrap();
        assert_eq!(reloaded.len(), daily.len());
        assert_eq!(reloaded[0].date, daily[0].date);
        assert!((reloaded[0].liters_used_sum - daily[0].liters_used_sum).abs() < 1e-9);
        assert_eq!(reloaded[2].day_type, daily[2].day_type);
    }

    #[test]
    fn test_daily_reader_accepts_datetime_timestamps() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        std::fs::write(
            &path,
            format!(
                "{}\n2024-02-03 00:00:00,10,1,2,0,20,2024,2,3,5,Weekend,10,10\n",
                schema::DAILY_COLUMNS.join(",")
            ),
        )
        .unwrap();

        let records = load_daily(&path).unwrap();
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        assert_eq!(records[0].day_type, DayType::Weekend);
    }

    #[test]
    fn test_forecast_export_columns() {
        // ---
        let record = ForecastRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            point_estimate: 10.5,
            lower_bound: 9.0,
            upper_bound: 12.0,
            out_of_sample: true,
        };
        let mut out = Vec::new();
        write_forecast(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "ds,yhat,yhat_lower,yhat_upper\n2025-01-01,10.5,9.0,12.0\n");
    }

    #[test]
    fn test_scan_visits_rows_in_file_order() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(
            &path,
            "timestamp,flow_rate,temperature,purity\n\
             2024-01-01 00:00:02,2.5,18.0,80.0\n\
             not a timestamp,1.0,18.0,80.0\n\
             2024-01-01 00:00:00,1.5,17.0,81.0\n",
        )
        .unwrap();

        let mut seen = Vec::new();
        let summary = scan_historical(&path, |r| seen.push(r.flow_rate)).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(seen, vec![2.5, 1.5]);

        let missing = scan_historical(&dir.path().join("absent.csv"), |_| {}).unwrap();
        assert_eq!(missing.rows, 0);
        assert_eq!(missing.warnings.len(), 1);
    }
}
