//! Data models for the water telemetry pipeline.
//!
//! `Reading` is the raw sample; every other type here is derived from a
//! sequence of readings and is recomputed, never mutated in place.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::UnknownGranularity;

// ---

/// Timestamp layout of the historical log (`%Y-%m-%d %H:%M:%S`).
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One raw telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    #[serde(with = "log_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Litres per minute.
    pub flow_rate: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Water clarity percentage. Older logs call this column `turbidity`.
    #[serde(alias = "turbidity")]
    pub purity: f64,
}

/// Weekday/weekend classification of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_weekday(weekday: Weekday) -> Self {
        // ---
        match weekday {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

/// One calendar day of aggregated readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    // ---
    pub date: NaiveDate,
    pub liters_used_sum: f64,
    pub flow_mean: f64,
    pub flow_max: f64,
    pub flow_min: f64,
    pub temperature_mean: f64,
    /// Monday = 0 ... Sunday = 6.
    pub day_of_week: u32,
    pub day_type: DayType,
    pub rolling_7d_liters_mean: f64,
    pub rolling_30d_liters_mean: f64,
}

/// Total consumption for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    // ---
    /// First day of the month.
    pub month_start: NaiveDate,
    pub total_liters: f64,
}

/// Fitted or projected consumption for one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    // ---
    pub date: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// `true` for months after the last observed month.
    pub out_of_sample: bool,
}

/// Time-mean of the readings that fell into one chart bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBucket {
    // ---
    #[serde(with = "log_timestamp")]
    pub timestamp: NaiveDateTime,
    pub flow_rate: f64,
    pub temperature: f64,
    pub purity: f64,
    pub samples: usize,
}

// ---

/// Reporting granularity for windows and cost estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[serde(alias = "Daily")]
    Daily,
    #[serde(alias = "Weekly")]
    Weekly,
    #[serde(alias = "Monthly")]
    Monthly,
}

impl Granularity {
    /// Width of one chart bin.
    pub fn bin_width(self) -> Duration {
        // ---
        match self {
            Granularity::Daily => Duration::minutes(10),
            Granularity::Weekly => Duration::hours(1),
            Granularity::Monthly => Duration::hours(12),
        }
    }

    /// Inclusive first and last calendar day of the window containing `date`.
    ///
    /// Weekly windows are ISO weeks (Monday through Sunday).
    pub fn window_bounds(self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        // ---
        match self {
            Granularity::Daily => (date, date),
            Granularity::Weekly => {
                let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                (start, start + Duration::days(6))
            }
            Granularity::Monthly => {
                let start = month_start(date);
                (start, add_months(start, 1) - Duration::days(1))
            }
        }
    }

    pub fn label(self) -> &'static str {
        // ---
        match self {
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(UnknownGranularity(s.to_string())),
        }
    }
}

// ---

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // ---
    date.with_day(1).unwrap_or(date)
}

/// Shift a first-of-month date by `months` (may be negative).
pub fn add_months(start: NaiveDate, months: i32) -> NaiveDate {
    // ---
    let index = start.year() * 12 + start.month0() as i32 + months;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(start)
}

/// Whole calendar months from `from` to `to` (both month starts).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    // ---
    (to.year() - from.year()) * 12 + to.month0() as i32 - from.month0() as i32
}

/// Serde adapter for `%Y-%m-%d %H:%M:%S` timestamps.
pub mod log_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::LOG_TIMESTAMP_FORMAT;

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(LOG_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), LOG_TIMESTAMP_FORMAT)
            .map_err(serde::de::Error::custom)
    }
}
