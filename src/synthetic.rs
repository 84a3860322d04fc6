//! Seeded synthetic telemetry for fixtures and demos.
//!
//! Flow follows a two-peak daily pattern scaled by season and weekday,
//! plus Gaussian noise, clipped at zero. Temperature follows the month,
//! and purity decays in a saw-tooth over roughly seven months.

use std::f64::consts::PI;
use std::io::Write;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::models::Reading;

// ---

const BASELINE_FLOW: f64 = 5.0;
const DAILY_AMPLITUDE: f64 = 5.0;
const FLOW_NOISE_STD: f64 = 1.0;
const TEMPERATURE_NOISE_STD: f64 = 1.0;
const PURITY_CYCLE_SECS: f64 = 7.0 * 30.44 * 24.0 * 3600.0;

/// Range and sampling of a generated log.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    // ---
    pub start: NaiveDateTime,
    /// Inclusive.
    pub end: NaiveDateTime,
    pub interval_secs: i64,
    pub seed: u64,
}

/// Lazily generated readings; a five-year log at one-second spacing does
/// not fit in memory, so callers stream it.
pub struct SyntheticReadings {
    // ---
    rng: StdRng,
    start: NaiveDateTime,
    current: NaiveDateTime,
    end: NaiveDateTime,
    step: Duration,
}

impl SyntheticReadings {
    pub fn new(cfg: &GeneratorConfig) -> Self {
        // ---
        Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            start: cfg.start,
            current: cfg.start,
            end: cfg.end,
            step: Duration::seconds(cfg.interval_secs.max(1)),
        }
    }
}

impl Iterator for SyntheticReadings {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        // ---
        if self.current > self.end {
            return None;
        }
        let ts = self.current;
        self.current += self.step;

        let hour = f64::from(ts.hour())
            + f64::from(ts.minute()) / 60.0
            + f64::from(ts.second()) / 3600.0;
        let daily_pattern =
            (2.0 * PI * hour / 24.0).sin() + 0.5 * (2.0 * PI * (hour - 8.0) / 24.0).sin();

        let flow_noise: f64 = self.rng.sample::<f64, _>(StandardNormal) * FLOW_NOISE_STD;
        let temp_noise: f64 = self.rng.sample::<f64, _>(StandardNormal) * TEMPERATURE_NOISE_STD;

        let modulation = seasonal_factor(ts.month()) * weekend_factor(ts.weekday());
        let flow_rate = (BASELINE_FLOW + DAILY_AMPLITUDE * daily_pattern * modulation + flow_noise)
            .max(0.0);

        let temperature = 20.0 + (f64::from(ts.month()) - 6.0) * 5.0 + temp_noise;

        let elapsed = (ts - self.start).num_seconds() as f64;
        let purity = 95.0 - 30.0 * (elapsed % PURITY_CYCLE_SECS) / PURITY_CYCLE_SECS;

        Some(Reading {
            timestamp: ts,
            flow_rate,
            temperature,
            purity,
        })
    }
}

/// Summer months run higher, winter months lower.
pub fn seasonal_factor(month: u32) -> f64 {
    // ---
    match month {
        6..=8 => 1.2,
        12 | 1 | 2 => 0.9,
        _ => 1.0,
    }
}

pub fn weekend_factor(weekday: Weekday) -> f64 {
    // ---
    match weekday {
        Weekday::Sat | Weekday::Sun => 0.95,
        _ => 1.0,
    }
}

/// Stream a generated log in the historical CSV layout; returns the row count.
pub fn write_log<W: Write>(writer: W, cfg: &GeneratorConfig) -> Result<u64, csv::Error> {
    // ---
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0u64;
    for reading in SyntheticReadings::new(cfg) {
        csv_writer.serialize(reading)?;
        rows += 1;
        if rows % 1_000_000 == 0 {
            tracing::info!("Generated {} rows (at {})", rows, reading.timestamp);
        }
    }
    csv_writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn cfg(days: i64, interval_secs: i64, seed: u64) -> GeneratorConfig {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        GeneratorConfig {
            start,
            end: start + Duration::days(days) - Duration::seconds(1),
            interval_secs,
            seed,
        }
    }

    #[test]
    fn test_row_count_and_spacing() {
        // ---
        let readings: Vec<Reading> = SyntheticReadings::new(&cfg(2, 60, 1)).collect();
        assert_eq!(readings.len(), 2 * 24 * 60);
        assert_eq!(
            readings[1].timestamp - readings[0].timestamp,
            Duration::seconds(60)
        );
    }

    #[test]
    fn test_same_seed_same_data() {
        // ---
        let a: Vec<Reading> = SyntheticReadings::new(&cfg(1, 300, 42)).collect();
        let b: Vec<Reading> = SyntheticReadings::new(&cfg(1, 300, 42)).collect();
        let c: Vec<Reading> = SyntheticReadings::new(&cfg(1, 300, 43)).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_values_stay_in_range() {
        // ---
        for r in SyntheticReadings::new(&cfg(14, 600, 7)) {
            assert!(r.flow_rate >= 0.0);
            assert!(r.purity <= 95.0 && r.purity > 65.0);
            // January: 20 + (1 - 6) * 5 = -5 plus noise
            assert!(r.temperature > -15.0 && r.temperature < 5.0);
        }
    }

    #[test]
    fn test_factors() {
        // ---
        assert_eq!(seasonal_factor(7), 1.2);
        assert_eq!(seasonal_factor(12), 0.9);
        assert_eq!(seasonal_factor(4), 1.0);
        assert_eq!(weekend_factor(Weekday::Sun), 0.95);
        assert_eq!(weekend_factor(Weekday::Wed), 1.0);
    }

    #[test]
    fn test_written_log_has_historical_header() {
        // ---
        let mut out = Vec::new();
        let rows = write_log(&mut out, &cfg(1, 3600, 3)).unwrap();
        assert_eq!(rows, 24);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "timestamp,flow_rate,temperature,purity"
        );
        assert!(text.lines().nth(1).unwrap().starts_with("2024-01-01 00:00:00,"));
    }
}
