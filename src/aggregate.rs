//! Daily and monthly rollups of the raw reading log.
//!
//! Raw readings → [`DailyRecord`] (one per calendar day with readings)
//! → [`MonthlyRecord`] (one per calendar month with daily records).
//! Missing days and months are never filled in.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::models::{month_start, DailyRecord, DayType, MonthlyRecord, Reading};

// ---

const ROLLING_SHORT: usize = 7;
const ROLLING_LONG: usize = 30;

#[derive(Debug)]
struct DayAccumulator {
    // ---
    flow_sum: f64,
    flow_max: f64,
    flow_min: f64,
    temperature_sum: f64,
    count: usize,
}

impl DayAccumulator {
    fn new() -> Self {
        // ---
        Self {
            flow_sum: 0.0,
            flow_max: f64::NEG_INFINITY,
            flow_min: f64::INFINITY,
            temperature_sum: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, reading: &Reading) {
        // ---
        self.flow_sum += reading.flow_rate;
        self.flow_max = self.flow_max.max(reading.flow_rate);
        self.flow_min = self.flow_min.min(reading.flow_rate);
        self.temperature_sum += reading.temperature;
        self.count += 1;
    }
}

/// Incremental daily rollup.
///
/// Readings can be pushed one at a time in any order, so a log far
/// larger than memory can be folded straight from the CSV reader. Only
/// one small accumulator per calendar day is kept.
#[derive(Debug)]
pub struct DailyAggregator {
    // ---
    interval_secs: f64,
    days: BTreeMap<NaiveDate, DayAccumulator>,
    readings: u64,
}

impl DailyAggregator {
    /// Each reading stands for `interval_secs` seconds of flow.
    pub fn new(interval_secs: f64) -> Self {
        // ---
        Self {
            interval_secs,
            days: BTreeMap::new(),
            readings: 0,
        }
    }

    pub fn push(&mut self, reading: &Reading) {
        // ---
        self.days
            .entry(reading.timestamp.date())
            .or_insert_with(DayAccumulator::new)
            .add(reading);
        self.readings += 1;
    }

    /// Readings pushed so far.
    pub fn readings(&self) -> u64 {
        self.readings
    }

    /// Emit one record per date seen, ascending, with rolling means.
    pub fn finish(self) -> Vec<DailyRecord> {
        // ---
        let minutes_per_sample = self.interval_secs / 60.0;
        let mut records: Vec<DailyRecord> = self
            .days
            .into_iter()
            .map(|(date, acc)| {
                let n = acc.count as f64;
                DailyRecord {
                    date,
                    liters_used_sum: acc.flow_sum * minutes_per_sample,
                    flow_mean: acc.flow_sum / n,
                    flow_max: acc.flow_max,
                    flow_min: acc.flow_min,
                    temperature_mean: acc.temperature_sum / n,
                    day_of_week: date.weekday().num_days_from_monday(),
                    day_type: DayType::from_weekday(date.weekday()),
                    rolling_7d_liters_mean: 0.0,
                    rolling_30d_liters_mean: 0.0,
                }
            })
            .collect();

        let totals: Vec<f64> = records.iter().map(|r| r.liters_used_sum).collect();
        let short = trailing_mean(&totals, ROLLING_SHORT);
        let long = trailing_mean(&totals, ROLLING_LONG);
        for (record, (s, l)) in records.iter_mut().zip(short.into_iter().zip(long)) {
            record.rolling_7d_liters_mean = s;
            record.rolling_30d_liters_mean = l;
        }

        tracing::debug!(
            "Aggregated {} readings into {} daily records",
            self.readings,
            records.len()
        );
        records
    }
}

/// Reduce readings to one [`DailyRecord`] per calendar date present.
///
/// Each reading stands for `interval_secs` seconds of flow, so its volume
/// is `flow_rate * interval_secs / 60` litres. Rolling means are trailing
/// averages over the records present so far (a shorter window at the
/// start of the series), so a missing day neither counts as zero nor
/// widens the window.
///
/// Output is sorted ascending by date regardless of input order. An
/// empty input yields an empty output.
pub fn aggregate_daily<'a, I>(readings: I, interval_secs: f64) -> Vec<DailyRecord>
where
    I: IntoIterator<Item = &'a Reading>,
{
    // ---
    let mut aggregator = DailyAggregator::new(interval_secs);
    for reading in readings {
        aggregator.push(reading);
    }
    aggregator.finish()
}

/// Sum daily volumes into one [`MonthlyRecord`] per calendar month present.
///
/// Partial months are summed as they are; nothing is extrapolated.
pub fn reduce_monthly(daily: &[DailyRecord]) -> Vec<MonthlyRecord> {
    // ---
    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in daily {
        *months.entry(month_start(record.date)).or_insert(0.0) += record.liters_used_sum;
    }

    months
        .into_iter()
        .map(|(month_start, total_liters)| MonthlyRecord {
            month_start,
            total_liters,
        })
        .collect()
}

/// Trailing simple moving average with `min_periods = 1`.
fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    // ---
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        out.push(sum / (i + 1).min(window) as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn reading(timestamp: NaiveDateTime, flow_rate: f64, temperature: f64) -> Reading {
        Reading {
            timestamp,
            flow_rate,
            temperature,
            purity: 80.0,
        }
    }

    /// One reading per day at noon, flow = `flows[i]`, with a 60 s interval
    /// so each day's volume equals its flow.
    fn daily_series(start: NaiveDate, flows: &[f64]) -> Vec<Reading> {
        flows
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let day = start + Duration::days(i as i64);
                reading(day.and_hms_opt(12, 0, 0).unwrap(), f, 20.0)
            })
            .collect()
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        // ---
        assert!(aggregate_daily(&[], 1.0).is_empty());
        assert!(DailyAggregator::new(1.0).finish().is_empty());
        assert!(reduce_monthly(&[]).is_empty());
    }

    #[test]
    fn test_daily_statistics() {
        // ---
        let readings = vec![
            reading(ts(2024, 3, 2, 8, 0), 6.0, 10.0),
            reading(ts(2024, 3, 2, 9, 0), 0.0, 14.0),
            reading(ts(2024, 3, 2, 10, 0), 3.0, 18.0),
        ];

        let daily = aggregate_daily(&readings, 1.0);
        assert_eq!(daily.len(), 1);

        let day = &daily[0];
        assert!((day.liters_used_sum - 9.0 / 60.0).abs() < 1e-12);
        assert_eq!(day.flow_mean, 3.0);
        assert_eq!(day.flow_max, 6.0);
        assert_eq!(day.flow_min, 0.0);
        assert_eq!(day.temperature_mean, 14.0);
        // 2024-03-02 is a Saturday
        assert_eq!(day.day_of_week, 5);
        assert_eq!(day.day_type, DayType::Weekend);
    }

    #[test]
    fn test_output_sorted_and_unique_for_shuffled_input() {
        // ---
        let readings = vec![
            reading(ts(2024, 1, 3, 1, 0), 1.0, 20.0),
            reading(ts(2024, 1, 1, 1, 0), 1.0, 20.0),
            reading(ts(2024, 1, 3, 2, 0), 1.0, 20.0),
            reading(ts(2024, 1, 2, 1, 0), 1.0, 20.0),
            reading(ts(2024, 1, 1, 5, 0), 1.0, 20.0),
        ];

        let daily = aggregate_daily(&readings, 60.0);
        let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
        assert_eq!(dates.len(), 3);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(daily[0].liters_used_sum, 2.0);
    }

    #[test]
    fn test_missing_days_are_absent() {
        // ---
        let readings = vec![
            reading(ts(2024, 1, 1, 1, 0), 1.0, 20.0),
            reading(ts(2024, 1, 5, 1, 0), 1.0, 20.0),
        ];
        let daily = aggregate_daily(&readings, 60.0);
        assert_eq!(daily.len(), 2);
        // Day 2 averages over the two records present, not over 5 days
        assert_eq!(daily[1].rolling_7d_liters_mean, 1.0);
    }

    #[test]
    fn test_rolling_means_use_shrinking_window() {
        // ---
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let flows: Vec<f64> = (1..=40).map(f64::from).collect();
        let daily = aggregate_daily(&daily_series(start, &flows), 60.0);

        assert_eq!(daily[0].rolling_7d_liters_mean, daily[0].liters_used_sum);
        assert_eq!(daily[0].rolling_30d_liters_mean, 1.0);

        // Index 6: mean of 1..=7
        assert!((daily[6].rolling_7d_liters_mean - 4.0).abs() < 1e-9);
        // Index 10: mean of 5..=11
        assert!((daily[10].rolling_7d_liters_mean - 8.0).abs() < 1e-9);
        // Index 39: mean of 11..=40
        assert!((daily[39].rolling_30d_liters_mean - 25.5).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_totals_match_daily_sums() {
        // ---
        let start = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let flows: Vec<f64> = (0..60).map(|i| 1.0 + (i % 5) as f64).collect();
        let daily = aggregate_daily(&daily_series(start, &flows), 60.0);
        let monthly = reduce_monthly(&daily);

        assert_eq!(monthly.len(), 3);
        assert!(monthly.windows(2).all(|w| w[0].month_start < w[1].month_start));
        for month in &monthly {
            let expected: f64 = daily
                .iter()
                .filter(|d| month_start(d.date) == month.month_start)
                .map(|d| d.liters_used_sum)
                .sum();
            assert!((month.total_liters - expected).abs() < 1e-9);
        }
        assert_eq!(
            monthly[0].month_start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_streaming_matches_slice_aggregation() {
        // ---
        let start = NaiveDate::from_ymd_opt(2024, 1, 25).unwrap();
        let mut readings = Vec::new();
        for day in 0..45i64 {
            for hour in [3, 9, 15, 21] {
                let at = (start + Duration::days(day)).and_hms_opt(hour, 0, 0).unwrap();
                // Quarter steps keep every partial sum exact in any order
                readings.push(reading(at, (day % 7) as f64 + f64::from(hour) / 4.0, 18.0));
            }
        }

        let expected = aggregate_daily(&readings, 900.0);

        // Fed one owned reading at a time, newest first
        let mut aggregator = DailyAggregator::new(900.0);
        for r in readings.iter().rev().copied() {
            aggregator.push(&r);
        }
        assert_eq!(aggregator.readings(), 45 * 4);
        assert_eq!(aggregator.finish(), expected);
    }
}
