//! Ad-hoc chart windows over the raw reading log.
//!
//! A window is the day, ISO week or month containing a reference date.
//! Readings inside it are grouped into fixed-width bins aligned to
//! midnight and each bin's numeric columns are averaged.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{Granularity, Reading, WindowBucket};

// ---

#[derive(Debug, Default)]
struct BinAccumulator {
    // ---
    flow: f64,
    temperature: f64,
    purity: f64,
    count: usize,
}

/// Select the readings in the `granularity` window around `date` and
/// average them per bin.
///
/// Bins: 10 minutes (daily), 1 hour (weekly), 12 hours (monthly). Bins
/// without readings are omitted. No readings in the window → empty vec.
pub fn select_window(
    readings: &[Reading],
    date: NaiveDate,
    granularity: Granularity,
) -> Vec<WindowBucket> {
    // ---
    let (first_day, last_day) = granularity.window_bounds(date);
    let origin = first_day.and_time(chrono::NaiveTime::MIN);
    let width = granularity.bin_width().num_seconds();

    let mut bins: BTreeMap<NaiveDateTime, BinAccumulator> = BTreeMap::new();
    for reading in readings {
        let day = reading.timestamp.date();
        if day < first_day || day > last_day {
            continue;
        }

        let offset = (reading.timestamp - origin).num_seconds();
        let bin_start = origin + chrono::Duration::seconds(offset - offset.rem_euclid(width));

        let acc = bins.entry(bin_start).or_default();
        acc.flow += reading.flow_rate;
        acc.temperature += reading.temperature;
        acc.purity += reading.purity;
        acc.count += 1;
    }

    tracing::debug!(
        "{} window {}..={} -> {} bins",
        granularity,
        first_day,
        last_day,
        bins.len()
    );

    bins.into_iter()
        .map(|(timestamp, acc)| {
            let n = acc.count as f64;
            WindowBucket {
                timestamp,
                flow_rate: acc.flow / n,
                temperature: acc.temperature / n,
                purity: acc.purity / n,
                samples: acc.count,
            }
        })
        .collect()
}
