//! `hydro-generate`: write a seeded synthetic reading log.
//!
//! # Environment Variables
//! - `GEN_START` – first timestamp, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (default: `2020-01-01`)
//! - `GEN_END` – last timestamp, inclusive; a bare date means end of that day
//!   (default: `2024-12-31`)
//! - `GEN_INTERVAL_SECS` – seconds between readings (default: 1)
//! - `GEN_SEED` – RNG seed (default: 42)
//! - `GEN_OUTPUT` – output CSV (default: `simulated_water_flow_5_years.csv`)
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dotenvy::dotenv;

use hydromind::logging::init_tracing;
use hydromind::models::LOG_TIMESTAMP_FORMAT;
use hydromind::synthetic::{write_log, GeneratorConfig};

// ---

fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let start = parse_bound("GEN_START", "2020-01-01", NaiveTime::MIN)?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("invalid time"))?;
    let end = parse_bound("GEN_END", "2024-12-31", end_of_day)?;
    if end < start {
        return Err(anyhow!("GEN_END ({}) is before GEN_START ({})", end, start));
    }

    let interval_secs: i64 = env::var("GEN_INTERVAL_SECS")
        .ok()
        .map(|v| v.trim().parse())
        .transpose()
        .map_err(|e| anyhow!("Invalid GEN_INTERVAL_SECS: {}", e))?
        .unwrap_or(1);
    if interval_secs < 1 {
        return Err(anyhow!("GEN_INTERVAL_SECS must be at least 1"));
    }

    let seed: u64 = env::var("GEN_SEED")
        .ok()
        .map(|v| v.trim().parse())
        .transpose()
        .map_err(|e| anyhow!("Invalid GEN_SEED: {}", e))?
        .unwrap_or(42);

    let output = env::var("GEN_OUTPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("simulated_water_flow_5_years.csv"));

    let cfg = GeneratorConfig {
        start,
        end,
        interval_secs,
        seed,
    };
    tracing::info!(
        "Generating {} .. {} every {}s (seed {}) into {}",
        cfg.start,
        cfg.end,
        cfg.interval_secs,
        cfg.seed,
        output.display()
    );

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let rows = write_log(BufWriter::new(file), &cfg)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!("Wrote {} readings to {}", rows, output.display());
    Ok(())
}

/// Read a date or date-time bound; a bare date takes `default_time`.
fn parse_bound(var: &str, default: &str, default_time: NaiveTime) -> Result<NaiveDateTime> {
    // ---
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, LOG_TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(default_time))
        .map_err(|e| anyhow!("Invalid {} '{}': {}", var, raw, e))
}
