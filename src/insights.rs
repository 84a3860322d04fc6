//! Summaries built on top of the pipeline outputs for the dashboard.
//!
//! - window averages compared with long-run reference averages, plus a
//!   cost analysis of the window's average flow
//! - the "recent historical vs forecast" comparison table

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cost::{self, CostEstimate};
use crate::models::{ForecastRecord, Granularity, MonthlyRecord, WindowBucket};

// ---

/// Long-run averages the dashboard compares each window against.
pub const REFERENCE_TEMPERATURE: f64 = 19.67;
pub const REFERENCE_FLOW_RATE: f64 = 5.03;
pub const REFERENCE_PURITY: f64 = 79.67;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricAverages {
    // ---
    pub temperature: f64,
    pub flow_rate: f64,
    pub purity: f64,
}

/// Window statistics and cost analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    // ---
    pub granularity: Granularity,
    pub buckets: usize,
    pub window: MetricAverages,
    pub reference: MetricAverages,
    pub current: CostEstimate,
    pub average: CostEstimate,
    pub volume_delta: f64,
    pub cost_delta: f64,
}

/// Average the window's buckets and price its mean flow against the
/// reference flow. `None` for an empty window.
pub fn summarize_window(
    buckets: &[WindowBucket],
    granularity: Granularity,
) -> Option<WindowSummary> {
    // ---
    if buckets.is_empty() {
        return None;
    }

    let n = buckets.len() as f64;
    let mean = |f: fn(&WindowBucket) -> f64| buckets.iter().map(f).sum::<f64>() / n;
    let window = MetricAverages {
        temperature: mean(|b| b.temperature),
        flow_rate: mean(|b| b.flow_rate),
        purity: mean(|b| b.purity),
    };

    let current = cost::estimate(window.flow_rate, granularity);
    let average = cost::estimate(REFERENCE_FLOW_RATE, granularity);

    Some(WindowSummary {
        granularity,
        buckets: buckets.len(),
        window,
        reference: MetricAverages {
            temperature: REFERENCE_TEMPERATURE,
            flow_rate: REFERENCE_FLOW_RATE,
            purity: REFERENCE_PURITY,
        },
        volume_delta: current.volume_liters - average.volume_liters,
        cost_delta: current.cost - average.cost,
        current,
        average,
    })
}

/// One row of the historical vs forecast table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    // ---
    pub month: NaiveDate,
    pub actual_liters: f64,
    pub yhat: Option<f64>,
    pub yhat_lower: Option<f64>,
    pub yhat_upper: Option<f64>,
}

/// Left-join history with the forecast on month and keep the last
/// `months` rows.
pub fn compare_recent(
    history: &[MonthlyRecord],
    forecast: &[ForecastRecord],
    months: usize,
) -> Vec<ComparisonRow> {
    // ---
    let by_month: HashMap<NaiveDate, &ForecastRecord> =
        forecast.iter().map(|f| (f.date, f)).collect();

    let skip = history.len().saturating_sub(months);
    history
        .iter()
        .skip(skip)
        .map(|h| {
            let f = by_month.get(&h.month_start);
            ComparisonRow {
                month: h.month_start,
                actual_liters: h.total_liters,
                yhat: f.map(|f| f.point_estimate),
                yhat_lower: f.map(|f| f.lower_bound),
                yhat_upper: f.map(|f| f.upper_bound),
            }
        })
        .collect()
}
