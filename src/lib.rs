//! `hydromind`: water-flow telemetry pipeline.
//!
//! Raw device readings are aggregated to daily and monthly consumption,
//! a trend + yearly-seasonality model forecasts future monthly volume,
//! and an Axum API serves time windows, cost estimates, forecasts and a
//! live view fed from the telemetry device.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each file
//! owns one concern and the crate root re-exports what the binaries and
//! routes need.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod cost;
pub mod error;
pub mod feed;
pub mod forecast;
pub mod ingest;
pub mod insights;
pub mod logging;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod synthetic;
pub mod window;

pub use config::Config;
pub use error::{FeedError, ForecastError, LoadError, ParseError, UnknownGranularity};
pub use models::{DailyRecord, ForecastRecord, Granularity, MonthlyRecord, Reading, WindowBucket};
