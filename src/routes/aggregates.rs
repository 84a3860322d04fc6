//! Consumption aggregates.
//!
//! `GET /aggregates/daily` serves the daily aggregate file when present
//! and otherwise aggregates the historical log on the fly.
//! `GET /aggregates/monthly` serves the monthly history used for fitting.

use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use super::{ApiError, AppState};
use crate::aggregate::aggregate_daily;
use crate::models::{DailyRecord, MonthlyRecord};
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/aggregates/daily", get(daily))
        .route("/aggregates/monthly", get(monthly))
}

async fn daily(State(state): State<AppState>) -> Result<Json<Vec<DailyRecord>>, ApiError> {
    // ---
    info!("GET /aggregates/daily");
    let path = state.config.daily_aggregate_path.clone();
    if path.exists() {
        let records = tokio::task::spawn_blocking(move || store::load_daily(&path)).await??;
        return Ok(Json(records));
    }

    let dataset = state.dataset().await?;
    let interval = state.config.sample_interval_secs;
    let records =
        tokio::task::spawn_blocking(move || aggregate_daily(&dataset.readings, interval)).await?;
    Ok(Json(records))
}

async fn monthly(State(state): State<AppState>) -> Result<Json<Vec<MonthlyRecord>>, ApiError> {
    // ---
    info!("GET /aggregates/monthly");
    let monthly = state.monthly().await?;
    Ok(Json(monthly.as_ref().clone()))
}
