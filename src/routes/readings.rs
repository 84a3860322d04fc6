//! Reading endpoints: historical windows and the live view.
//!
//! - `GET /readings/window?date=&granularity=`
//! - `GET /readings/summary?date=&granularity=`
//! - `GET /readings/live`

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{parse_date, parse_granularity, ApiError, AppState};
use crate::insights::{summarize_window, WindowSummary};
use crate::models::{Granularity, Reading, WindowBucket};
use crate::window::select_window;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/readings/window", get(window))
        .route("/readings/summary", get(summary))
        .route("/readings/live", get(live))
}

/// Query parameters shared by the window endpoints.
#[derive(Debug, Deserialize)]
struct WindowQuery {
    /// `YYYY-MM-DD`; defaults to the date of the newest reading.
    date: Option<String>,
    /// `daily` (default), `weekly` or `monthly`.
    granularity: Option<String>,
}

/// A resolved window request and its buckets.
struct Selection {
    date: Option<NaiveDate>,
    granularity: Granularity,
    warnings: Vec<String>,
    buckets: Vec<WindowBucket>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    date: Option<NaiveDate>,
    granularity: Granularity,
    warnings: Vec<String>,
    summary: Option<WindowSummary>,
}

#[derive(Debug, Serialize)]
struct LiveResponse {
    connected: bool,
    capacity: usize,
    total_received: u64,
    readings: Vec<Reading>,
}

/// Select the window's buckets for the requested date and granularity.
async fn load_window(state: &AppState, params: &WindowQuery) -> Result<Selection, ApiError> {
    // ---
    let granularity = parse_granularity(params.granularity.as_deref())?;
    let requested = parse_date(params.date.as_deref())?;

    let dataset = state.dataset().await?;
    let warnings = dataset.warnings.clone();
    let Some(date) = requested.or_else(|| dataset.last_date()) else {
        debug!("No date requested and no readings loaded");
        return Ok(Selection {
            date: None,
            granularity,
            warnings,
            buckets: Vec::new(),
        });
    };

    let buckets =
        tokio::task::spawn_blocking(move || select_window(&dataset.readings, date, granularity))
            .await?;
    Ok(Selection {
        date: Some(date),
        granularity,
        warnings,
        buckets,
    })
}

async fn window(
    State(state): State<AppState>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<Vec<WindowBucket>>, ApiError> {
    // ---
    info!("GET /readings/window - {:?}", params);
    let buckets = load_window(&state, &params).await?.buckets;
    debug!("GET /readings/window - Returning {} buckets", buckets.len());
    Ok(Json(buckets))
}

async fn summary(
    State(state): State<AppState>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    // ---
    info!("GET /readings/summary - {:?}", params);
    let selection = load_window(&state, &params).await?;
    Ok(Json(SummaryResponse {
        summary: summarize_window(&selection.buckets, selection.granularity),
        date: selection.date,
        granularity: selection.granularity,
        warnings: selection.warnings,
    }))
}

async fn live(State(state): State<AppState>) -> Json<LiveResponse> {
    // ---
    let buffer = state.live.read().await;
    Json(LiveResponse {
        connected: buffer.is_connected(),
        capacity: buffer.capacity(),
        total_received: buffer.total_received(),
        readings: buffer.snapshot(),
    })
}
