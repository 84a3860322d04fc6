//! Forecast endpoints.
//!
//! - `GET /forecast?horizon=`: fitted and projected monthly volume
//! - `GET /forecast/comparison?months=`: recent history next to the model
//! - `GET /forecast/export.csv`: the forecast as CSV (also written to disk)
//! - `POST /forecast/refit`: refit on current files and persist

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{parse_number, ApiError, AppState};
use crate::forecast::{self, AccuracyReport, SeasonalModel, MIN_HORIZON};
use crate::insights::{compare_recent, ComparisonRow};
use crate::models::ForecastRecord;
use crate::store;

// ---

const DEFAULT_COMPARISON_MONTHS: usize = 12;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/forecast", get(forecast_handler))
        .route("/forecast/comparison", get(comparison))
        .route("/forecast/export.csv", get(export_csv))
        .route("/forecast/refit", post(refit))
}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    horizon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComparisonQuery {
    months: Option<String>,
}

/// Model metadata returned alongside forecasts.
#[derive(Debug, Serialize)]
struct ModelInfo {
    model_id: Uuid,
    fitted_at: DateTime<Utc>,
    first_observed: NaiveDate,
    last_observed: NaiveDate,
    n_observations: usize,
    seasonal: bool,
}

impl From<&SeasonalModel> for ModelInfo {
    fn from(model: &SeasonalModel) -> Self {
        Self {
            model_id: model.model_id(),
            fitted_at: model.fitted_at(),
            first_observed: model.first_observed(),
            last_observed: model.last_observed(),
            n_observations: model.n_observations(),
            seasonal: model.is_seasonal(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ForecastResponse {
    #[serde(flatten)]
    model: ModelInfo,
    horizon: usize,
    records: Vec<ForecastRecord>,
}

#[derive(Debug, Serialize)]
struct RefitResponse {
    #[serde(flatten)]
    model: ModelInfo,
    /// Hold-out accuracy, when the history is longer than the hold-out.
    accuracy: Option<AccuracyReport>,
}

async fn forecast_handler(
    State(state): State<AppState>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, ApiError> {
    // ---
    let horizon = parse_number("horizon", params.horizon.as_deref())?
        .unwrap_or(state.config.forecast_horizon);
    info!("GET /forecast - horizon={}", horizon);

    let model = state.model().await?;
    let records = model.forecast(horizon)?;
    debug!("GET /forecast - Returning {} records", records.len());

    Ok(Json(ForecastResponse {
        model: ModelInfo::from(model.as_ref()),
        horizon,
        records,
    }))
}

async fn comparison(
    State(state): State<AppState>,
    Query(params): Query<ComparisonQuery>,
) -> Result<Json<Vec<ComparisonRow>>, ApiError> {
    // ---
    let months = parse_number("months", params.months.as_deref())?
        .unwrap_or(DEFAULT_COMPARISON_MONTHS);
    info!("GET /forecast/comparison - months={}", months);

    let history = state.monthly().await?;
    let model = state.model().await?;
    let fitted = model.forecast(MIN_HORIZON)?;
    Ok(Json(compare_recent(&history, &fitted, months)))
}

async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("GET /forecast/export.csv");
    let model = state.model().await?;
    let records = model.forecast(state.config.forecast_horizon)?;

    let mut body = Vec::new();
    store::write_forecast(&mut body, &records)?;

    let path = state.config.forecast_export_path.clone();
    tokio::task::spawn_blocking(move || store::save_forecast(&path, &records)).await??;

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

async fn refit(State(state): State<AppState>) -> Result<Json<RefitResponse>, ApiError> {
    // ---
    info!("POST /forecast/refit");
    let model = state.refit().await?;

    let history = state.monthly().await?;
    let holdout = state.config.holdout_months;
    let forecaster = state.config.forecaster();
    let accuracy = if history.len() > holdout {
        let report = tokio::task::spawn_blocking(move || {
            forecast::backtest(&history, holdout, &forecaster)
        })
        .await?;
        match report {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Hold-out validation skipped: {}", e);
                None
            }
        }
    } else {
        debug!(
            "History of {} months is not longer than the {}-month hold-out",
            history.len(),
            holdout
        );
        None
    };

    Ok(Json(RefitResponse {
        model: ModelInfo::from(model.as_ref()),
        accuracy,
    }))
}
