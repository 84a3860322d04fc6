//! HTTP routes gateway.
//!
//! Each sibling module exports a subrouter over [`AppState`]; this file
//! owns the shared state, the lazy loaders behind it, and the mapping
//! from pipeline errors to HTTP responses.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::aggregate::{aggregate_daily, reduce_monthly};
use crate::cache::LazyCache;
use crate::error::{ForecastError, LoadError, UnknownGranularity};
use crate::feed::{LiveBuffer, SharedLiveBuffer};
use crate::forecast::{self, SeasonalModel};
use crate::models::{Granularity, MonthlyRecord};
use crate::store::{self, Dataset};
use crate::Config;

mod aggregates;
mod cost;
mod forecasts;
mod health;
mod readings;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub config: Arc<Config>,
    pub dataset: Arc<LazyCache<Dataset>>,
    pub monthly: Arc<LazyCache<Vec<MonthlyRecord>>>,
    pub model: Arc<LazyCache<SeasonalModel>>,
    pub live: SharedLiveBuffer,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        // ---
        let live = LiveBuffer::shared(config.live_buffer_capacity);
        Self {
            config: Arc::new(config),
            dataset: Arc::new(LazyCache::new("dataset")),
            monthly: Arc::new(LazyCache::new("monthly")),
            model: Arc::new(LazyCache::new("model")),
            live,
        }
    }

    /// Historical readings, loaded once.
    pub async fn dataset(&self) -> Result<Arc<Dataset>, ApiError> {
        // ---
        let path = self.config.historical_log_path.clone();
        self.dataset
            .get_or_load(|| async move {
                let dataset =
                    tokio::task::spawn_blocking(move || store::load_historical(&path)).await??;
                Ok::<_, ApiError>(dataset)
            })
            .await
    }

    /// Monthly consumption history.
    ///
    /// Built from the daily aggregate file when it exists, otherwise from
    /// the raw historical log.
    pub async fn monthly(&self) -> Result<Arc<Vec<MonthlyRecord>>, ApiError> {
        // ---
        self.monthly
            .get_or_load(|| async {
                let daily_path = self.config.daily_aggregate_path.clone();
                if daily_path.exists() {
                    let monthly = tokio::task::spawn_blocking(move || {
                        store::load_daily(&daily_path).map(|daily| reduce_monthly(&daily))
                    })
                    .await??;
                    return Ok::<_, ApiError>(monthly);
                }

                tracing::info!(
                    "{} not found, aggregating the historical log",
                    daily_path.display()
                );
                let dataset = self.dataset().await?;
                let interval = self.config.sample_interval_secs;
                let monthly = tokio::task::spawn_blocking(move || {
                    reduce_monthly(&aggregate_daily(&dataset.readings, interval))
                })
                .await?;
                Ok(monthly)
            })
            .await
    }

    /// The forecast model: the persisted one if present, otherwise fitted
    /// on the monthly history and persisted.
    pub async fn model(&self) -> Result<Arc<SeasonalModel>, ApiError> {
        // ---
        self.model
            .get_or_load(|| async {
                let model_path = self.config.model_path.clone();
                if model_path.exists() {
                    let model =
                        tokio::task::spawn_blocking(move || SeasonalModel::load(&model_path))
                            .await??;
                    return Ok::<_, ApiError>(model);
                }
                tracing::info!("No persisted model at {}, fitting", model_path.display());
                self.fit_and_save().await
            })
            .await
    }

    /// Reload the raw log, rebuild the history from it, refit and persist.
    ///
    /// The daily aggregate file is rewritten from the raw log so readings
    /// appended since the last `hydro-train` run are included. With no raw
    /// readings available the existing daily file is used as is.
    pub async fn refit(&self) -> Result<Arc<SeasonalModel>, ApiError> {
        // ---
        self.dataset.invalidate().await;
        self.monthly.invalidate().await;

        let dataset = self.dataset().await?;
        if dataset.is_empty() {
            tracing::warn!("No raw readings to rebuild from, refitting on existing history");
        } else {
            let interval = self.config.sample_interval_secs;
            let daily_path = self.config.daily_aggregate_path.clone();
            let monthly = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
                let daily = aggregate_daily(&dataset.readings, interval);
                store::save_daily(&daily_path, &daily)?;
                Ok(reduce_monthly(&daily))
            })
            .await??;
            self.monthly.replace(monthly).await;
        }

        let model = self.fit_and_save().await?;
        Ok(self.model.replace(model).await)
    }

    async fn fit_and_save(&self) -> Result<SeasonalModel, ApiError> {
        // ---
        let monthly = self.monthly().await?;
        let forecaster = self.config.forecaster();
        let model_path = self.config.model_path.clone();

        let model = tokio::task::spawn_blocking(move || -> Result<SeasonalModel, ApiError> {
            let model = forecast::fit(&monthly, &forecaster)?;
            model.save(&model_path)?;
            Ok(model)
        })
        .await??;
        Ok(model)
    }
}

// ---

/// Errors a handler can return; each maps to one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("CSV encoding failed: {0}")]
    Encode(#[from] csv::Error),
}

impl From<UnknownGranularity> for ApiError {
    fn from(e: UnknownGranularity) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forecast(ForecastError::InvalidHorizon { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Forecast(ForecastError::InsufficientData { .. })
            | ApiError::Forecast(ForecastError::InvalidSeries(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Forecast(ForecastError::Numerical(_))
            | ApiError::Load(_)
            | ApiError::Task(_)
            | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ---

/// Parse an optional `granularity` query value (default daily).
fn parse_granularity(value: Option<&str>) -> Result<Granularity, ApiError> {
    // ---
    match value {
        None => Ok(Granularity::Daily),
        Some(s) => Ok(s.parse()?),
    }
}

/// Parse an optional `YYYY-MM-DD` query value.
fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    // ---
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                ApiError::BadRequest(format!("invalid date '{}' (expected YYYY-MM-DD)", s))
            })
        })
        .transpose()
}

/// Parse an optional numeric query value.
fn parse_number<T: std::str::FromStr>(
    name: &str,
    value: Option<&str>,
) -> Result<Option<T>, ApiError> {
    // ---
    value
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|_| ApiError::BadRequest(format!("invalid {} '{}'", name, s)))
        })
        .transpose()
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(aggregates::router())
        .merge(forecasts::router())
        .merge(cost::router())
        .merge(health::router())
        .with_state(state)
}
