//! `GET /cost?flow_rate=&granularity=`: volume and cost for an average flow.

use axum::{extract::Query, routing::get, Json, Router};
use serde::Deserialize;

use super::{parse_granularity, parse_number, ApiError, AppState};
use crate::cost::{self, CostEstimate};

pub fn router() -> Router<AppState> {
    Router::new().route("/cost", get(handler))
}

#[derive(Debug, Deserialize)]
struct CostQuery {
    flow_rate: Option<String>,
    granularity: Option<String>,
}

async fn handler(Query(params): Query<CostQuery>) -> Result<Json<CostEstimate>, ApiError> {
    // ---
    let flow_rate: f64 = parse_number("flow_rate", params.flow_rate.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("missing flow_rate".to_string()))?;
    if !flow_rate.is_finite() {
        return Err(ApiError::BadRequest(format!("invalid flow_rate '{}'", flow_rate)));
    }
    let granularity = parse_granularity(params.granularity.as_deref())?;
    Ok(Json(cost::estimate(flow_rate, granularity)))
}
