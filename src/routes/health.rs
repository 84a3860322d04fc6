// src/routes/health.rs
//! Liveness endpoint.
//!
//! Exports a subrouter with `GET /health` for container orchestrators and
//! CI. The handler reports whether the live feed is attached but never
//! touches the flat files, so it stays cheap.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    live_feed_connected: bool,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    let live_feed_connected = state.live.read().await.is_connected();
    Json(HealthResponse {
        status: "ok",
        live_feed_connected,
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
