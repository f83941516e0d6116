//! Health check endpoint.
//!
//! Provides a simple health status endpoint for monitoring and load
//! balancers; the core has no durable storage to probe, so this reports on
//! the process itself rather than any backend's reachability.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::debug;

use crate::state::AppState;

/// Handler for `GET /health`.
///
/// # HTTP Response
///
/// - `200 OK` — the process is up and able to serve requests.
pub async fn health_handler(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("processing health check request");

    let response = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(response))
}
