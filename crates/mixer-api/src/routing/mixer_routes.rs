//! Maps HTTP paths onto the Mixer RPC handlers.

use axum::Router;
use axum::routing::{get, post};

use crate::handlers;
use crate::state::AppState;

/// Builds the router for every Mixer RPC plus the health endpoint.
///
/// | Method | Path | RPC |
/// |---|---|---|
/// | GET | `/health` | health check |
/// | POST | `/v1/node` | node traversal |
/// | POST | `/v1/observation` | observation query |
/// | POST | `/v1/resolve` | entity resolution |
/// | POST | `/v1/node-search` | free-text node search |
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v1/node", post(handlers::node_handler))
        .route("/v1/observation", post(handlers::observation_handler))
        .route("/v1/resolve", post(handlers::resolve_handler))
        .route("/v1/node-search", post(handlers::node_search_handler))
        .with_state(state)
}
