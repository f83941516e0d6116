//! # mixer-api — HTTP facade over the Mixer federation core
//!
//! This crate exposes the four logical RPCs the dispatcher implements
//! (node traversal, observation queries, entity resolution, free-text node
//! search) as a small Axum JSON API. There is no authentication, no
//! tenant isolation, and no resource model to negotiate content types for —
//! the core has none of those concerns, so neither does this facade.
//!
//! ## Endpoints
//!
//! | Method | Path | RPC |
//! |---|---|---|
//! | GET | `/health` | health check |
//! | POST | `/v1/node` | node traversal |
//! | POST | `/v1/observation` | observation query |
//! | POST | `/v1/resolve` | entity resolution |
//! | POST | `/v1/node-search` | free-text node search |
//!
//! ## Error Handling
//!
//! Errors are returned as a small uniform JSON body, `{"error": code,
//! "message": text}`; see [`error`] for the mapping from
//! [`mixer_core::MixerError`] to HTTP status codes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mixer_api::{create_app, ServerConfig};
//! use mixer_core::dispatcher::Dispatcher;
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(Dispatcher::new(vec![], 0, Default::default(), Default::default(), Default::default(), None));
//! let app = create_app(dispatcher);
//!
//! # async fn run(app: axum::Router) -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`error`] — error types and JSON error response formatting
//! - [`config`] — server configuration
//! - [`state`] — application state (the dispatcher, configuration)
//! - [`handlers`] — one HTTP handler per RPC
//! - [`routing`] — route configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routing;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use mixer_core::dispatcher::Dispatcher;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with default configuration.
///
/// This is a convenience function that creates the app with default
/// settings. For more control, use [`create_app_with_config`].
pub fn create_app(dispatcher: Arc<Dispatcher>) -> Router {
    create_app_with_config(dispatcher, ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// This function sets up the complete Mixer HTTP facade with all handlers
/// and middleware.
pub fn create_app_with_config(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Router {
    info!("creating mixer-api server");

    let state = AppState::new(dispatcher, config.clone());
    let router = routing::create_routes(state);

    let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
        TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ),
    );

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    cors = if config.cors_origins == "*" {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    };

    cors = if config.cors_methods == "*" {
        cors.allow_methods(Any)
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_methods(methods)
    };

    cors = if config.cors_headers == "*" {
        cors.allow_headers(Any)
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_headers(headers)
    };

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// Should be called once at application startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mixer_api={level},tower_http=debug")));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
