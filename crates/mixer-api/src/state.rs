//! Application state for the Mixer HTTP facade.
//!
//! This module defines the shared application state available to every
//! handler: the [`Dispatcher`] and the server configuration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mixer_core::backend::RequestContext;
use mixer_core::dispatcher::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state for the HTTP facade.
#[derive(Clone)]
pub struct AppState {
    /// The dispatcher every handler calls through.
    dispatcher: Arc<Dispatcher>,

    /// Server configuration.
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates a new AppState with the given dispatcher and configuration.
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        Self {
            dispatcher,
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the default page size from configuration.
    pub fn default_page_size(&self) -> usize {
        self.config.default_page_size
    }

    /// Returns the maximum page size from configuration.
    pub fn max_page_size(&self) -> usize {
        self.config.max_page_size
    }

    /// Builds a fresh [`RequestContext`] with a deadline `request_timeout`
    /// seconds from now, per-request as §9 requires (no ambient state).
    pub fn new_request_context(&self, request_id: impl Into<String>) -> RequestContext {
        let deadline = Instant::now() + Duration::from_secs(self.config.request_timeout);
        RequestContext::new(request_id, deadline)
    }

    /// Clamps a caller-supplied page size to `[1, max_page_size]`, falling
    /// back to the default when the caller supplies zero.
    pub fn clamp_page_size(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_page_size()
        } else {
            requested.min(self.max_page_size())
        }
    }
}
