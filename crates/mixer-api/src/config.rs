//! Server configuration for the Mixer HTTP facade.
//!
//! This struct can be constructed from environment variables using
//! [`ServerConfig::from_env`], from command line arguments using
//! [`ServerConfig::parse`], or programmatically.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MIXER_SERVER_PORT` | 8080 | Server port |
//! | `MIXER_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `MIXER_LOG_LEVEL` | info | Log level |
//! | `MIXER_MAX_BODY_SIZE` | 10485760 | Max request body (bytes) |
//! | `MIXER_REQUEST_TIMEOUT` | 30 | Per-request deadline (seconds), threaded into every [`mixer_core::backend::RequestContext`] |
//! | `MIXER_ENABLE_CORS` | true | Enable CORS |
//! | `MIXER_CORS_ORIGINS` | * | Allowed origins |
//! | `MIXER_CORS_METHODS` | GET,POST,OPTIONS | Allowed methods |
//! | `MIXER_CORS_HEADERS` | Content-Type | Allowed headers |
//! | `MIXER_DEFAULT_PAGE_SIZE` | 20 | Default page size when a request omits one |
//! | `MIXER_MAX_PAGE_SIZE` | 1000 | Maximum page size a caller may request |

use clap::Parser;

/// Server configuration for the Mixer HTTP facade.
#[derive(Debug, Clone, Parser)]
#[command(name = "mixer-server")]
#[command(about = "Mixer federation gateway HTTP server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "MIXER_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "MIXER_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "MIXER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "MIXER_MAX_BODY_SIZE", default_value = "10485760")]
    pub max_body_size: usize,

    /// Per-request deadline in seconds, converted to a [`std::time::Instant`]
    /// and threaded into every backend call via `RequestContext`.
    #[arg(long, env = "MIXER_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "MIXER_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "MIXER_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "MIXER_CORS_METHODS", default_value = "GET,POST,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(long, env = "MIXER_CORS_HEADERS", default_value = "Content-Type")]
    pub cors_headers: String,

    /// Default page size applied when a request omits one.
    #[arg(long, env = "MIXER_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: usize,

    /// Maximum page size a caller may request.
    #[arg(long, env = "MIXER_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 10 * 1024 * 1024,
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,OPTIONS".to_string(),
            cors_headers: "Content-Type".to_string(),
            default_page_size: 20,
            max_page_size: 1000,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }
        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }
        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }
        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }
        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Creates a configuration suitable for testing: ephemeral port, no CORS.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            max_body_size: 10 * 1024 * 1024,
            request_timeout: 5,
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}
