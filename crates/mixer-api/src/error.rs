//! Error types for the Mixer HTTP facade.
//!
//! This module maps [`mixer_core::MixerError`] onto HTTP status codes and a
//! small, uniform JSON error body — there is no FHIR OperationOutcome
//! equivalent here, since the core has no resource model.
//!
//! # Error Mapping
//!
//! | `MixerError` | HTTP Status | `error` code |
//! |---|---|---|
//! | `InvalidArgument` | 400 | `invalid_argument` |
//! | `NotFound` | 404 | `not_found` |
//! | `Aborted` | 409 | `stale_cursor` |
//! | `DeadlineExceeded` | 504 | `deadline_exceeded` |
//! | `Unavailable` | 503 | `unavailable` |
//! | `Internal` | 500 | `internal` |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mixer_core::MixerError;
use std::fmt;

/// The primary error type returned by every handler in this crate.
#[derive(Debug)]
pub struct ApiError(pub MixerError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ApiError {}

impl From<MixerError> for ApiError {
    fn from(err: MixerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            MixerError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            MixerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            MixerError::Aborted => (StatusCode::CONFLICT, "stale_cursor"),
            MixerError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            MixerError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            MixerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = serde_json::json!({
            "error": code,
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for Mixer API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_delegates_to_inner_error() {
        let err = ApiError(MixerError::NotFound("country/ZZ".to_string()));
        assert_eq!(err.to_string(), "not found: country/ZZ");
    }
}
