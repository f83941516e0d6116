//! The §7 error taxonomy.
//!
//! Every error that can escape the dispatcher maps to one of these kinds.
//! Per-backend errors are a separate, narrower type ([`BackendError`]); most
//! of them are absorbed by the fan-out executor and never become a
//! [`MixerError`] at all (§7 propagation rules).

use thiserror::Error;

use crate::model::observation::DuplicateDateError;

/// The result type used throughout the core.
pub type MixerResult<T> = Result<T, MixerError>;

/// The top-level error type returned by the dispatcher (C10).
#[derive(Debug, Error)]
pub enum MixerError {
    /// Malformed path expression, empty required field, unknown date
    /// selector, or bad formula syntax.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The entity or variable is valid but has no data; surfaced only when
    /// the caller explicitly requested existence.
    #[error("not found: {0}")]
    NotFound(String),

    /// A supplied cursor's `view_epoch` does not match the live roster.
    #[error("aborted: cursor stale")]
    Aborted,

    /// The aggregate deadline fired before a response was assembled.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Every backend in the active import group failed for non-logical
    /// reasons.
    #[error("unavailable: all backends failed: {0}")]
    Unavailable(String),

    /// An invariant was violated (e.g. a duplicate date within one
    /// backend's series).
    #[error("internal: {0}")]
    Internal(String),
}

impl From<DuplicateDateError> for MixerError {
    fn from(e: DuplicateDateError) -> Self {
        MixerError::Internal(e.to_string())
    }
}

impl From<crate::pagination::PaginationError> for MixerError {
    fn from(e: crate::pagination::PaginationError) -> Self {
        match e {
            crate::pagination::PaginationError::StaleEpoch => MixerError::Aborted,
            crate::pagination::PaginationError::Malformed(msg) => {
                MixerError::InvalidArgument(format!("malformed cursor: {msg}"))
            }
        }
    }
}

impl From<crate::traversal::TraversalParseError> for MixerError {
    fn from(e: crate::traversal::TraversalParseError) -> Self {
        MixerError::InvalidArgument(e.to_string())
    }
}

impl From<crate::formula::FormulaError> for MixerError {
    fn from(e: crate::formula::FormulaError) -> Self {
        MixerError::InvalidArgument(e.to_string())
    }
}

impl From<crate::fanout::FanOutError> for MixerError {
    fn from(e: crate::fanout::FanOutError) -> Self {
        match e {
            crate::fanout::FanOutError::DeadlineExceeded => MixerError::DeadlineExceeded,
            crate::fanout::FanOutError::AllBackendsFailed(msg) => MixerError::Unavailable(msg),
        }
    }
}

/// Errors a single backend can return from any [`crate::backend::BackendDriver`] method.
#[derive(Debug, Error, Clone)]
pub enum BackendError {
    /// The backend as a whole is down; never returned for individual
    /// missing keys (§4.1).
    #[error("backend '{backend}' unavailable: {reason}")]
    Unavailable {
        /// The backend's name.
        backend: String,
        /// A human-readable reason.
        reason: String,
    },

    /// The backend does not support the requested capability at all
    /// (e.g. `Search` on a backend with no search support).
    #[error("backend '{backend}' does not implement this operation")]
    Unimplemented {
        /// The backend's name.
        backend: String,
    },

    /// The backend understood the request but found nothing; distinct from
    /// "missing key", which is simply absent from a bulk-read map.
    #[error("backend '{backend}' found no data")]
    NotFound {
        /// The backend's name.
        backend: String,
    },
}

impl BackendError {
    /// Returns true if this error should be silently skipped by the fan-out
    /// executor rather than recorded as a diagnostic failure (§4.2, §7).
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            BackendError::NotFound { .. } | BackendError::Unimplemented { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_unimplemented_are_skippable() {
        assert!(
            BackendError::NotFound {
                backend: "b1".into()
            }
            .is_skippable()
        );
        assert!(
            BackendError::Unimplemented {
                backend: "b1".into()
            }
            .is_skippable()
        );
    }

    #[test]
    fn unavailable_is_not_skippable() {
        assert!(
            !BackendError::Unavailable {
                backend: "b1".into(),
                reason: "timeout".into()
            }
            .is_skippable()
        );
    }
}
