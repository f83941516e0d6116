//! Per-request context threaded explicitly through every backend call.
//!
//! There is no ambient/global per-request state (§9): deadline, cancellation,
//! and the request id all flow through a [`RequestContext`] value instead.

use std::sync::Arc;
use std::time::Instant;

use tokio_util_lite::CancellationToken;

/// Context for a single logical request, threaded through C5/C7/C8 planning,
/// the C2 fan-out, and every `BackendDriver` call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// A unique identifier for this request, for diagnostics.
    pub request_id: String,
    /// The absolute instant by which a response must be produced.
    pub deadline: Instant,
    /// Signaled when the fan-out executor cancels in-flight work.
    pub cancellation: Arc<CancellationToken>,
}

impl RequestContext {
    /// Creates a new context with the given deadline and a fresh
    /// cancellation token.
    pub fn new(request_id: impl Into<String>, deadline: Instant) -> Self {
        Self {
            request_id: request_id.into(),
            deadline,
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Returns the time remaining until the deadline, or `Duration::ZERO`
    /// if it has already passed.
    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// A minimal, dependency-free cancellation token.
///
/// The core avoids pulling in `tokio-util` for this one primitive; a single
/// `AtomicBool` is enough to let backends poll for cancellation between
/// I/O steps.
mod tokio_util_lite {
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A cooperative cancellation flag shared via `Arc`.
    #[derive(Debug, Default)]
    pub struct CancellationToken {
        cancelled: AtomicBool,
    }

    impl CancellationToken {
        /// Creates a new, unset token.
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the token; subsequent `is_cancelled` calls return true.
        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        /// Returns whether `cancel` has been called.
        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }
}
