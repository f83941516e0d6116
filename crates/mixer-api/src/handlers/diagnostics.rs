//! JSON shape for the dispatcher's per-backend diagnostics envelope.

use mixer_core::dispatcher::Diagnostics;
use mixer_core::fanout::{Diagnostic, DiagnosticOutcome};
use serde::Serialize;

/// What happened to one backend's sub-request, as returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiagnosticOutcomeBody {
    /// Completed successfully.
    Succeeded,
    /// Skipped (`NotFound`/`Unimplemented`).
    Skipped,
    /// Failed with a recorded error.
    Failed {
        /// The recorded error message.
        reason: String,
    },
}

impl From<DiagnosticOutcome> for DiagnosticOutcomeBody {
    fn from(outcome: DiagnosticOutcome) -> Self {
        match outcome {
            DiagnosticOutcome::Succeeded => DiagnosticOutcomeBody::Succeeded,
            DiagnosticOutcome::Skipped => DiagnosticOutcomeBody::Skipped,
            DiagnosticOutcome::Failed(reason) => DiagnosticOutcomeBody::Failed { reason },
        }
    }
}

/// One backend's outcome for a single request.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticBody {
    /// The backend's name.
    pub backend_name: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: DiagnosticOutcomeBody,
}

impl From<Diagnostic> for DiagnosticBody {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            backend_name: diagnostic.backend_name,
            outcome: diagnostic.outcome.into(),
        }
    }
}

/// The full per-backend diagnostics envelope for one request.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DiagnosticsBody {
    /// One entry per backend consulted.
    pub per_backend: Vec<DiagnosticBody>,
}

impl From<Diagnostics> for DiagnosticsBody {
    fn from(diagnostics: Diagnostics) -> Self {
        Self {
            per_backend: diagnostics.per_backend.into_iter().map(Into::into).collect(),
        }
    }
}
