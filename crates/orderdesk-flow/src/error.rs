//! Error types for the consolidation and reconciliation domain.

use crate::consolidation::submitter::SubmitRejection;
use crate::items::applier::ApplyReport;
use crate::items::reconciler::ReconcileError;

/// The result type used throughout orderdesk-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in consolidation and reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend call failed (network failure or server error).
    ///
    /// No automatic retry is attempted; state is left as before the call.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A submission was refused before reaching the backend.
    #[error("submission rejected: {0}")]
    Rejected(#[from] SubmitRejection),

    /// A draft could not be reconciled against its snapshot.
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Some item operations failed; the report lists what still needs a retry.
    #[error("{} item operation(s) failed and need a manual retry", .0.failures.len())]
    PartialApply(Box<ApplyReport>),

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// An error from orderdesk-core.
    #[error("core error: {0}")]
    Core(#[from] orderdesk_core::error::Error),
}

impl Error {
    /// Creates a new transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the rejection reason if this error is a refused submission.
    #[must_use]
    pub const fn rejection(&self) -> Option<&SubmitRejection> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
