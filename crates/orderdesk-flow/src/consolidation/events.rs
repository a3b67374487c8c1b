//! Events fed into the decision reducer and the effects it asks for.

use orderdesk_core::{AreaId, OrderKey, OrderSummary};

use super::fallback::FallbackOutcome;
use super::probe::ProbeOutcome;
use super::submitter::{SubmitPlan, SubmitRejection};

/// Inputs to [`DecisionMachine::apply`](super::decision::DecisionMachine::apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsolidationEvent {
    /// The selected user, area or day changed. `None` means nothing is
    /// selected.
    KeyChanged(Option<OrderKey>),

    /// The session ended. Clears the selection and every in-flight area.
    SessionEnded,

    /// The existence probe answered for `key`.
    ProbeResolved {
        /// Key the probe was issued for.
        key: OrderKey,
        /// What it found.
        outcome: ProbeOutcome,
    },

    /// The fallback scan finished for `key`.
    FallbackResolved {
        /// Key the scan was issued for.
        key: OrderKey,
        /// What it found.
        outcome: FallbackOutcome,
    },

    /// A validated cart is ready to be submitted for `key`.
    SubmitRequested {
        /// Key the submission targets.
        key: OrderKey,
        /// Whether the session ledger already holds the key's area.
        already_submitted: bool,
    },

    /// The backend accepted a submission.
    SubmitSucceeded {
        /// Key the submission targeted.
        key: OrderKey,
        /// The order after the submission.
        order: OrderSummary,
    },

    /// The backend rejected or never received a submission, or the caller
    /// dropped it before the backend answered.
    SubmitFailed {
        /// Key the submission targeted.
        key: OrderKey,
        /// Error message, for logs.
        message: String,
    },
}

impl ConsolidationEvent {
    /// Returns the key a backend result belongs to, if this event carries one.
    #[must_use]
    pub const fn result_key(&self) -> Option<&OrderKey> {
        match self {
            Self::ProbeResolved { key, .. }
            | Self::FallbackResolved { key, .. }
            | Self::SubmitSucceeded { key, .. }
            | Self::SubmitFailed { key, .. } => Some(key),
            Self::KeyChanged(_) | Self::SessionEnded | Self::SubmitRequested { .. } => None,
        }
    }

    /// Returns a short label naming where the event came from.
    #[must_use]
    pub const fn source(&self) -> &'static str {
        match self {
            Self::KeyChanged(_) | Self::SessionEnded => "selection",
            Self::ProbeResolved { .. } => "probe",
            Self::FallbackResolved { .. } => "fallback",
            Self::SubmitRequested { .. }
            | Self::SubmitSucceeded { .. }
            | Self::SubmitFailed { .. } => "submit",
        }
    }
}

/// Work the reducer asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the existence probe for the key.
    Probe(OrderKey),
    /// Run the fallback scan for the key.
    Scan(OrderKey),
    /// Send the cart to the backend.
    Submit {
        /// Key the submission targets.
        key: OrderKey,
        /// Create a new order or merge into an open one.
        plan: SubmitPlan,
    },
    /// Refuse the submission.
    Reject(SubmitRejection),
    /// Record the area in the session ledger.
    RecordSubmission(AreaId),
}
