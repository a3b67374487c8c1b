//! The consolidation decision as a pure reducer.
//!
//! [`DecisionMachine`] holds the decision for the current [`OrderKey`] and
//! changes only through [`DecisionMachine::apply`]. Backend results carry the
//! key they were issued for; a result whose key no longer matches, or that
//! arrives after the decision was already resolved, is discarded.
//!
//! ```text
//! Checking ──probe Found(created)──────────────▶ OpenMergeable
//!    │      ──probe Found(other status)────────▶ Blocked(summary)
//!    │      ──probe Ambiguous──────────────────▶ Blocked(None)
//!    │      ──probe Absent / TransportFailed──▶ (scan)
//!    │                 scan Found ─────────────▶ classified as above
//!    │                 scan empty, probe Absent ─▶ NoOrder
//!    │                 scan empty, probe failed ─▶ Blocked(None)
//!    ◀──────────── any state on KeyChanged
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use orderdesk_core::{AreaId, OrderKey, OrderSummary};

use super::events::{ConsolidationEvent, Effect};
use super::fallback::FallbackOutcome;
use super::probe::ProbeOutcome;
use super::submitter::{SubmitPlan, SubmitRejection};
use crate::error::{Error, Result};
use crate::metrics::FlowMetrics;

/// Whether a new order may be created for the current key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecisionState {
    /// Not resolved yet.
    #[default]
    Checking,
    /// No order exists; a new one may be created.
    NoOrder,
    /// Today's order is still open; the cart is merged into it.
    OpenMergeable(OrderSummary),
    /// Today's order exists and blocks submission. `None` when an order is
    /// known to exist but could not be described.
    Blocked(Option<OrderSummary>),
}

impl DecisionState {
    /// Classifies a known existing order.
    #[must_use]
    pub fn classify(summary: OrderSummary) -> Self {
        if summary.is_mergeable() {
            Self::OpenMergeable(summary)
        } else {
            Self::Blocked(Some(summary))
        }
    }

    /// Returns true once the decision left `Checking`.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Checking)
    }

    /// Returns true if a submission may proceed from this state.
    #[must_use]
    pub const fn allows_submission(&self) -> bool {
        matches!(self, Self::NoOrder | Self::OpenMergeable(_))
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::NoOrder => "no_order",
            Self::OpenMergeable(_) => "open_mergeable",
            Self::Blocked(_) => "blocked",
        }
    }

    /// Returns the existing order, if one is known.
    #[must_use]
    pub const fn summary(&self) -> Option<&OrderSummary> {
        match self {
            Self::OpenMergeable(summary) | Self::Blocked(Some(summary)) => Some(summary),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => f.write_str("checking"),
            Self::NoOrder => f.write_str("no order today"),
            Self::OpenMergeable(summary) => write!(f, "open order {} (created)", summary.id),
            Self::Blocked(Some(summary)) => {
                write!(f, "blocked by order {} ({})", summary.id, summary.status)
            }
            Self::Blocked(None) => f.write_str("blocked by an order of unknown state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbePhase {
    NotIssued,
    Pending,
    Done(ProbeOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    NotIssued,
    Pending,
    Done,
}

/// Reducer over [`ConsolidationEvent`]s.
#[derive(Debug, Clone)]
pub struct DecisionMachine {
    key: Option<OrderKey>,
    state: DecisionState,
    probe: ProbePhase,
    scan: ScanPhase,
    in_flight: BTreeSet<AreaId>,
}

impl Default for DecisionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionMachine {
    /// Creates a machine with nothing selected.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key: None,
            state: DecisionState::Checking,
            probe: ProbePhase::NotIssued,
            scan: ScanPhase::NotIssued,
            in_flight: BTreeSet::new(),
        }
    }

    /// Returns the key being decided.
    #[must_use]
    pub const fn key(&self) -> Option<&OrderKey> {
        self.key.as_ref()
    }

    /// Returns the current decision.
    #[must_use]
    pub const fn state(&self) -> &DecisionState {
        &self.state
    }

    /// Returns true if a submission for `area_id` awaits the backend.
    #[must_use]
    pub fn is_in_flight(&self, area_id: AreaId) -> bool {
        self.in_flight.contains(&area_id)
    }

    /// Returns true if `event` is a backend result for a key other than the
    /// current one.
    #[must_use]
    pub fn is_stale(&self, event: &ConsolidationEvent) -> bool {
        event
            .result_key()
            .is_some_and(|key| self.key.as_ref() != Some(key))
    }

    /// Applies one event and returns the effects to perform.
    pub fn apply(&mut self, event: ConsolidationEvent) -> Vec<Effect> {
        match event {
            ConsolidationEvent::KeyChanged(None) => {
                self.key = None;
                self.reset_cycle();
                Vec::new()
            }
            ConsolidationEvent::SessionEnded => {
                self.key = None;
                self.reset_cycle();
                self.in_flight.clear();
                Vec::new()
            }
            ConsolidationEvent::KeyChanged(Some(key)) => {
                if self.key.as_ref() == Some(&key) && self.probe != ProbePhase::NotIssued {
                    return Vec::new();
                }
                self.key = Some(key.clone());
                self.reset_cycle();
                self.probe = ProbePhase::Pending;
                vec![Effect::Probe(key)]
            }
            ConsolidationEvent::ProbeResolved { key, outcome } => {
                self.on_probe_resolved(key, outcome)
            }
            ConsolidationEvent::FallbackResolved { key, outcome } => {
                self.on_fallback_resolved(&key, outcome);
                Vec::new()
            }
            ConsolidationEvent::SubmitRequested {
                key,
                already_submitted,
            } => vec![self.admit(key, already_submitted)],
            ConsolidationEvent::SubmitSucceeded { key, .. } => {
                self.in_flight.remove(&key.area_id);
                if self.is_current(&key) {
                    self.reset_cycle();
                }
                vec![Effect::RecordSubmission(key.area_id)]
            }
            ConsolidationEvent::SubmitFailed { key, .. } => {
                self.in_flight.remove(&key.area_id);
                Vec::new()
            }
        }
    }

    fn is_current(&self, key: &OrderKey) -> bool {
        self.key.as_ref() == Some(key)
    }

    fn reset_cycle(&mut self) {
        self.state = DecisionState::Checking;
        self.probe = ProbePhase::NotIssued;
        self.scan = ScanPhase::NotIssued;
    }

    fn on_probe_resolved(&mut self, key: OrderKey, outcome: ProbeOutcome) -> Vec<Effect> {
        if !self.is_current(&key) || self.probe != ProbePhase::Pending {
            return Vec::new();
        }
        self.probe = ProbePhase::Done(outcome.clone());
        if self.state.is_resolved() {
            return Vec::new();
        }

        match outcome {
            ProbeOutcome::Found(summary) => {
                self.state = DecisionState::classify(summary);
                Vec::new()
            }
            ProbeOutcome::Ambiguous => {
                self.state = DecisionState::Blocked(None);
                Vec::new()
            }
            ProbeOutcome::Absent | ProbeOutcome::TransportFailed { .. } => {
                self.scan = ScanPhase::Pending;
                vec![Effect::Scan(key)]
            }
        }
    }

    fn on_fallback_resolved(&mut self, key: &OrderKey, outcome: FallbackOutcome) {
        if !self.is_current(key) || self.scan != ScanPhase::Pending {
            return;
        }
        self.scan = ScanPhase::Done;
        if self.state.is_resolved() {
            return;
        }

        let probe_confirmed_absent = matches!(self.probe, ProbePhase::Done(ProbeOutcome::Absent));
        self.state = match outcome {
            FallbackOutcome::Found(summary) => DecisionState::classify(summary),
            FallbackOutcome::NotFound | FallbackOutcome::Failed { .. }
                if probe_confirmed_absent =>
            {
                DecisionState::NoOrder
            }
            FallbackOutcome::NotFound | FallbackOutcome::Failed { .. } => {
                DecisionState::Blocked(None)
            }
        };
    }

    fn admit(&mut self, key: OrderKey, already_submitted: bool) -> Effect {
        if !self.is_current(&key) {
            return Effect::Reject(SubmitRejection::Unknown);
        }
        let plan = match &self.state {
            DecisionState::Checking => return Effect::Reject(SubmitRejection::Unknown),
            DecisionState::Blocked(None) => return Effect::Reject(SubmitRejection::AlreadyExists),
            DecisionState::Blocked(Some(summary)) => {
                return Effect::Reject(SubmitRejection::StatusNotCreated {
                    order_id: summary.id,
                    status: summary.status,
                });
            }
            DecisionState::NoOrder => SubmitPlan::Create,
            DecisionState::OpenMergeable(summary) => SubmitPlan::Merge(summary.clone()),
        };
        if already_submitted {
            return Effect::Reject(SubmitRejection::AlreadySubmittedThisSession {
                area_id: key.area_id,
            });
        }
        if !self.in_flight.insert(key.area_id) {
            return Effect::Reject(SubmitRejection::SubmissionInFlight);
        }
        Effect::Submit { key, plan }
    }
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("decision lock poisoned")
}

/// A [`DecisionMachine`] shared by every task of one engine.
///
/// Each event is applied under the lock in one step; the lock is never held
/// across a backend call. Stale discards and state changes are logged and
/// metered here.
#[derive(Debug, Clone, Default)]
pub struct SharedDecision {
    inner: Arc<Mutex<DecisionMachine>>,
    metrics: FlowMetrics,
}

impl SharedDecision {
    /// Creates a shared machine with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn apply(&self, event: ConsolidationEvent) -> Result<Vec<Effect>> {
        let mut machine = self.inner.lock().map_err(poison_err)?;

        if machine.is_stale(&event) {
            tracing::debug!(
                source = event.source(),
                result_key = ?event.result_key(),
                current_key = ?machine.key(),
                "discarding result for a previous key"
            );
            self.metrics.record_stale_result(event.source());
        }

        let before = machine.state().label();
        let effects = machine.apply(event);
        let after = machine.state().label();

        if before != after {
            match machine.key() {
                Some(key) => tracing::info!(
                    user_id = %key.user_id,
                    area_id = %key.area_id,
                    day = %key.day,
                    from = before,
                    to = after,
                    decision = %machine.state(),
                    "consolidation decision changed"
                ),
                None => tracing::info!(from = before, to = after, "consolidation decision reset"),
            }
            self.metrics.record_decision_transition(before, after);
        }
        drop(machine);

        Ok(effects)
    }

    /// Returns a copy of the current decision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn state(&self) -> Result<DecisionState> {
        Ok(self.inner.lock().map_err(poison_err)?.state().clone())
    }

    /// Returns the key being decided.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn key(&self) -> Result<Option<OrderKey>> {
        Ok(self.inner.lock().map_err(poison_err)?.key().cloned())
    }
}
