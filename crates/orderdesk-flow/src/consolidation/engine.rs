//! Drives the decision reducer against a backend.
//!
//! Every event goes through one [`SharedDecision`]. The engine performs the
//! effects the reducer asks for (probe, scan, ledger writes) and feeds the
//! results back as new events through a FIFO queue, so concurrent calls on
//! one engine interleave only at backend calls and never write a decision
//! for a key that is no longer selected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Instrument;

use orderdesk_core::observability::consolidation_span;
use orderdesk_core::{AreaId, CalendarDay, CoreConfig, DayClock, OrderKey, UserId};

use super::decision::{DecisionState, SharedDecision};
use super::events::{ConsolidationEvent, Effect};
use super::fallback::FallbackScanner;
use super::ledger::SessionLedger;
use super::probe::ExistenceProbe;
use super::submitter::{Cart, OrderSubmitter, SubmitReceipt, SubmitRejection};
use crate::api::OrderApi;
use crate::error::{Error, Result};
use crate::metrics::FlowMetrics;

#[derive(Debug, Clone, Default)]
struct Selection {
    user_id: Option<UserId>,
    area_id: Option<AreaId>,
    pinned_day: Option<CalendarDay>,
}

/// Order consolidation for one session.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use orderdesk_core::prelude::*;
/// use orderdesk_flow::prelude::*;
///
/// # futures::executor::block_on(async {
/// let api = Arc::new(InMemoryOrderApi::default());
/// let engine = ConsolidationEngine::new(api, &CoreConfig::default(), SessionLedger::new())?;
///
/// let state = engine.select(Some(UserId::new(5)), Some(AreaId::new(2))).await?;
/// assert_eq!(state, DecisionState::NoOrder);
/// # Ok::<(), orderdesk_flow::error::Error>(())
/// # }).unwrap();
/// ```
pub struct ConsolidationEngine {
    decision: SharedDecision,
    probe: ExistenceProbe,
    fallback: FallbackScanner,
    submitter: OrderSubmitter,
    ledger: SessionLedger,
    clock: DayClock,
    selection: Mutex<Selection>,
    metrics: FlowMetrics,
}

impl fmt::Debug for ConsolidationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsolidationEngine")
            .field("clock", &self.clock)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl ConsolidationEngine {
    /// Creates an engine over `api` using `ledger` for this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(api: Arc<dyn OrderApi>, config: &CoreConfig, ledger: SessionLedger) -> Result<Self> {
        config.validate()?;
        let clock = config.day_clock()?;
        Ok(Self {
            decision: SharedDecision::new(),
            probe: ExistenceProbe::new(Arc::clone(&api)),
            fallback: FallbackScanner::from_config(Arc::clone(&api), clock.clone(), config),
            submitter: OrderSubmitter::new(api, config.decimal_policy()),
            ledger,
            clock,
            selection: Mutex::new(Selection::default()),
            metrics: FlowMetrics::new(),
        })
    }

    /// Returns the clock producing canonical days.
    #[must_use]
    pub const fn clock(&self) -> &DayClock {
        &self.clock
    }

    /// Returns the session ledger.
    #[must_use]
    pub const fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    /// Builds the key for `user_id` and `area_id` on today's canonical day.
    #[must_use]
    pub fn key_for(&self, user_id: UserId, area_id: AreaId) -> OrderKey {
        OrderKey::new(user_id, area_id, self.clock.today())
    }

    /// Selects a user and area and resolves today's decision for them.
    ///
    /// Deselecting either one leaves the decision in `Checking`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if shared state is poisoned. Backend
    /// failures never surface here; they resolve the decision instead.
    pub async fn select(
        &self,
        user_id: Option<UserId>,
        area_id: Option<AreaId>,
    ) -> Result<DecisionState> {
        self.set_selection(Selection {
            user_id,
            area_id,
            pinned_day: None,
        })?;
        let key = self.expected_key()?;
        self.resolve(key).await
    }

    /// Selects an explicit key, pinning its day instead of following the clock.
    ///
    /// # Errors
    ///
    /// Same as [`ConsolidationEngine::select`].
    pub async fn select_key(&self, key: OrderKey) -> Result<DecisionState> {
        self.set_selection(Selection {
            user_id: Some(key.user_id),
            area_id: Some(key.area_id),
            pinned_day: Some(key.day.clone()),
        })?;
        self.resolve(Some(key)).await
    }

    /// Discards the cached probe outcome and resolves the current key again.
    ///
    /// # Errors
    ///
    /// Same as [`ConsolidationEngine::select`].
    pub async fn retry(&self) -> Result<DecisionState> {
        self.probe.invalidate();
        let key = self.expected_key()?;
        self.drive(ConsolidationEvent::KeyChanged(None)).await?;
        self.resolve(key).await
    }

    /// Returns the current decision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if shared state is poisoned.
    pub fn state(&self) -> Result<DecisionState> {
        self.decision.state()
    }

    /// Returns the key being decided.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if shared state is poisoned.
    pub fn current_key(&self) -> Result<Option<OrderKey>> {
        self.decision.key()
    }

    /// Submits `cart` for the selected user and area.
    ///
    /// Preconditions are checked in order: selection and cart, then the
    /// decision, then the session ledger. The current key is resolved first
    /// if needed, which covers a canonical day that rolled over and the fresh
    /// cycle that follows a successful submission.
    ///
    /// On success the area is recorded in the ledger, `cart` is cleared and
    /// the decision returns to `Checking`. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] with the first failed precondition, or
    /// [`Error::Transport`] if the backend call fails.
    pub async fn submit(&self, cart: &mut Cart, observation: Option<String>) -> Result<SubmitReceipt> {
        let selection = self.selection()?;
        let (user_id, area_id) = self
            .submitter
            .validate(selection.user_id, selection.area_id, cart)
            .map_err(|reason| self.rejected(reason))?;

        self.resolve(self.expected_key()?).await?;
        let key = self
            .decision
            .key()?
            .filter(|key| key.user_id == user_id && key.area_id == area_id)
            .ok_or_else(|| self.rejected(SubmitRejection::Unknown))?;

        let span = consolidation_span("submit", &key);
        self.submit_for(key, cart, observation).instrument(span).await
    }

    /// Ends the session: clears the ledger, the selection and any area still
    /// marked as submitting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if shared state is poisoned.
    pub fn end_session(&self) -> Result<()> {
        self.ledger.clear();
        self.probe.invalidate();
        self.set_selection(Selection::default())?;
        self.decision.apply(ConsolidationEvent::SessionEnded)?;
        Ok(())
    }

    async fn submit_for(
        &self,
        key: OrderKey,
        cart: &mut Cart,
        observation: Option<String>,
    ) -> Result<SubmitReceipt> {
        let effects = self.decision.apply(ConsolidationEvent::SubmitRequested {
            key: key.clone(),
            already_submitted: self.ledger.contains(key.area_id),
        })?;
        let plan = match effects.into_iter().next() {
            Some(Effect::Submit { plan, .. }) => plan,
            Some(Effect::Reject(reason)) => return Err(self.rejected(reason)),
            other => {
                return Err(Error::internal(format!(
                    "unexpected submission effect: {other:?}"
                )));
            }
        };

        let guard = InFlightGuard::new(&self.decision, key);
        let result = self
            .submitter
            .submit(guard.key(), &plan, cart, observation)
            .await;
        let key = guard.disarm();

        match result {
            Ok(receipt) => {
                self.drive(ConsolidationEvent::SubmitSucceeded {
                    key,
                    order: receipt.order.clone(),
                })
                .await?;
                self.probe.invalidate();
                cart.clear();
                self.metrics.record_submission(plan.label());
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(error = %err, "submission failed");
                self.decision.apply(ConsolidationEvent::SubmitFailed {
                    key,
                    message: err.to_string(),
                })?;
                self.metrics.record_submission("failed");
                Err(err)
            }
        }
    }

    async fn resolve(&self, key: Option<OrderKey>) -> Result<DecisionState> {
        match &key {
            Some(k) => {
                let span = consolidation_span("resolve", k);
                self.drive(ConsolidationEvent::KeyChanged(key.clone()))
                    .instrument(span)
                    .await?;
            }
            None => {
                self.drive(ConsolidationEvent::KeyChanged(None)).await?;
            }
        }
        self.decision.state()
    }

    /// Applies `first` and every event its effects produce, in order.
    async fn drive(&self, first: ConsolidationEvent) -> Result<()> {
        let mut queue = VecDeque::from([first]);
        while let Some(event) = queue.pop_front() {
            for effect in self.decision.apply(event)? {
                match effect {
                    Effect::Probe(key) => {
                        let outcome = self.probe.resolve(&key).await;
                        queue.push_back(ConsolidationEvent::ProbeResolved { key, outcome });
                    }
                    Effect::Scan(key) => {
                        let outcome = self.fallback.scan(&key).await;
                        queue.push_back(ConsolidationEvent::FallbackResolved { key, outcome });
                    }
                    Effect::RecordSubmission(area_id) => {
                        self.ledger.record(area_id);
                    }
                    Effect::Submit { .. } | Effect::Reject(_) => {
                        return Err(Error::internal(
                            "submission effects are only produced by submit",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn rejected(&self, reason: SubmitRejection) -> Error {
        tracing::info!(reason = reason.label(), "submission rejected: {reason}");
        self.metrics.record_submission("rejected");
        Error::Rejected(reason)
    }

    fn expected_key(&self) -> Result<Option<OrderKey>> {
        let selection = self.selection()?;
        Ok(match (selection.user_id, selection.area_id) {
            (Some(user_id), Some(area_id)) => Some(OrderKey::new(
                user_id,
                area_id,
                selection.pinned_day.unwrap_or_else(|| self.clock.today()),
            )),
            _ => None,
        })
    }

    fn selection(&self) -> Result<Selection> {
        Ok(self
            .selection
            .lock()
            .map_err(|_: PoisonError<_>| Error::internal("selection lock poisoned"))?
            .clone())
    }

    fn set_selection(&self, selection: Selection) -> Result<()> {
        *self
            .selection
            .lock()
            .map_err(|_: PoisonError<_>| Error::internal("selection lock poisoned"))? = selection;
        Ok(())
    }
}

/// Releases an admitted submission if its future is dropped before the
/// backend answers.
struct InFlightGuard<'a> {
    decision: &'a SharedDecision,
    key: OrderKey,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    const fn new(decision: &'a SharedDecision, key: OrderKey) -> Self {
        Self {
            decision,
            key,
            armed: true,
        }
    }

    const fn key(&self) -> &OrderKey {
        &self.key
    }

    /// Hands the key back; the caller reports the outcome itself.
    fn disarm(mut self) -> OrderKey {
        self.armed = false;
        self.key.clone()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(area_id = %self.key.area_id, "submission dropped before the backend answered");
        if let Err(err) = self.decision.apply(ConsolidationEvent::SubmitFailed {
            key: self.key.clone(),
            message: "submission cancelled".to_string(),
        }) {
            tracing::error!(error = %err, "could not release cancelled submission");
        }
    }
}
