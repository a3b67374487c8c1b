//! Existence probe: the first, cheap question asked for every order key.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use orderdesk_core::{ExistenceSignal, OrderKey, OrderSummary};

use crate::api::{ExistenceQuery, OrderApi};
use crate::metrics::FlowMetrics;

/// What the probe learned about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend confirmed there is no order.
    Absent,
    /// The backend returned the existing order.
    Found(OrderSummary),
    /// The backend claimed an order exists but did not describe it.
    Ambiguous,
    /// The backend could not be reached or answered with an error.
    TransportFailed {
        /// Error message, for logs.
        message: String,
    },
}

impl ProbeOutcome {
    /// Returns the existence signal this outcome stands for.
    ///
    /// Both an ambiguous answer and a transport failure read as
    /// `Confirmed(None)`: an order may exist and nothing is known about it.
    #[must_use]
    pub fn signal(&self) -> ExistenceSignal {
        match self {
            Self::Absent => ExistenceSignal::Absent,
            Self::Found(summary) => ExistenceSignal::Confirmed(Some(summary.clone())),
            Self::Ambiguous | Self::TransportFailed { .. } => ExistenceSignal::Confirmed(None),
        }
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Found(_) => "found",
            Self::Ambiguous => "ambiguous",
            Self::TransportFailed { .. } => "transport_failed",
        }
    }
}

impl From<ExistenceSignal> for ProbeOutcome {
    fn from(signal: ExistenceSignal) -> Self {
        match signal {
            ExistenceSignal::Confirmed(Some(summary)) => Self::Found(summary),
            ExistenceSignal::Confirmed(None) | ExistenceSignal::Unknown => Self::Ambiguous,
            ExistenceSignal::Absent => Self::Absent,
        }
    }
}

/// Asks the backend whether an order exists for a key.
///
/// The outcome is cached for the most recent key, so repeated resolutions of
/// the same key issue a single query. Transport failures are cached too;
/// [`ExistenceProbe::invalidate`] forces the next call to ask again.
#[derive(Clone)]
pub struct ExistenceProbe {
    api: Arc<dyn OrderApi>,
    cache: Arc<Mutex<Option<(OrderKey, ProbeOutcome)>>>,
    metrics: FlowMetrics,
}

impl fmt::Debug for ExistenceProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExistenceProbe").finish_non_exhaustive()
    }
}

impl ExistenceProbe {
    /// Creates a probe over `api`.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(None)),
            metrics: FlowMetrics::new(),
        }
    }

    /// Resolves the existence of an order for `key`. Never fails.
    #[tracing::instrument(
        skip(self),
        fields(user_id = %key.user_id, area_id = %key.area_id, day = %key.day)
    )]
    pub async fn resolve(&self, key: &OrderKey) -> ProbeOutcome {
        if let Some(cached) = self.cached(key) {
            tracing::debug!(outcome = cached.label(), "probe served from cache");
            return cached;
        }

        let query = ExistenceQuery {
            area_id: key.area_id,
            day: key.day.clone(),
            user_id: Some(key.user_id),
        };
        let outcome = match self.api.probe_existence(&query).await {
            Ok(response) => ProbeOutcome::from(response.into_signal()),
            Err(err) => {
                tracing::warn!(error = %err, "existence probe failed");
                ProbeOutcome::TransportFailed {
                    message: err.to_string(),
                }
            }
        };

        self.metrics.record_probe(outcome.label());
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((key.clone(), outcome.clone()));
        outcome
    }

    /// Drops the cached outcome.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cached(&self, key: &OrderKey) -> Option<ProbeOutcome> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|(cached_key, _)| cached_key == key)
            .map(|(_, outcome)| outcome.clone())
    }
}
