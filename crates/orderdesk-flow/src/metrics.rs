//! Observability metrics for consolidation and reconciliation.
//!
//! Metrics are recorded through the `metrics` crate facade; without an
//! installed recorder every call is a no-op.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `orderdesk_decision_transitions_total` | Counter | `from_state`, `to_state` | Decision state changes |
//! | `orderdesk_stale_results_total` | Counter | `source` | Results discarded because the key moved on |
//! | `orderdesk_probe_requests_total` | Counter | `result` | Existence probe outcomes |
//! | `orderdesk_fallback_pages_total` | Counter | - | Listing pages read by the fallback scanner |
//! | `orderdesk_submissions_total` | Counter | `result` | Submission outcomes (created, merged, rejected, failed) |
//! | `orderdesk_apply_operations_total` | Counter | `bucket`, `result` | Item operations by bucket and outcome |
//! | `orderdesk_apply_duration_seconds` | Histogram | - | Time to apply one reconciliation delta |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orderdesk_flow::metrics::FlowMetrics;
//!
//! let metrics = FlowMetrics::new();
//! metrics.record_decision_transition("checking", "no_order");
//! metrics.record_submission("created");
//! ```

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Decision state transitions.
    pub const DECISION_TRANSITIONS_TOTAL: &str = "orderdesk_decision_transitions_total";
    /// Counter: Results discarded as stale.
    pub const STALE_RESULTS_TOTAL: &str = "orderdesk_stale_results_total";
    /// Counter: Existence probe outcomes.
    pub const PROBE_REQUESTS_TOTAL: &str = "orderdesk_probe_requests_total";
    /// Counter: Listing pages read by the fallback scanner.
    pub const FALLBACK_PAGES_TOTAL: &str = "orderdesk_fallback_pages_total";
    /// Counter: Submission outcomes.
    pub const SUBMISSIONS_TOTAL: &str = "orderdesk_submissions_total";
    /// Counter: Item operations by bucket and outcome.
    pub const APPLY_OPERATIONS_TOTAL: &str = "orderdesk_apply_operations_total";
    /// Histogram: Duration of applying one delta, in seconds.
    pub const APPLY_DURATION_SECONDS: &str = "orderdesk_apply_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Previous decision state.
    pub const FROM_STATE: &str = "from_state";
    /// New decision state.
    pub const TO_STATE: &str = "to_state";
    /// Origin of a discarded result (probe, fallback, submit).
    pub const SOURCE: &str = "source";
    /// Outcome label.
    pub const RESULT: &str = "result";
    /// Delta bucket (create, update, delete).
    pub const BUCKET: &str = "bucket";
}

/// High-level interface for recording consolidation metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct FlowMetrics {
    _private: (),
}

impl FlowMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision state transition.
    pub fn record_decision_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::DECISION_TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a result discarded because it no longer matches the current key.
    pub fn record_stale_result(&self, source: &str) {
        counter!(
            names::STALE_RESULTS_TOTAL,
            labels::SOURCE => source.to_string(),
        )
        .increment(1);
    }

    /// Records an existence probe outcome.
    pub fn record_probe(&self, result: &str) {
        counter!(
            names::PROBE_REQUESTS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records one listing page read by the fallback scanner.
    pub fn record_fallback_page(&self) {
        counter!(names::FALLBACK_PAGES_TOTAL).increment(1);
    }

    /// Records a submission outcome.
    pub fn record_submission(&self, result: &str) {
        counter!(
            names::SUBMISSIONS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records one item operation.
    pub fn record_apply_operation(&self, bucket: &str, result: &str) {
        counter!(
            names::APPLY_OPERATIONS_TOTAL,
            labels::BUCKET => bucket.to_string(),
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records the time taken to apply a delta.
    pub fn observe_apply_duration(&self, duration: Duration) {
        histogram!(names::APPLY_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Starts timing a delta application; the duration is recorded on drop.
    #[must_use]
    pub fn time_apply(&self) -> TimingGuard<impl FnOnce(Duration) + use<>> {
        let metrics = self.clone();
        TimingGuard::new(move |duration| metrics.observe_apply_duration(duration))
    }
}

/// RAII guard for timing operations.
///
/// Calls `on_drop` with the elapsed duration when dropped.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        let metrics = FlowMetrics::new();
        metrics.record_decision_transition("checking", "blocked");
        metrics.record_stale_result("probe");
        metrics.record_probe("absent");
        metrics.record_fallback_page();
        metrics.record_submission("created");
        metrics.record_apply_operation("update", "ok");
        metrics.observe_apply_duration(Duration::from_millis(12));
    }

    #[test]
    fn timing_guard_reports_on_drop() {
        let mut recorded = None;
        {
            let _guard = TimingGuard::new(|d| recorded = Some(d));
        }
        assert!(recorded.is_some());
    }

    #[test]
    fn time_apply_guard_drops_cleanly() {
        let guard = FlowMetrics::new().time_apply();
        assert!(guard.elapsed() <= Duration::from_secs(5));
    }
}
