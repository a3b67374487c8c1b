//! Observability infrastructure for orderdesk.
//!
//! Structured logging with consistent spans: every consolidation span carries
//! the user, area and day it is deciding for, every reconciliation span the
//! parent collection it edits.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::order::OrderKey;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops. Logs go to stderr.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `orderdesk_flow=debug`)
///
/// # Example
///
/// ```rust
/// use orderdesk_core::observability::{LogFormat, init_logging};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // A host application may already own the global subscriber.
        let _ = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
        };
    });
}

/// Creates a span for consolidation operations on one order key.
///
/// # Example
///
/// ```rust
/// use orderdesk_core::observability::consolidation_span;
/// use orderdesk_core::prelude::*;
///
/// let key = OrderKey::new(UserId::new(5), AreaId::new(2), DayClock::utc().today());
/// let span = consolidation_span("submit", &key);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn consolidation_span(operation: &str, key: &OrderKey) -> Span {
    tracing::info_span!(
        "consolidation",
        op = operation,
        user_id = %key.user_id,
        area_id = %key.area_id,
        day = %key.day,
    )
}

/// Creates a span for item reconciliation against one parent collection.
#[must_use]
pub fn reconcile_span(operation: &str, parent_id: u64) -> Span {
    tracing::info_span!("reconcile", op = operation, parent_id = parent_id)
}
