//! Fallback scan of the recent order listing.
//!
//! Runs when the probe reported no order or could not be reached. It pages
//! through the listing for the key's user and area, converts every row's
//! `createdAt` into a canonical day with the same [`DayClock`] the rest of
//! the engine uses, and keeps the most recently created row whose day equals
//! the key's day.

use std::fmt;
use std::sync::Arc;

use orderdesk_core::{CoreConfig, DayClock, OrderKey, OrderSummary};

use crate::api::{OrderApi, OrderListQuery, OrderListRow};
use crate::metrics::FlowMetrics;

/// What the fallback scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// A row for the key's day.
    Found(OrderSummary),
    /// Every scanned page was read and none matched.
    NotFound,
    /// The listing could not be read.
    Failed {
        /// Error message, for logs.
        message: String,
    },
}

impl FallbackOutcome {
    /// Returns a short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Picks the most recently created row matching `key`, ties broken by the
/// larger ID.
#[must_use]
pub fn select_latest<'a>(
    rows: impl IntoIterator<Item = &'a OrderListRow>,
    key: &OrderKey,
    clock: &DayClock,
) -> Option<&'a OrderListRow> {
    rows.into_iter()
        .filter(|row| row.user_id == key.user_id && row.area_id == key.area_id)
        .filter(|row| clock.day_of(row.created_at).as_str() == key.day.as_str())
        .max_by_key(|row| (row.created_at, row.id))
}

/// Scans the order listing for an order on the key's day.
#[derive(Clone)]
pub struct FallbackScanner {
    api: Arc<dyn OrderApi>,
    clock: DayClock,
    page_limit: u32,
    max_pages: u32,
    metrics: FlowMetrics,
}

impl fmt::Debug for FallbackScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackScanner")
            .field("clock", &self.clock)
            .field("page_limit", &self.page_limit)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl FallbackScanner {
    /// Creates a scanner reading at most `max_pages` pages of `page_limit` rows.
    ///
    /// Zero limits are treated as one.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>, clock: DayClock, page_limit: u32, max_pages: u32) -> Self {
        Self {
            api,
            clock,
            page_limit: page_limit.max(1),
            max_pages: max_pages.max(1),
            metrics: FlowMetrics::new(),
        }
    }

    /// Creates a scanner from configuration, sharing `clock` with the probe.
    #[must_use]
    pub fn from_config(api: Arc<dyn OrderApi>, clock: DayClock, config: &CoreConfig) -> Self {
        Self::new(
            api,
            clock,
            config.fallback_page_limit,
            config.fallback_max_pages,
        )
    }

    /// Scans the listing for `key`. Never fails.
    ///
    /// Stops at the first short page or after `max_pages` pages. If a later
    /// page fails after an earlier page already matched, the match is kept.
    #[tracing::instrument(
        skip(self),
        fields(user_id = %key.user_id, area_id = %key.area_id, day = %key.day)
    )]
    pub async fn scan(&self, key: &OrderKey) -> FallbackOutcome {
        let mut best: Option<OrderListRow> = None;

        for page in 1..=self.max_pages {
            let query = OrderListQuery {
                user_id: Some(key.user_id),
                area_id: key.area_id,
                page,
                limit: self.page_limit,
            };
            let rows = match self.api.list_orders(&query).await {
                Ok(rows) => rows,
                Err(err) => {
                    tracing::warn!(page, error = %err, "order listing failed");
                    return match best {
                        Some(row) => FallbackOutcome::Found(row.summary()),
                        None => FallbackOutcome::Failed {
                            message: err.to_string(),
                        },
                    };
                }
            };
            self.metrics.record_fallback_page();

            let candidate = select_latest(best.iter().chain(rows.iter()), key, &self.clock);
            best = candidate.cloned();

            if rows.len() < self.page_limit as usize {
                break;
            }
        }

        match best {
            Some(row) => {
                tracing::info!(order_id = %row.id, status = %row.status, "fallback matched order");
                FallbackOutcome::Found(row.summary())
            }
            None => FallbackOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use orderdesk_core::{AreaId, CalendarDay, OrderId, OrderStatus, UserId};
    use rust_decimal::Decimal;

    fn row(id: u64, user: u64, area: u64, created_at: DateTime<Utc>) -> OrderListRow {
        OrderListRow {
            id: OrderId::new(id),
            area_id: AreaId::new(area),
            user_id: UserId::new(user),
            status: OrderStatus::Created,
            created_at,
            total_amount: Decimal::ZERO,
        }
    }

    fn key(day: &str) -> OrderKey {
        OrderKey::new(UserId::new(5), AreaId::new(2), CalendarDay::parse(day).unwrap())
    }

    #[test]
    fn latest_match_wins_with_id_tiebreak() {
        let morning = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let rows = vec![
            row(1, 5, 2, morning),
            row(3, 5, 2, noon),
            row(2, 5, 2, noon),
            row(9, 6, 2, noon),
            row(8, 5, 7, noon),
        ];

        let picked = select_latest(&rows, &key("2025-01-15"), &DayClock::utc()).unwrap();
        assert_eq!(picked.id, OrderId::new(3));
    }

    #[test]
    fn other_days_do_not_match() {
        let yesterday = Utc.with_ymd_and_hms(2025, 1, 14, 23, 59, 0).unwrap();
        let rows = vec![row(1, 5, 2, yesterday)];
        assert!(select_latest(&rows, &key("2025-01-15"), &DayClock::utc()).is_none());
    }

    #[test]
    fn canonical_day_uses_configured_zone() {
        // 23:30 in Lima on the 15th is 04:30 UTC on the 16th.
        let late = Utc.with_ymd_and_hms(2025, 1, 16, 4, 30, 0).unwrap();
        let rows = vec![row(1, 5, 2, late)];
        let lima = DayClock::from_name("America/Lima").unwrap();

        assert!(select_latest(&rows, &key("2025-01-15"), &lima).is_some());
        assert!(select_latest(&rows, &key("2025-01-16"), &lima).is_none());
        assert!(select_latest(&rows, &key("2025-01-16"), &DayClock::utc()).is_some());
    }
}
