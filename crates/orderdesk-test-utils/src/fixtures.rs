//! Pre-built test fixtures for common test scenarios.
//!
//! Provides factory functions to create test data with sensible defaults.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use orderdesk_core::{
    AreaId, CalendarDay, CoreConfig, ItemId, LineItem, OrderId, OrderKey, OrderStatus,
    OrderSummary, ProductId, UnitId, UserId,
};
use orderdesk_flow::consolidation::engine::ConsolidationEngine;
use orderdesk_flow::consolidation::ledger::SessionLedger;
use orderdesk_flow::consolidation::submitter::{Cart, CartLine};
use orderdesk_flow::items::applier::ItemApplier;

use crate::scripted::ScriptedOrderApi;

/// Test context with a scripted backend, a session ledger and configuration.
pub struct TestContext {
    /// Shared scripted backend.
    pub api: Arc<ScriptedOrderApi>,
    /// Session ledger shared by engines built from this context.
    pub ledger: SessionLedger,
    /// Configuration used to build engines.
    pub config: CoreConfig,
}

impl TestContext {
    /// Creates a context deciding days in UTC.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    /// Creates a context deciding days in `timezone`.
    #[must_use]
    pub fn with_timezone(timezone: &str) -> Self {
        Self::with_config(CoreConfig {
            timezone: timezone.to_string(),
            ..CoreConfig::default()
        })
    }

    /// Creates a context from `config`. The backend shares the configured clock.
    #[must_use]
    pub fn with_config(config: CoreConfig) -> Self {
        let clock = config.day_clock().expect("valid timezone");
        Self {
            api: Arc::new(ScriptedOrderApi::with_clock(clock)),
            ledger: SessionLedger::new(),
            config,
        }
    }

    /// Builds an engine over the context's backend and ledger.
    #[must_use]
    pub fn engine(&self) -> ConsolidationEngine {
        ConsolidationEngine::new(self.api.clone(), &self.config, self.ledger.clone())
            .expect("valid config")
    }

    /// Builds an applier running at most `max_in_flight` calls at once.
    #[must_use]
    pub fn applier(&self, max_in_flight: usize) -> ItemApplier {
        ItemApplier::new(self.api.clone(), max_in_flight)
    }

    /// Returns today's key for `user` and `area` under the context's clock.
    #[must_use]
    pub fn today_key(&self, user: u64, area: u64) -> OrderKey {
        let clock = self.config.day_clock().expect("valid timezone");
        OrderKey::new(UserId::new(user), AreaId::new(area), clock.today())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a canonical day.
#[must_use]
pub fn day(value: &str) -> CalendarDay {
    CalendarDay::parse(value).expect("valid day")
}

/// Creates a key from raw IDs and a `YYYY-MM-DD` day.
#[must_use]
pub fn key(user: u64, area: u64, on: &str) -> OrderKey {
    OrderKey::new(UserId::new(user), AreaId::new(area), day(on))
}

/// Creates a UTC instant.
#[must_use]
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

/// Creates an order summary with a zero total.
#[must_use]
pub fn summary(id: u64, status: OrderStatus, area: u64) -> OrderSummary {
    OrderSummary {
        id: OrderId::new(id),
        status,
        total_amount: Decimal::ZERO,
        area_id: AreaId::new(area),
    }
}

/// Creates a draft line item with unit 1 and cost 10.
#[must_use]
pub fn draft_item(product: u64, quantity: i64) -> LineItem {
    LineItem::new(
        ProductId::new(product),
        UnitId::new(1),
        Decimal::from(quantity),
        Decimal::TEN,
    )
}

/// Creates a persisted line item with unit 1 and cost 10.
#[must_use]
pub fn persisted_item(id: u64, product: u64, quantity: i64) -> LineItem {
    draft_item(product, quantity).with_id(ItemId::new(id))
}

/// Creates a cart line with unit 1.
#[must_use]
pub fn cart_line(product: u64, quantity: i64, unit_cost: i64) -> CartLine {
    CartLine::new(
        ProductId::new(product),
        UnitId::new(1),
        Decimal::from(quantity),
        Decimal::from(unit_cost),
    )
}

/// Creates a cart from `(product, quantity)` pairs, each costing 10 per unit.
#[must_use]
pub fn cart(lines: &[(u64, i64)]) -> Cart {
    lines
        .iter()
        .map(|&(product, quantity)| cart_line(product, quantity, 10))
        .collect()
}
