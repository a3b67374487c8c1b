//! Backend contract for orders and line items.
//!
//! This module provides:
//!
//! - [`OrderApi`]: Trait every backend adapter implements
//! - Wire types for the existence probe, the order listing and order creation
//! - [`memory::InMemoryOrderApi`]: In-memory backend for tests and development
//!
//! Every operation fails with [`Error::Transport`](crate::error::Error::Transport)
//! on network or server errors. Callers never inspect HTTP status codes.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderdesk_core::{
    AreaId, CalendarDay, ExistenceSignal, ItemId, LineItem, OrderId, OrderStatus, OrderSummary,
    ProductId, UnitId, UserId,
};

use crate::error::Result;
use crate::items::reconciler::ItemChanges;

/// Query for the existence probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistenceQuery {
    /// Area to look in.
    pub area_id: AreaId,
    /// Canonical day to look at.
    pub day: CalendarDay,
    /// Restricts the lookup to one user when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Existence probe payload: `{exists, order?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceResponse {
    /// Whether the backend reports an order for the query.
    pub exists: bool,
    /// The order, when the backend attaches one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSummary>,
}

impl ExistenceResponse {
    /// A response reporting no order.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            exists: false,
            order: None,
        }
    }

    /// A response reporting the given order.
    #[must_use]
    pub const fn found(order: OrderSummary) -> Self {
        Self {
            exists: true,
            order: Some(order),
        }
    }

    /// A response claiming an order exists without describing it.
    #[must_use]
    pub const fn ambiguous() -> Self {
        Self {
            exists: true,
            order: None,
        }
    }

    /// Folds the payload into an [`ExistenceSignal`].
    #[must_use]
    pub fn into_signal(self) -> ExistenceSignal {
        ExistenceSignal::from_wire(self.exists, self.order)
    }
}

/// Query for one page of the recent order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    /// Restricts the listing to one user when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Area to list.
    pub area_id: AreaId,
    /// Page number, starting at 1.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

/// One row of the order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListRow {
    /// Order ID.
    pub id: OrderId,
    /// Area the order belongs to.
    pub area_id: AreaId,
    /// User the order was placed for.
    pub user_id: UserId,
    /// Current status.
    pub status: OrderStatus,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Order total.
    pub total_amount: Decimal,
}

impl OrderListRow {
    /// Returns the order summary carried by this row.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id,
            status: self.status,
            total_amount: self.total_amount,
            area_id: self.area_id,
        }
    }
}

/// One line of an order being created or extended.
///
/// Field names follow the order-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    /// Product ordered.
    pub product_id: ProductId,
    /// Quantity ordered.
    pub quantity: Decimal,
    /// Cost per unit.
    pub price: Decimal,
    /// Unit of measurement.
    pub unit_measurement_id: UnitId,
}

/// Payload for creating an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// User the order is placed for.
    pub user_id: UserId,
    /// Area the order is placed in.
    pub area_id: AreaId,
    /// Order total.
    pub total_amount: Decimal,
    /// Initial status, always `created`.
    pub status: OrderStatus,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// Order lines.
    pub items: Vec<NewOrderLine>,
}

/// Backend operations the consolidation and reconciliation paths depend on.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Asks whether an order exists for an area and day.
    async fn probe_existence(&self, query: &ExistenceQuery) -> Result<ExistenceResponse>;

    /// Lists recent orders, most recent first.
    async fn list_orders(&self, query: &OrderListQuery) -> Result<Vec<OrderListRow>>;

    /// Creates an order.
    async fn create_order(&self, order: &NewOrder) -> Result<OrderSummary>;

    /// Appends lines to an open order.
    async fn append_order_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderLine],
    ) -> Result<OrderSummary>;

    /// Creates one item in a parent collection.
    async fn create_item(&self, parent_id: OrderId, item: &LineItem) -> Result<LineItem>;

    /// Updates the given fields of an item.
    async fn update_item(&self, item_id: ItemId, changes: &ItemChanges) -> Result<LineItem>;

    /// Deletes an item.
    async fn delete_item(&self, item_id: ItemId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_response_decodes_bare_flag() {
        let response: ExistenceResponse = serde_json::from_str(r#"{"exists":true}"#).unwrap();
        assert_eq!(response.into_signal(), ExistenceSignal::Confirmed(None));

        let response: ExistenceResponse = serde_json::from_str(r#"{"exists":false}"#).unwrap();
        assert_eq!(response.into_signal(), ExistenceSignal::Absent);
    }

    #[test]
    fn existence_response_decodes_attached_order() {
        let json = r#"{"exists":true,"order":{"id":8,"status":"process","totalAmount":"40","areaId":2}}"#;
        let response: ExistenceResponse = serde_json::from_str(json).unwrap();
        let signal = response.into_signal();
        let summary = signal.summary().unwrap();
        assert_eq!(summary.id, OrderId::new(8));
        assert_eq!(summary.status, OrderStatus::Process);
    }

    #[test]
    fn new_order_uses_endpoint_field_names() {
        let order = NewOrder {
            user_id: UserId::new(5),
            area_id: AreaId::new(2),
            total_amount: Decimal::new(1000, 2),
            status: OrderStatus::Created,
            observation: None,
            items: vec![NewOrderLine {
                product_id: ProductId::new(9),
                quantity: Decimal::ONE,
                price: Decimal::TEN,
                unit_measurement_id: UnitId::new(1),
            }],
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["items"][0]["unitMeasurementId"], 1);
        assert!(json.get("observation").is_none());
    }

    #[test]
    fn list_row_summary_copies_fields() {
        let json = r#"{"id":3,"areaId":2,"userId":5,"status":"delivered","createdAt":"2025-01-15T10:00:00Z","totalAmount":12}"#;
        let row: OrderListRow = serde_json::from_str(json).unwrap();
        let summary = row.summary();
        assert_eq!(summary.id, OrderId::new(3));
        assert_eq!(summary.status, OrderStatus::Delivered);
        assert_eq!(summary.total_amount, Decimal::from(12));
    }
}
