//! In-memory order backend for testing and development.
//!
//! This module provides [`InMemoryOrderApi`], a thread-safe implementation of
//! the [`OrderApi`] trait.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence
//! - **Single-process only**: Orders are not visible across process boundaries
//! - **Totals are recomputed**: Every item mutation recomputes the parent's
//!   `totalAmount` from its items

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orderdesk_core::{
    DayClock, DecimalPolicy, ItemId, LineItem, OrderId, OrderSummary, UserId,
};

use super::{
    ExistenceQuery, ExistenceResponse, NewOrder, NewOrderLine, OrderApi, OrderListQuery,
    OrderListRow,
};
use crate::error::{Error, Result};
use crate::items::reconciler::ItemChanges;

/// An order held by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrder {
    /// Summary as returned by the probe.
    pub summary: OrderSummary,
    /// User the order was placed for.
    pub user_id: UserId,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Free-text note.
    pub observation: Option<String>,
    /// Line items.
    pub items: Vec<LineItem>,
}

impl StoredOrder {
    fn list_row(&self) -> OrderListRow {
        OrderListRow {
            id: self.summary.id,
            area_id: self.summary.area_id,
            user_id: self.user_id,
            status: self.summary.status,
            created_at: self.created_at,
            total_amount: self.summary.total_amount,
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    orders: BTreeMap<OrderId, StoredOrder>,
    item_parents: HashMap<ItemId, OrderId>,
    last_order_id: u64,
    last_item_id: u64,
}

impl BackendState {
    fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId::new(self.last_order_id)
    }

    fn next_item_id(&mut self) -> ItemId {
        self.last_item_id += 1;
        ItemId::new(self.last_item_id)
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut StoredOrder> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| Error::transport(format!("order {id} not found")))
    }

    fn parent_of(&self, item_id: ItemId) -> Result<OrderId> {
        self.item_parents
            .get(&item_id)
            .copied()
            .ok_or_else(|| Error::transport(format!("item {item_id} not found")))
    }

    fn add_item(&mut self, parent_id: OrderId, mut item: LineItem) -> Result<LineItem> {
        let id = match item.id {
            Some(id) => {
                self.last_item_id = self.last_item_id.max(id.get());
                id
            }
            None => self.next_item_id(),
        };
        item.id = Some(id);
        self.order_mut(parent_id)?.items.push(item.clone());
        self.item_parents.insert(id, parent_id);
        Ok(item)
    }
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("order backend lock poisoned")
}

/// In-memory order backend.
///
/// Existence is decided with the same [`DayClock`] the consolidation engine
/// uses, so "today" agrees between both sides.
///
/// ## Example
///
/// ```rust
/// use orderdesk_core::DayClock;
/// use orderdesk_flow::api::memory::InMemoryOrderApi;
///
/// let api = InMemoryOrderApi::new(DayClock::utc());
/// assert!(api.orders().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryOrderApi {
    clock: DayClock,
    policy: DecimalPolicy,
    state: RwLock<BackendState>,
}

impl Default for InMemoryOrderApi {
    fn default() -> Self {
        Self::new(DayClock::utc())
    }
}

impl InMemoryOrderApi {
    /// Creates an empty backend.
    #[must_use]
    pub fn new(clock: DayClock) -> Self {
        Self {
            clock,
            policy: DecimalPolicy::default(),
            state: RwLock::new(BackendState::default()),
        }
    }

    /// Sets the decimal policy used for totals.
    #[must_use]
    pub fn with_policy(mut self, policy: DecimalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the backend's day clock.
    #[must_use]
    pub const fn clock(&self) -> &DayClock {
        &self.clock
    }

    /// Seeds an order with an explicit creation instant.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_order(
        &self,
        user_id: UserId,
        summary: OrderSummary,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.last_order_id = state.last_order_id.max(summary.id.get());
        state.orders.insert(
            summary.id,
            StoredOrder {
                summary,
                user_id,
                created_at,
                observation: None,
                items: Vec::new(),
            },
        );
        Ok(())
    }

    /// Seeds an item under an existing order, assigning an identity if the
    /// item has none. The order total is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the lock is poisoned.
    pub fn insert_item(&self, parent_id: OrderId, item: LineItem) -> Result<LineItem> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.add_item(parent_id, item)
    }

    /// Returns an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn order(&self, id: OrderId) -> Result<Option<StoredOrder>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.orders.get(&id).cloned())
    }

    /// Returns every stored order, by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn orders(&self) -> Result<Vec<StoredOrder>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.orders.values().cloned().collect())
    }

    /// Returns the items of an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the lock is poisoned.
    pub fn items(&self, parent_id: OrderId) -> Result<Vec<LineItem>> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .orders
            .get(&parent_id)
            .map(|order| order.items.clone())
            .ok_or_else(|| Error::transport(format!("order {parent_id} not found")))
    }

    fn refresh_total(&self, order: &mut StoredOrder) -> Result<()> {
        order.summary.total_amount = self
            .policy
            .total(order.items.iter().map(|item| (item.quantity, item.unit_cost)))?;
        Ok(())
    }

    fn line_item(&self, line: &NewOrderLine) -> LineItem {
        LineItem::new(
            line.product_id,
            line.unit_measurement_id,
            self.policy.normalize(line.quantity),
            self.policy.normalize(line.price),
        )
    }
}

#[async_trait]
impl OrderApi for InMemoryOrderApi {
    async fn probe_existence(&self, query: &ExistenceQuery) -> Result<ExistenceResponse> {
        let state = self.state.read().map_err(poison_err)?;
        let latest = state
            .orders
            .values()
            .filter(|order| order.summary.area_id == query.area_id)
            .filter(|order| query.user_id.is_none_or(|user| order.user_id == user))
            .filter(|order| self.clock.day_of(order.created_at) == query.day)
            .max_by_key(|order| (order.created_at, order.summary.id));

        Ok(latest.map_or_else(ExistenceResponse::absent, |order| {
            ExistenceResponse::found(order.summary.clone())
        }))
    }

    async fn list_orders(&self, query: &OrderListQuery) -> Result<Vec<OrderListRow>> {
        if query.page == 0 {
            return Err(Error::transport("page numbers start at 1"));
        }
        let state = self.state.read().map_err(poison_err)?;
        let mut rows: Vec<OrderListRow> = state
            .orders
            .values()
            .filter(|order| order.summary.area_id == query.area_id)
            .filter(|order| query.user_id.is_none_or(|user| order.user_id == user))
            .map(StoredOrder::list_row)
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let limit = query.limit as usize;
        let skip = (query.page as usize - 1).saturating_mul(limit);
        Ok(rows.into_iter().skip(skip).take(limit).collect())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderSummary> {
        let mut state = self.state.write().map_err(poison_err)?;
        let id = state.next_order_id();
        let summary = OrderSummary {
            id,
            status: order.status,
            total_amount: self.policy.normalize(order.total_amount),
            area_id: order.area_id,
        };
        state.orders.insert(
            id,
            StoredOrder {
                summary: summary.clone(),
                user_id: order.user_id,
                created_at: Utc::now(),
                observation: order.observation.clone(),
                items: Vec::new(),
            },
        );
        for line in &order.items {
            state.add_item(id, self.line_item(line))?;
        }
        Ok(summary)
    }

    async fn append_order_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderLine],
    ) -> Result<OrderSummary> {
        let mut state = self.state.write().map_err(poison_err)?;
        let order = state.order_mut(order_id)?;
        if !order.summary.is_mergeable() {
            return Err(Error::transport(format!(
                "order {order_id} is {} and no longer accepts items",
                order.summary.status
            )));
        }
        for line in items {
            state.add_item(order_id, self.line_item(line))?;
        }
        let order = state.order_mut(order_id)?;
        self.refresh_total(order)?;
        Ok(order.summary.clone())
    }

    async fn create_item(&self, parent_id: OrderId, item: &LineItem) -> Result<LineItem> {
        let mut state = self.state.write().map_err(poison_err)?;
        let mut item = item.clone();
        item.id = None;
        let created = state.add_item(parent_id, item)?;
        self.refresh_total(state.order_mut(parent_id)?)?;
        Ok(created)
    }

    async fn update_item(&self, item_id: ItemId, changes: &ItemChanges) -> Result<LineItem> {
        let mut state = self.state.write().map_err(poison_err)?;
        let parent_id = state.parent_of(item_id)?;
        let order = state.order_mut(parent_id)?;
        let item = order
            .items
            .iter_mut()
            .find(|item| item.id == Some(item_id))
            .ok_or_else(|| Error::transport(format!("item {item_id} not found")))?;
        changes.apply(item);
        let updated = item.clone();
        self.refresh_total(order)?;
        Ok(updated)
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let parent_id = state.parent_of(item_id)?;
        let order = state.order_mut(parent_id)?;
        order.items.retain(|item| item.id != Some(item_id));
        self.refresh_total(order)?;
        state.item_parents.remove(&item_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orderdesk_core::{AreaId, CalendarDay, OrderStatus, ProductId, UnitId};
    use rust_decimal::Decimal;

    fn summary(id: u64, status: OrderStatus) -> OrderSummary {
        OrderSummary {
            id: OrderId::new(id),
            status,
            total_amount: Decimal::ZERO,
            area_id: AreaId::new(2),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
    }

    fn line(product: u64, quantity: i64) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new(product),
            quantity: Decimal::from(quantity),
            price: Decimal::new(250, 2),
            unit_measurement_id: UnitId::new(1),
        }
    }

    #[tokio::test]
    async fn probe_matches_area_user_and_day() {
        let api = InMemoryOrderApi::default();
        api.insert_order(UserId::new(5), summary(1, OrderStatus::Delivered), at(9))
            .unwrap();

        let query = ExistenceQuery {
            area_id: AreaId::new(2),
            day: CalendarDay::parse("2025-01-15").unwrap(),
            user_id: Some(UserId::new(5)),
        };
        let response = api.probe_existence(&query).await.unwrap();
        assert_eq!(response.order.unwrap().id, OrderId::new(1));

        let other_day = ExistenceQuery {
            day: CalendarDay::parse("2025-01-16").unwrap(),
            ..query.clone()
        };
        assert_eq!(
            api.probe_existence(&other_day).await.unwrap(),
            ExistenceResponse::absent()
        );

        let other_user = ExistenceQuery {
            user_id: Some(UserId::new(6)),
            ..query
        };
        assert!(!api.probe_existence(&other_user).await.unwrap().exists);
    }

    #[tokio::test]
    async fn list_orders_pages_most_recent_first() {
        let api = InMemoryOrderApi::default();
        for (id, hour) in [(1, 8), (2, 9), (3, 10)] {
            api.insert_order(UserId::new(5), summary(id, OrderStatus::Created), at(hour))
                .unwrap();
        }

        let mut query = OrderListQuery {
            user_id: Some(UserId::new(5)),
            area_id: AreaId::new(2),
            page: 1,
            limit: 2,
        };
        let first: Vec<_> = api.list_orders(&query).await.unwrap();
        assert_eq!(
            first.iter().map(|r| r.id.get()).collect::<Vec<_>>(),
            vec![3, 2]
        );

        query.page = 2;
        let second = api.list_orders(&query).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, OrderId::new(1));

        query.page = 0;
        assert!(matches!(
            api.list_orders(&query).await,
            Err(Error::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn append_requires_created_status() {
        let api = InMemoryOrderApi::default();
        api.insert_order(UserId::new(5), summary(1, OrderStatus::Created), at(9))
            .unwrap();
        api.insert_order(UserId::new(5), summary(2, OrderStatus::Confirmed), at(9))
            .unwrap();

        let merged = api
            .append_order_items(OrderId::new(1), &[line(9, 2)])
            .await
            .unwrap();
        assert_eq!(merged.total_amount, Decimal::new(500, 2));
        assert_eq!(api.items(OrderId::new(1)).unwrap().len(), 1);

        let err = api
            .append_order_items(OrderId::new(2), &[line(9, 2)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no longer accepts items"));
    }

    #[tokio::test]
    async fn item_crud_keeps_total_in_sync() {
        let api = InMemoryOrderApi::default();
        let created = api
            .create_order(&NewOrder {
                user_id: UserId::new(5),
                area_id: AreaId::new(2),
                total_amount: Decimal::new(500, 2),
                status: OrderStatus::Created,
                observation: None,
                items: vec![line(9, 2)],
            })
            .await
            .unwrap();

        let item = api
            .create_item(
                created.id,
                &LineItem::new(ProductId::new(4), UnitId::new(1), Decimal::ONE, Decimal::TEN),
            )
            .await
            .unwrap();
        let id = item.id.unwrap();

        let changes = ItemChanges {
            quantity: Some(Decimal::from(3)),
            ..ItemChanges::default()
        };
        let updated = api.update_item(id, &changes).await.unwrap();
        assert_eq!(updated.quantity, Decimal::from(3));
        let order = api.order(created.id).unwrap().unwrap();
        assert_eq!(order.summary.total_amount, Decimal::new(3500, 2));

        api.delete_item(id).await.unwrap();
        assert_eq!(api.items(created.id).unwrap().len(), 1);
        assert!(api.delete_item(id).await.is_err());
    }
}
