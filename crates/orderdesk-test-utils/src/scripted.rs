//! Scripted order backend with operation tracing.
//!
//! Wraps [`InMemoryOrderApi`] and records every call for test assertions.
//! Failures can be injected per operation or per entity, probe answers can be
//! scripted, and single calls can be held until the test releases them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use orderdesk_core::{DayClock, ItemId, LineItem, OrderId, OrderSummary, ProductId};
use orderdesk_flow::api::memory::InMemoryOrderApi;
use orderdesk_flow::api::{
    ExistenceQuery, ExistenceResponse, NewOrder, NewOrderLine, OrderApi, OrderListQuery,
    OrderListRow,
};
use orderdesk_flow::error::{Error, Result};
use orderdesk_flow::items::reconciler::ItemChanges;

/// Backend operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    /// `probe_existence`.
    ProbeExistence,
    /// `list_orders`.
    ListOrders,
    /// `create_order`.
    CreateOrder,
    /// `append_order_items`.
    AppendOrderItems,
    /// `create_item`.
    CreateItem,
    /// `update_item`.
    UpdateItem,
    /// `delete_item`.
    DeleteItem,
}

/// Record of a backend call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// Existence probe.
    ProbeExistence(ExistenceQuery),
    /// Listing page.
    ListOrders(OrderListQuery),
    /// Order creation.
    CreateOrder(NewOrder),
    /// Merge into an existing order.
    AppendOrderItems {
        /// Target order.
        order_id: OrderId,
        /// Lines appended.
        items: Vec<NewOrderLine>,
    },
    /// Item creation.
    CreateItem {
        /// Parent order.
        parent_id: OrderId,
        /// Item sent.
        item: LineItem,
    },
    /// Item update.
    UpdateItem {
        /// Item updated.
        item_id: ItemId,
        /// Fields sent.
        changes: ItemChanges,
    },
    /// Item deletion.
    DeleteItem(ItemId),
}

impl ApiCall {
    /// Returns the operation kind.
    pub const fn op(&self) -> ApiOp {
        match self {
            Self::ProbeExistence(_) => ApiOp::ProbeExistence,
            Self::ListOrders(_) => ApiOp::ListOrders,
            Self::CreateOrder(_) => ApiOp::CreateOrder,
            Self::AppendOrderItems { .. } => ApiOp::AppendOrderItems,
            Self::CreateItem { .. } => ApiOp::CreateItem,
            Self::UpdateItem { .. } => ApiOp::UpdateItem,
            Self::DeleteItem(_) => ApiOp::DeleteItem,
        }
    }
}

/// A call held by [`ScriptedOrderApi::hold_next`].
#[derive(Debug)]
pub struct HeldCall {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl HeldCall {
    /// Waits until the held call has been issued.
    pub async fn reached(&mut self) {
        let _ = (&mut self.reached).await;
    }

    /// Lets the held call continue.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Debug, Default)]
struct Failures {
    once: Vec<ApiOp>,
    always: Vec<ApiOp>,
    items: Vec<ItemId>,
    products: Vec<ProductId>,
}

type Gate = (oneshot::Sender<()>, oneshot::Receiver<()>);

/// In-memory order backend with failure injection and operation tracing.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOrderApi {
    inner: Arc<InMemoryOrderApi>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
    failures: Arc<Mutex<Failures>>,
    probe_script: Arc<Mutex<VecDeque<ExistenceResponse>>>,
    holds: Arc<Mutex<HashMap<ApiOp, VecDeque<Gate>>>>,
    in_flight: Arc<Mutex<(usize, usize)>>,
    latency: Option<Duration>,
}

impl ScriptedOrderApi {
    /// Creates an empty backend deciding days in UTC.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend deciding days with `clock`.
    #[must_use]
    pub fn with_clock(clock: DayClock) -> Self {
        Self {
            inner: Arc::new(InMemoryOrderApi::new(clock)),
            ..Self::default()
        }
    }

    /// Adds simulated latency to every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns the wrapped backend, for seeding and inspecting state.
    #[must_use]
    pub fn backend(&self) -> &InMemoryOrderApi {
        &self.inner
    }

    /// Seeds an order created at `created_at`.
    pub fn seed_order(
        &self,
        user_id: orderdesk_core::UserId,
        summary: OrderSummary,
        created_at: chrono::DateTime<chrono::Utc>,
    ) {
        self.inner
            .insert_order(user_id, summary, created_at)
            .expect("seed order");
    }

    /// Seeds an item under an existing order and returns it with its identity.
    pub fn seed_item(&self, parent_id: OrderId, item: LineItem) -> LineItem {
        self.inner.insert_item(parent_id, item).expect("seed item")
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("lock").clone()
    }

    /// Returns the number of recorded calls of one kind.
    #[must_use]
    pub fn count(&self, op: ApiOp) -> usize {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Clears recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().expect("lock").clear();
    }

    /// Fails the next call of `op` with a transport error.
    pub fn fail_next(&self, op: ApiOp) {
        self.failures.lock().expect("lock").once.push(op);
    }

    /// Fails every call of `op` with a transport error.
    pub fn fail_always(&self, op: ApiOp) {
        self.failures.lock().expect("lock").always.push(op);
    }

    /// Fails every update or delete of `item_id`.
    pub fn fail_item(&self, item_id: ItemId) {
        self.failures.lock().expect("lock").items.push(item_id);
    }

    /// Fails every item creation for `product_id`.
    pub fn fail_product(&self, product_id: ProductId) {
        self.failures.lock().expect("lock").products.push(product_id);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        *self.failures.lock().expect("lock") = Failures::default();
    }

    /// Answers the next probe with `response` instead of the backend state.
    ///
    /// Scripted answers are consumed in order.
    pub fn script_probe(&self, response: ExistenceResponse) {
        self.probe_script.lock().expect("lock").push_back(response);
    }

    /// Holds the next call of `op` until [`HeldCall::release`].
    ///
    /// The call is recorded before it blocks. Injected failures apply after
    /// release.
    pub fn hold_next(&self, op: ApiOp) -> HeldCall {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.holds
            .lock()
            .expect("lock")
            .entry(op)
            .or_default()
            .push_back((reached_tx, release_rx));
        HeldCall {
            reached: reached_rx,
            release: release_tx,
        }
    }

    /// Returns the largest number of calls observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.lock().expect("lock").1
    }

    async fn enter(&self, call: ApiCall, item: Option<ItemId>, product: Option<ProductId>) -> Result<()> {
        let op = call.op();
        let gate = {
            self.calls.lock().expect("lock").push(call);
            self.holds
                .lock()
                .expect("lock")
                .get_mut(&op)
                .and_then(VecDeque::pop_front)
        };
        {
            let mut in_flight = self.in_flight.lock().expect("lock");
            in_flight.0 += 1;
            in_flight.1 = in_flight.1.max(in_flight.0);
        }

        if let Some((reached, release)) = gate {
            let _ = reached.send(());
            let _ = release.await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.lock().expect("lock").0 -= 1;
        self.check_failure(op, item, product)
    }

    fn check_failure(&self, op: ApiOp, item: Option<ItemId>, product: Option<ProductId>) -> Result<()> {
        let mut failures = self.failures.lock().expect("lock");
        let once = failures.once.iter().position(|o| *o == op);
        let injected = once.is_some()
            || failures.always.contains(&op)
            || item.is_some_and(|id| failures.items.contains(&id))
            || product.is_some_and(|id| failures.products.contains(&id));
        if let Some(index) = once {
            failures.once.remove(index);
        }
        if injected {
            return Err(Error::transport(format!("injected failure for {op:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderApi for ScriptedOrderApi {
    async fn probe_existence(&self, query: &ExistenceQuery) -> Result<ExistenceResponse> {
        self.enter(ApiCall::ProbeExistence(query.clone()), None, None)
            .await?;
        let scripted = self.probe_script.lock().expect("lock").pop_front();
        match scripted {
            Some(response) => Ok(response),
            None => self.inner.probe_existence(query).await,
        }
    }

    async fn list_orders(&self, query: &OrderListQuery) -> Result<Vec<OrderListRow>> {
        self.enter(ApiCall::ListOrders(query.clone()), None, None)
            .await?;
        self.inner.list_orders(query).await
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderSummary> {
        self.enter(ApiCall::CreateOrder(order.clone()), None, None)
            .await?;
        self.inner.create_order(order).await
    }

    async fn append_order_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderLine],
    ) -> Result<OrderSummary> {
        self.enter(
            ApiCall::AppendOrderItems {
                order_id,
                items: items.to_vec(),
            },
            None,
            None,
        )
        .await?;
        self.inner.append_order_items(order_id, items).await
    }

    async fn create_item(&self, parent_id: OrderId, item: &LineItem) -> Result<LineItem> {
        self.enter(
            ApiCall::CreateItem {
                parent_id,
                item: item.clone(),
            },
            None,
            Some(item.product_id),
        )
        .await?;
        self.inner.create_item(parent_id, item).await
    }

    async fn update_item(&self, item_id: ItemId, changes: &ItemChanges) -> Result<LineItem> {
        self.enter(
            ApiCall::UpdateItem {
                item_id,
                changes: changes.clone(),
            },
            Some(item_id),
            None,
        )
        .await?;
        self.inner.update_item(item_id, changes).await
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        self.enter(ApiCall::DeleteItem(item_id), Some(item_id), None)
            .await?;
        self.inner.delete_item(item_id).await
    }
}
