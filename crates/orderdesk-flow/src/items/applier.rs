//! Applies a [`ReconciliationDelta`] against the backend.
//!
//! Creates, updates and deletes have no ordering dependency on each other and
//! run as one bounded stream of concurrent operations. A failed operation
//! never cancels the others; every outcome lands in an [`ApplyReport`].

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use orderdesk_core::{CoreConfig, ItemId, LineItem, OrderId, ProductId};

use crate::api::OrderApi;
use crate::error::{Error, Result};
use crate::items::reconciler::{ItemChanges, ReconciliationDelta};
use crate::metrics::FlowMetrics;

/// The item an operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ItemTarget {
    /// An unsaved row, by its position in `creates`.
    Create {
        /// Position in the delta's `creates`.
        index: usize,
        /// Product on the row, for display.
        product_id: ProductId,
    },
    /// An update of an existing row.
    Update {
        /// The row.
        id: ItemId,
    },
    /// A deletion of an existing row.
    Delete {
        /// The row.
        id: ItemId,
    },
}

impl ItemTarget {
    /// Returns the delta bucket the target belongs to.
    #[must_use]
    pub const fn bucket(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for ItemTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { index, product_id } => {
                write!(f, "create #{index} (product {product_id})")
            }
            Self::Update { id } => write!(f, "update item {id}"),
            Self::Delete { id } => write!(f, "delete item {id}"),
        }
    }
}

/// One failed item operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    /// The operation that failed.
    pub target: ItemTarget,
    /// Backend error message.
    pub message: String,
}

/// Outcome of applying a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Rows created, as returned by the backend, in `creates` order.
    pub created: Vec<LineItem>,
    /// Rows updated, as returned by the backend, in `updates` order.
    pub updated: Vec<LineItem>,
    /// Rows deleted, in `deletes` order.
    pub deleted: Vec<ItemId>,
    /// Operations that failed and still need a manual retry.
    pub failures: Vec<OperationFailure>,
}

impl ApplyReport {
    /// Returns true if every operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of operations that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Existing rows still out of sync with the draft.
    #[must_use]
    pub fn pending_identities(&self) -> Vec<ItemId> {
        self.failures
            .iter()
            .filter_map(|failure| match failure.target {
                ItemTarget::Update { id } | ItemTarget::Delete { id } => Some(id),
                ItemTarget::Create { .. } => None,
            })
            .collect()
    }

    /// Positions in `creates` of rows that were not saved.
    #[must_use]
    pub fn pending_creates(&self) -> Vec<usize> {
        self.failures
            .iter()
            .filter_map(|failure| match failure.target {
                ItemTarget::Create { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }
}

enum Operation<'a> {
    Create(usize, &'a LineItem),
    Update(ItemId, &'a ItemChanges),
    Delete(ItemId),
}

impl Operation<'_> {
    fn target(&self) -> ItemTarget {
        match self {
            Self::Create(index, item) => ItemTarget::Create {
                index: *index,
                product_id: item.product_id,
            },
            Self::Update(id, _) => ItemTarget::Update { id: *id },
            Self::Delete(id) => ItemTarget::Delete { id: *id },
        }
    }
}

enum Completed {
    Created(LineItem),
    Updated(LineItem),
    Deleted(ItemId),
}

/// Executes reconciliation deltas with bounded concurrency.
#[derive(Clone)]
pub struct ItemApplier {
    api: Arc<dyn OrderApi>,
    max_in_flight: usize,
    metrics: FlowMetrics,
}

impl fmt::Debug for ItemApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemApplier")
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

impl ItemApplier {
    /// Creates an applier with at most `max_in_flight` concurrent operations.
    ///
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>, max_in_flight: usize) -> Self {
        Self {
            api,
            max_in_flight: max_in_flight.max(1),
            metrics: FlowMetrics::new(),
        }
    }

    /// Creates an applier using the configured concurrency limit.
    #[must_use]
    pub fn from_config(api: Arc<dyn OrderApi>, config: &CoreConfig) -> Self {
        Self::new(api, config.apply_max_in_flight)
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub const fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Applies every operation of `delta` to the collection owned by `parent_id`.
    ///
    /// Always runs every operation; failures are collected in the report.
    #[tracing::instrument(
        skip(self, delta),
        fields(
            parent_id = %parent_id,
            creates = delta.creates.len(),
            updates = delta.updates.len(),
            deletes = delta.deletes.len(),
        )
    )]
    pub async fn apply(&self, parent_id: OrderId, delta: &ReconciliationDelta) -> ApplyReport {
        let _timer = self.metrics.time_apply();

        let operations = delta
            .creates
            .iter()
            .enumerate()
            .map(|(index, item)| Operation::Create(index, item))
            .chain(
                delta
                    .updates
                    .iter()
                    .map(|update| Operation::Update(update.id, &update.changes)),
            )
            .chain(delta.deletes.iter().map(|id| Operation::Delete(*id)));

        let mut outcomes: Vec<(usize, std::result::Result<Completed, OperationFailure>)> =
            stream::iter(
                operations
                    .enumerate()
                    .map(|(seq, op)| async move { (seq, self.run(parent_id, op).await) }),
            )
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;
        outcomes.sort_by_key(|(seq, _)| *seq);

        let mut report = ApplyReport::default();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(Completed::Created(item)) => report.created.push(item),
                Ok(Completed::Updated(item)) => report.updated.push(item),
                Ok(Completed::Deleted(id)) => report.deleted.push(id),
                Err(failure) => report.failures.push(failure),
            }
        }

        if report.is_success() {
            tracing::info!(applied = report.succeeded(), "delta applied");
        } else {
            tracing::warn!(
                applied = report.succeeded(),
                failed = report.failures.len(),
                "delta partially applied"
            );
        }
        report
    }

    /// Like [`ItemApplier::apply`], but turns any failure into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialApply`] carrying the full report when at least
    /// one operation failed.
    pub async fn apply_checked(
        &self,
        parent_id: OrderId,
        delta: &ReconciliationDelta,
    ) -> Result<ApplyReport> {
        let report = self.apply(parent_id, delta).await;
        if report.is_success() {
            Ok(report)
        } else {
            Err(Error::PartialApply(Box::new(report)))
        }
    }

    async fn run(
        &self,
        parent_id: OrderId,
        op: Operation<'_>,
    ) -> std::result::Result<Completed, OperationFailure> {
        let target = op.target();
        let result = match op {
            Operation::Create(_, item) => self
                .api
                .create_item(parent_id, item)
                .await
                .map(Completed::Created),
            Operation::Update(id, changes) => self
                .api
                .update_item(id, changes)
                .await
                .map(Completed::Updated),
            Operation::Delete(id) => self
                .api
                .delete_item(id)
                .await
                .map(|()| Completed::Deleted(id)),
        };

        match result {
            Ok(completed) => {
                self.metrics.record_apply_operation(target.bucket(), "ok");
                Ok(completed)
            }
            Err(err) => {
                self.metrics.record_apply_operation(target.bucket(), "failed");
                tracing::warn!(%target, error = %err, "item operation failed");
                Err(OperationFailure {
                    target,
                    message: err.to_string(),
                })
            }
        }
    }
}
