//! Minimal create/update/delete deltas between an item snapshot and a draft.
//!
//! The snapshot is the item collection as last fetched from the server; the
//! draft is the same collection after local edits. Rows carrying an identity
//! are matched by it, rows without one are new.
//!
//! Numeric fields are compared through a [`DecimalPolicy`] so that `"1"`,
//! `1` and `1.004` (at scale 2) are the same quantity, and descriptions are
//! compared after trimming with blank text meaning "no description".

use std::collections::{HashMap, HashSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use orderdesk_core::{DecimalPolicy, ItemId, LineItem, ProductId, UnitId};

/// Errors that prevent a draft from being reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The draft references an identity the snapshot does not contain.
    ///
    /// Usually a row that was removed elsewhere after the snapshot was taken.
    #[error("item {id} is not part of the snapshot")]
    UnknownIdentity {
        /// The unmatched identity.
        id: ItemId,
    },

    /// The same identity appears twice in the draft or in the snapshot.
    #[error("item {id} appears more than once")]
    DuplicateIdentity {
        /// The repeated identity.
        id: ItemId,
    },

    /// A snapshot row has no server identity.
    #[error("snapshot row {index} has no identity")]
    MissingIdentity {
        /// Position of the row in the snapshot.
        index: usize,
    },
}

/// A field of a line item that an update can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    /// The product.
    ProductId,
    /// The unit of measurement.
    UnitId,
    /// The quantity.
    Quantity,
    /// The cost per unit.
    UnitCost,
    /// The free-text note.
    Description,
}

impl ItemField {
    /// Returns the wire name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProductId => "productId",
            Self::UnitId => "unitId",
            Self::Quantity => "quantity",
            Self::UnitCost => "unitCost",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changed fields of one item. Unset fields are left untouched.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemChanges {
    /// New product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    /// New unit of measurement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<UnitId>,
    /// New quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// New cost per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    /// New description.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deser_present"
    )]
    pub description: Option<Option<String>>,
}

/// Maps a present field to `Some`, so an explicit `null` stays distinct
/// from a missing field.
fn deser_present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ItemChanges {
    /// Returns true if no field changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.product_id.is_none()
            && self.unit_id.is_none()
            && self.quantity.is_none()
            && self.unit_cost.is_none()
            && self.description.is_none()
    }

    /// Lists the changed fields.
    #[must_use]
    pub fn fields(&self) -> Vec<ItemField> {
        let mut fields = Vec::new();
        if self.product_id.is_some() {
            fields.push(ItemField::ProductId);
        }
        if self.unit_id.is_some() {
            fields.push(ItemField::UnitId);
        }
        if self.quantity.is_some() {
            fields.push(ItemField::Quantity);
        }
        if self.unit_cost.is_some() {
            fields.push(ItemField::UnitCost);
        }
        if self.description.is_some() {
            fields.push(ItemField::Description);
        }
        fields
    }

    /// Writes the changed fields into `item`.
    pub fn apply(&self, item: &mut LineItem) {
        if let Some(product_id) = self.product_id {
            item.product_id = product_id;
        }
        if let Some(unit_id) = self.unit_id {
            item.unit_id = unit_id;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit_cost) = self.unit_cost {
            item.unit_cost = unit_cost;
        }
        if let Some(description) = &self.description {
            item.description.clone_from(description);
        }
    }
}

/// An update to one existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    /// The item being updated.
    pub id: ItemId,
    /// Only the fields that differ from the snapshot.
    pub changes: ItemChanges,
}

/// The minimal set of operations turning a snapshot into a draft.
///
/// Creates keep draft order, updates keep draft order, deletes keep snapshot
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDelta {
    /// Draft rows without identity.
    pub creates: Vec<LineItem>,
    /// Existing rows whose fields changed.
    pub updates: Vec<ItemUpdate>,
    /// Snapshot rows missing from the draft.
    pub deletes: Vec<ItemId>,
}

impl ReconciliationDelta {
    /// Returns true if the draft matches the snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of backend operations needed to apply the delta.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Applies the delta to a snapshot locally.
    ///
    /// Surviving snapshot rows keep their order with updates applied; created
    /// rows follow in draft order, still without identity.
    #[must_use]
    pub fn apply_to(&self, snapshot: &[LineItem]) -> Vec<LineItem> {
        let deleted: HashSet<ItemId> = self.deletes.iter().copied().collect();
        let updates: HashMap<ItemId, &ItemChanges> = self
            .updates
            .iter()
            .map(|update| (update.id, &update.changes))
            .collect();

        let mut result: Vec<LineItem> = snapshot
            .iter()
            .filter(|item| item.id.is_none_or(|id| !deleted.contains(&id)))
            .cloned()
            .map(|mut item| {
                if let Some(changes) = item.id.and_then(|id| updates.get(&id)) {
                    changes.apply(&mut item);
                }
                item
            })
            .collect();
        result.extend(self.creates.iter().cloned());
        result
    }
}

/// Computes [`ReconciliationDelta`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemReconciler {
    policy: DecimalPolicy,
}

impl ItemReconciler {
    /// Creates a reconciler comparing numbers under `policy`.
    #[must_use]
    pub const fn new(policy: DecimalPolicy) -> Self {
        Self { policy }
    }

    /// Returns the decimal policy in use.
    #[must_use]
    pub const fn policy(&self) -> DecimalPolicy {
        self.policy
    }

    /// Computes the delta turning `snapshot` into `draft`.
    ///
    /// A changed product on an existing row is an update, never a
    /// delete followed by a create.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if the snapshot has a row without identity
    /// or a repeated identity, or if the draft repeats an identity or
    /// references one the snapshot does not contain.
    pub fn reconcile(
        &self,
        snapshot: &[LineItem],
        draft: &[LineItem],
    ) -> Result<ReconciliationDelta, ReconcileError> {
        let mut index: HashMap<ItemId, &LineItem> = HashMap::with_capacity(snapshot.len());
        for (position, item) in snapshot.iter().enumerate() {
            let id = item
                .id
                .ok_or(ReconcileError::MissingIdentity { index: position })?;
            if index.insert(id, item).is_some() {
                return Err(ReconcileError::DuplicateIdentity { id });
            }
        }

        let mut delta = ReconciliationDelta::default();
        let mut kept: HashSet<ItemId> = HashSet::with_capacity(draft.len());

        for item in draft {
            let Some(id) = item.id else {
                delta.creates.push(self.normalized(item));
                continue;
            };
            if !kept.insert(id) {
                return Err(ReconcileError::DuplicateIdentity { id });
            }
            let before = index
                .get(&id)
                .ok_or(ReconcileError::UnknownIdentity { id })?;
            let changes = self.diff(before, item);
            if !changes.is_empty() {
                delta.updates.push(ItemUpdate { id, changes });
            }
        }

        delta.deletes = snapshot
            .iter()
            .filter_map(|item| item.id)
            .filter(|id| !kept.contains(id))
            .collect();

        Ok(delta)
    }

    /// Returns the fields of `after` that differ from `before`.
    #[must_use]
    pub fn diff(&self, before: &LineItem, after: &LineItem) -> ItemChanges {
        let mut changes = ItemChanges::default();
        if before.product_id != after.product_id {
            changes.product_id = Some(after.product_id);
        }
        if before.unit_id != after.unit_id {
            changes.unit_id = Some(after.unit_id);
        }
        if !self.policy.same(before.quantity, after.quantity) {
            changes.quantity = Some(self.policy.normalize(after.quantity));
        }
        if !self.policy.same(before.unit_cost, after.unit_cost) {
            changes.unit_cost = Some(self.policy.normalize(after.unit_cost));
        }
        if before.normalized_description() != after.normalized_description() {
            changes.description = Some(after.normalized_description().map(str::to_string));
        }
        changes
    }

    fn normalized(&self, item: &LineItem) -> LineItem {
        LineItem {
            id: None,
            product_id: item.product_id,
            unit_id: item.unit_id,
            quantity: self.policy.normalize(item.quantity),
            unit_cost: self.policy.normalize(item.unit_cost),
            description: item.normalized_description().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u64, product: u64, quantity: i64) -> LineItem {
        LineItem::new(
            ProductId::new(product),
            UnitId::new(1),
            Decimal::from(quantity),
            Decimal::new(250, 2),
        )
        .with_id(ItemId::new(id))
    }

    fn draft_row(product: u64, quantity: i64) -> LineItem {
        LineItem::new(
            ProductId::new(product),
            UnitId::new(1),
            Decimal::from(quantity),
            Decimal::new(250, 2),
        )
    }

    #[test]
    fn changed_quantity_is_single_field_update() {
        let snapshot = vec![row(1, 9, 2)];
        let draft = vec![row(1, 9, 3)];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();

        assert!(delta.creates.is_empty());
        assert!(delta.deletes.is_empty());
        assert_eq!(delta.updates.len(), 1);
        assert_eq!(delta.updates[0].id, ItemId::new(1));
        assert_eq!(delta.updates[0].changes.fields(), vec![ItemField::Quantity]);
        assert_eq!(delta.updates[0].changes.quantity, Some(Decimal::from(3)));
    }

    #[test]
    fn removed_row_is_deleted() {
        let snapshot = vec![row(1, 9, 2), row(2, 4, 1)];
        let draft = vec![row(1, 9, 2)];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();

        assert!(delta.creates.is_empty());
        assert!(delta.updates.is_empty());
        assert_eq!(delta.deletes, vec![ItemId::new(2)]);
    }

    #[test]
    fn row_without_identity_is_created() {
        let delta = ItemReconciler::default()
            .reconcile(&[], &[draft_row(9, 1)])
            .unwrap();

        assert!(delta.updates.is_empty());
        assert!(delta.deletes.is_empty());
        assert_eq!(delta.creates.len(), 1);
        assert_eq!(delta.creates[0].product_id, ProductId::new(9));
        assert_eq!(delta.creates[0].quantity, Decimal::ONE);
    }

    #[test]
    fn changed_product_is_update_not_replace() {
        let snapshot = vec![row(1, 9, 2)];
        let draft = vec![row(1, 10, 2)];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();

        assert!(delta.creates.is_empty());
        assert!(delta.deletes.is_empty());
        assert_eq!(delta.updates[0].changes.product_id, Some(ProductId::new(10)));
        assert_eq!(delta.updates[0].changes.fields(), vec![ItemField::ProductId]);
    }

    #[test]
    fn representation_differences_are_not_changes() {
        let snapshot = vec![row(1, 9, 1)];
        let mut draft = snapshot.clone();
        draft[0].quantity = Decimal::new(1004, 3);
        draft[0].unit_cost = Decimal::new(2500, 3);
        draft[0].description = Some("   ".to_string());

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn cleared_description_is_sent_as_null() {
        let snapshot = vec![row(1, 9, 1).with_description("fragile")];
        let draft = vec![row(1, 9, 1)];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();
        let changes = &delta.updates[0].changes;
        assert_eq!(changes.description, Some(None));

        let json = serde_json::to_value(changes).unwrap();
        assert!(json["description"].is_null());
        assert!(json.get("quantity").is_none());
    }

    #[test]
    fn unknown_draft_identity_is_rejected() {
        let err = ItemReconciler::default()
            .reconcile(&[row(1, 9, 1)], &[row(7, 9, 1)])
            .unwrap_err();
        assert_eq!(err, ReconcileError::UnknownIdentity { id: ItemId::new(7) });
    }

    #[test]
    fn duplicate_identities_are_rejected() {
        let reconciler = ItemReconciler::default();

        let err = reconciler
            .reconcile(&[row(1, 9, 1)], &[row(1, 9, 1), row(1, 9, 2)])
            .unwrap_err();
        assert_eq!(err, ReconcileError::DuplicateIdentity { id: ItemId::new(1) });

        let err = reconciler
            .reconcile(&[row(1, 9, 1), row(1, 4, 1)], &[])
            .unwrap_err();
        assert_eq!(err, ReconcileError::DuplicateIdentity { id: ItemId::new(1) });
    }

    #[test]
    fn snapshot_rows_need_identity() {
        let err = ItemReconciler::default()
            .reconcile(&[row(1, 9, 1), draft_row(4, 1)], &[])
            .unwrap_err();
        assert_eq!(err, ReconcileError::MissingIdentity { index: 1 });
    }

    #[test]
    fn output_order_is_deterministic() {
        let snapshot = vec![row(3, 1, 1), row(1, 2, 1), row(2, 3, 1), row(4, 4, 1)];
        let draft = vec![
            draft_row(20, 1),
            row(2, 3, 5),
            draft_row(10, 1),
            row(3, 1, 9),
        ];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();

        let created: Vec<_> = delta.creates.iter().map(|i| i.product_id.get()).collect();
        let updated: Vec<_> = delta.updates.iter().map(|u| u.id.get()).collect();
        let deleted: Vec<_> = delta.deletes.iter().map(|id| id.get()).collect();
        assert_eq!(created, vec![20, 10]);
        assert_eq!(updated, vec![2, 3]);
        assert_eq!(deleted, vec![1, 4]);
    }

    #[test]
    fn apply_to_reproduces_draft_rows() {
        let snapshot = vec![row(1, 9, 2), row(2, 4, 1)];
        let draft = vec![row(1, 9, 5), draft_row(7, 3)];

        let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();
        let applied = delta.apply_to(&snapshot);

        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].id, Some(ItemId::new(1)));
        assert_eq!(applied[0].quantity, Decimal::from(5));
        assert_eq!(applied[1].id, None);
        assert_eq!(applied[1].product_id, ProductId::new(7));
    }

    #[test]
    fn cleared_description_survives_json() {
        let cleared = ItemChanges {
            description: Some(None),
            ..ItemChanges::default()
        };
        let json = serde_json::to_string(&cleared).unwrap();
        assert_eq!(json, r#"{"description":null}"#);

        let back: ItemChanges = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cleared);
        assert_eq!(back.fields(), vec![ItemField::Description]);

        let untouched: ItemChanges = serde_json::from_str(r#"{"quantity":"3"}"#).unwrap();
        assert_eq!(untouched.description, None);
    }
}
