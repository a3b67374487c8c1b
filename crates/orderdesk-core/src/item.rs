//! Line items of an order or purchase.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::{ItemId, ProductId, UnitId};

/// A row in an order's or purchase's item collection.
///
/// The same shape serves the server snapshot and the locally edited draft.
/// An `id` marks an existing server row; drafts add rows without one.
///
/// The backend names the unit `unitMeasurementId` and the cost `price`; both
/// spellings are accepted when reading. Writes use `unitId` and `unitCost`,
/// and the HTTP client renames them for the order-items endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Server identity, absent for rows not yet created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Product on this line.
    pub product_id: ProductId,
    /// Unit of measurement.
    #[serde(alias = "unitMeasurementId")]
    pub unit_id: UnitId,
    /// Quantity ordered.
    pub quantity: Decimal,
    /// Cost per unit.
    #[serde(alias = "price")]
    pub unit_cost: Decimal,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LineItem {
    /// Creates a draft line without server identity.
    #[must_use]
    pub const fn new(
        product_id: ProductId,
        unit_id: UnitId,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            id: None,
            product_id,
            unit_id,
            quantity,
            unit_cost,
            description: None,
        }
    }

    /// Sets the server identity.
    #[must_use]
    pub const fn with_id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if this line exists on the server.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns the description with surrounding whitespace removed, treating
    /// blank text as no description.
    #[must_use]
    pub fn normalized_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_backend_aliases() {
        let json = r#"{"id":4,"productId":9,"unitMeasurementId":1,"quantity":"2","price":3.5}"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, Some(ItemId::new(4)));
        assert_eq!(item.unit_id, UnitId::new(1));
        assert_eq!(item.quantity, Decimal::from(2));
        assert_eq!(item.unit_cost, Decimal::new(35, 1));
    }

    #[test]
    fn draft_lines_omit_identity() {
        let item = LineItem::new(ProductId::new(9), UnitId::new(1), Decimal::ONE, Decimal::TEN);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("id").is_none());
        assert!(!item.is_persisted());
    }

    #[test]
    fn blank_description_normalizes_to_none() {
        let item = LineItem::new(ProductId::new(1), UnitId::new(1), Decimal::ONE, Decimal::ONE)
            .with_description("   ");
        assert_eq!(item.normalized_description(), None);
        let item = item.with_description(" fragile ");
        assert_eq!(item.normalized_description(), Some("fragile"));
    }
}
