//! Cart submission: validation, order creation and merging into an open order.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderdesk_core::{
    AreaId, DecimalPolicy, OrderId, OrderKey, OrderStatus, OrderSummary, ProductId, UnitId, UserId,
};

use crate::api::{NewOrder, NewOrderLine, OrderApi};
use crate::error::Result;

/// Why a submission was refused before reaching the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SubmitRejection {
    /// The cart is empty, a line is malformed, or user or area is not selected.
    #[error("validation failed: {message}")]
    Validation {
        /// What is missing or malformed.
        message: String,
    },

    /// An order exists for today but its details are unknown.
    #[error("an order already exists for this area today")]
    AlreadyExists,

    /// Today's order exists and no longer accepts items.
    #[error("order {order_id} is {status} and no longer accepts items")]
    StatusNotCreated {
        /// The existing order.
        order_id: OrderId,
        /// Its status.
        status: OrderStatus,
    },

    /// The existence check has not finished.
    #[error("order existence is still being checked")]
    Unknown,

    /// This area already received a submission during this session.
    #[error("area {area_id} was already submitted in this session")]
    AlreadySubmittedThisSession {
        /// The area.
        area_id: AreaId,
    },

    /// A submission for this area is still awaiting the backend.
    #[error("a submission for this area is already in flight")]
    SubmissionInFlight,
}

impl SubmitRejection {
    /// Creates a validation rejection.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::AlreadyExists => "already_exists",
            Self::StatusNotCreated { .. } => "status_not_created",
            Self::Unknown => "unknown",
            Self::AlreadySubmittedThisSession { .. } => "already_submitted",
            Self::SubmissionInFlight => "in_flight",
        }
    }
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product ordered.
    pub product_id: ProductId,
    /// Unit of measurement.
    #[serde(alias = "unitMeasurementId")]
    pub unit_id: UnitId,
    /// Quantity ordered.
    pub quantity: Decimal,
    /// Cost per unit.
    #[serde(alias = "price")]
    pub unit_cost: Decimal,
}

impl CartLine {
    /// Creates a cart line.
    #[must_use]
    pub const fn new(
        product_id: ProductId,
        unit_id: UnitId,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            product_id,
            unit_id,
            quantity,
            unit_cost,
        }
    }
}

/// The local draft of an order. Serialized as a bare array of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line.
    pub fn push(&mut self, line: CartLine) {
        self.lines.push(line);
    }

    /// Returns the lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

/// How a permitted submission reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitPlan {
    /// No order exists yet: create one.
    Create,
    /// Today's order is still open: append the cart to it.
    Merge(OrderSummary),
}

impl SubmitPlan {
    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Merge(_) => "merged",
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    /// The order after the submission.
    pub order: OrderSummary,
    /// True if the cart was appended to an existing order.
    pub merged: bool,
    /// Number of lines sent.
    pub lines: usize,
}

/// Validates carts and sends them to the backend.
#[derive(Clone)]
pub struct OrderSubmitter {
    api: Arc<dyn OrderApi>,
    policy: DecimalPolicy,
}

impl fmt::Debug for OrderSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderSubmitter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OrderSubmitter {
    /// Creates a submitter rounding values under `policy`.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>, policy: DecimalPolicy) -> Self {
        Self { api, policy }
    }

    /// Checks the preconditions that need no backend call.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejection::Validation`] if user or area is not
    /// selected, the cart is empty, or a line has a non-positive quantity or a
    /// negative cost.
    pub fn validate(
        &self,
        user_id: Option<UserId>,
        area_id: Option<AreaId>,
        cart: &Cart,
    ) -> std::result::Result<(UserId, AreaId), SubmitRejection> {
        let user_id = user_id.ok_or_else(|| SubmitRejection::validation("no user selected"))?;
        let area_id = area_id.ok_or_else(|| SubmitRejection::validation("no area selected"))?;
        if cart.is_empty() {
            return Err(SubmitRejection::validation("cart is empty"));
        }
        for (index, line) in cart.lines().iter().enumerate() {
            if self.policy.normalize(line.quantity) <= Decimal::ZERO {
                return Err(SubmitRejection::validation(format!(
                    "line {index} has a non-positive quantity"
                )));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(SubmitRejection::validation(format!(
                    "line {index} has a negative cost"
                )));
            }
        }
        Ok((user_id, area_id))
    }

    /// Converts cart lines into order lines, rounded.
    #[must_use]
    pub fn order_lines(&self, cart: &Cart) -> Vec<NewOrderLine> {
        cart.lines()
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                quantity: self.policy.normalize(line.quantity),
                price: self.policy.normalize(line.unit_cost),
                unit_measurement_id: line.unit_id,
            })
            .collect()
    }

    /// Builds the creation payload for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the total overflows.
    pub fn build_order(
        &self,
        key: &OrderKey,
        cart: &Cart,
        observation: Option<String>,
    ) -> Result<NewOrder> {
        let total_amount = self.policy.total(
            cart.lines()
                .iter()
                .map(|line| (line.quantity, line.unit_cost)),
        )?;
        Ok(NewOrder {
            user_id: key.user_id,
            area_id: key.area_id,
            total_amount,
            status: OrderStatus::Created,
            observation: observation
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            items: self.order_lines(cart),
        })
    }

    /// Sends the cart according to `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::error::Error::Transport) if the
    /// backend call fails.
    #[tracing::instrument(
        skip(self, plan, cart, observation),
        fields(
            user_id = %key.user_id,
            area_id = %key.area_id,
            day = %key.day,
            plan = plan.label(),
            lines = cart.len(),
        )
    )]
    pub async fn submit(
        &self,
        key: &OrderKey,
        plan: &SubmitPlan,
        cart: &Cart,
        observation: Option<String>,
    ) -> Result<SubmitReceipt> {
        let order = match plan {
            SubmitPlan::Create => {
                let payload = self.build_order(key, cart, observation)?;
                self.api.create_order(&payload).await?
            }
            SubmitPlan::Merge(existing) => {
                let lines = self.order_lines(cart);
                self.api.append_order_items(existing.id, &lines).await?
            }
        };
        tracing::info!(order_id = %order.id, "cart submitted");
        Ok(SubmitReceipt {
            order,
            merged: matches!(plan, SubmitPlan::Merge(_)),
            lines: cart.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryOrderApi;
    use orderdesk_core::CalendarDay;

    fn submitter() -> OrderSubmitter {
        OrderSubmitter::new(
            Arc::new(InMemoryOrderApi::default()),
            DecimalPolicy::default(),
        )
    }

    fn cart() -> Cart {
        [
            CartLine::new(ProductId::new(9), UnitId::new(1), Decimal::from(2), Decimal::new(1050, 2)),
            CartLine::new(ProductId::new(4), UnitId::new(2), Decimal::new(15, 1), Decimal::new(333, 2)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn validation_checks_selection_then_cart() {
        let submitter = submitter();
        let user = Some(UserId::new(5));
        let area = Some(AreaId::new(2));

        assert!(matches!(
            submitter.validate(None, area, &cart()),
            Err(SubmitRejection::Validation { .. })
        ));
        assert!(matches!(
            submitter.validate(user, None, &cart()),
            Err(SubmitRejection::Validation { .. })
        ));
        assert!(matches!(
            submitter.validate(user, area, &Cart::new()),
            Err(SubmitRejection::Validation { .. })
        ));
        assert_eq!(
            submitter.validate(user, area, &cart()),
            Ok((UserId::new(5), AreaId::new(2)))
        );
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let mut cart = cart();
        cart.push(CartLine::new(ProductId::new(1), UnitId::new(1), Decimal::new(1, 3), Decimal::ONE));
        let err = submitter()
            .validate(Some(UserId::new(5)), Some(AreaId::new(2)), &cart)
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn built_order_carries_rounded_total() {
        let key = OrderKey::new(
            UserId::new(5),
            AreaId::new(2),
            CalendarDay::parse("2025-01-15").unwrap(),
        );
        let order = submitter()
            .build_order(&key, &cart(), Some("  ".to_string()))
            .unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.total_amount, Decimal::new(2600, 2));
        assert_eq!(order.observation, None);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].unit_measurement_id, UnitId::new(2));
    }

    #[test]
    fn cart_decodes_from_array_with_aliases() {
        let json = r#"[{"productId":9,"unitMeasurementId":1,"quantity":"2","price":3}]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].unit_cost, Decimal::from(3));
    }
}
