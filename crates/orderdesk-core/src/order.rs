//! Orders as seen by the consolidation core.
//!
//! The core never holds a full order. It needs the natural key that the
//! one-order-per-day invariant is defined over ([`OrderKey`]), a small
//! summary of an existing order ([`OrderSummary`]) and a tagged answer to
//! "does an order already exist" ([`ExistenceSignal`]).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::day::CalendarDay;
use crate::id::{AreaId, OrderId, UserId};

/// Natural key for the one-order invariant.
///
/// `day` is computed once per resolution cycle from a
/// [`DayClock`](crate::day::DayClock) and then carried along, so a cycle that
/// straddles midnight keeps comparing against the day it started with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    /// User the order is placed for.
    pub user_id: UserId,
    /// Area the order is placed in.
    pub area_id: AreaId,
    /// Canonical calendar day.
    pub day: CalendarDay,
}

impl OrderKey {
    /// Creates a new order key.
    #[must_use]
    pub const fn new(user_id: UserId, area_id: AreaId, day: CalendarDay) -> Self {
        Self {
            user_id,
            area_id,
            day,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={} area={} day={}",
            self.user_id, self.area_id, self.day
        )
    }
}

/// Server-side order status.
///
/// Statuses the backend may add later deserialize as [`OrderStatus::Unknown`]
/// and are treated like any other non-`created` status: blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, still accepting items.
    Created,
    /// Being prepared.
    Process,
    /// Confirmed by the supplier side.
    Confirmed,
    /// Delivered to the area.
    Delivered,
    /// Cancelled.
    Cancelled,
    /// Any status this build does not know about.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns true if further items may be appended to an order in this status.
    #[must_use]
    pub const fn is_mergeable(self) -> bool {
        matches!(self, Self::Created)
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Process => "process",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Summary of an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Server-side order ID.
    pub id: OrderId,
    /// Current status.
    pub status: OrderStatus,
    /// Order total.
    pub total_amount: Decimal,
    /// Area the order belongs to.
    pub area_id: AreaId,
}

impl OrderSummary {
    /// Returns true if further items may be appended to this order.
    #[must_use]
    pub const fn is_mergeable(&self) -> bool {
        self.status.is_mergeable()
    }
}

/// Answer to "does an order already exist for this key".
///
/// The backend sometimes answers with a full order, sometimes with a bare
/// `exists: true`. Both shapes are folded into this variant at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExistenceSignal {
    /// Not yet queried.
    #[default]
    Unknown,
    /// An order exists. The summary is absent when the backend did not
    /// attach one; callers must treat that as blocking.
    Confirmed(Option<OrderSummary>),
    /// Confirmed that no order exists.
    Absent,
}

impl ExistenceSignal {
    /// Folds a wire `{exists, order?}` payload into a signal.
    ///
    /// An attached order wins over `exists: false`: a payload that carries an
    /// order is never read as "no order".
    #[must_use]
    pub fn from_wire(exists: bool, order: Option<OrderSummary>) -> Self {
        match (exists, order) {
            (_, Some(order)) => Self::Confirmed(Some(order)),
            (true, None) => Self::Confirmed(None),
            (false, None) => Self::Absent,
        }
    }

    /// Returns true once the signal carries an answer.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the attached summary, if any.
    #[must_use]
    pub const fn summary(&self) -> Option<&OrderSummary> {
        match self {
            Self::Confirmed(Some(summary)) => Some(summary),
            _ => None,
        }
    }
}
