//! # orderdesk-core
//!
//! Shared primitives for the orderdesk order-consolidation core.
//!
//! This crate provides the foundational types used by every other orderdesk crate:
//!
//! - **Identifiers**: Strongly-typed IDs for users, areas, orders, items, products, units
//! - **Order types**: `OrderKey`, `OrderStatus`, `OrderSummary`, `ExistenceSignal`
//! - **Canonical days**: `DayClock` and `CalendarDay`, the single source of "today"
//! - **Money**: `DecimalPolicy` for normalizing quantities and costs
//! - **Line items**: `LineItem`, the row shape shared by snapshots and drafts
//! - **Error Types**: Shared error definitions and result types
//! - **Ambient stack**: configuration loading and logging initialization
//!
//! ## Crate Boundary
//!
//! `orderdesk-core` performs no I/O. Backend access, decision making and
//! reconciliation live in `orderdesk-flow`.
//!
//! ## Example
//!
//! ```rust
//! use orderdesk_core::prelude::*;
//!
//! let clock = DayClock::utc();
//! let key = OrderKey::new(UserId::new(5), AreaId::new(2), clock.today());
//! assert_eq!(key.area_id, AreaId::new(2));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod day;
pub mod error;
pub mod id;
pub mod item;
pub mod money;
pub mod observability;
pub mod order;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use orderdesk_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::CoreConfig;
    pub use crate::day::{CalendarDay, DayClock};
    pub use crate::error::{Error, Result};
    pub use crate::id::{AreaId, ItemId, OrderId, ProductId, UnitId, UserId};
    pub use crate::item::LineItem;
    pub use crate::money::DecimalPolicy;
    pub use crate::order::{ExistenceSignal, OrderKey, OrderStatus, OrderSummary};
}

// Re-export key types at crate root for ergonomics
pub use config::CoreConfig;
pub use day::{CalendarDay, DayClock};
pub use error::{Error, Result};
pub use id::{AreaId, ItemId, OrderId, ProductId, UnitId, UserId};
pub use item::LineItem;
pub use money::DecimalPolicy;
pub use observability::{LogFormat, init_logging};
pub use order::{ExistenceSignal, OrderKey, OrderStatus, OrderSummary};
