//! # orderdesk-flow
//!
//! Order consolidation and line-item reconciliation for the orderdesk
//! dashboard.
//!
//! This crate implements the two decision-heavy paths of the ordering
//! workflow:
//!
//! - **Consolidation**: deciding, from unreliable and partial backend
//!   signals, whether a new order may be created for a user, area and day,
//!   or whether the cart must be merged into (or is blocked by) an existing
//!   order
//! - **Reconciliation**: computing the minimal create/update/delete delta
//!   between a fetched item snapshot and a locally edited draft, and applying
//!   it with bounded concurrency
//!
//! ## Core Concepts
//!
//! - **Decision**: a pure reducer ([`consolidation::decision::DecisionMachine`])
//!   fed with explicit events; every probe, scan and submission result goes
//!   through it, so results for a stale key are discarded on arrival
//! - **Session ledger**: areas submitted during this session, injected into
//!   the engine and consulted before every submission
//! - **Delta**: the output of [`items::reconciler::ItemReconciler`], applied by
//!   [`items::applier::ItemApplier`]
//!
//! ## Guarantees
//!
//! - **Fail closed**: an ambiguous or unreachable backend never yields
//!   permission to create an order
//! - **Minimal**: unchanged items never produce updates
//! - **Isolated failures**: one failed item operation never cancels others
//!
//! ## Example
//!
//! ```rust
//! use orderdesk_core::prelude::*;
//! use orderdesk_flow::items::reconciler::ItemReconciler;
//! use rust_decimal::Decimal;
//!
//! let snapshot = vec![
//!     LineItem::new(ProductId::new(9), UnitId::new(1), Decimal::from(2), Decimal::ONE)
//!         .with_id(ItemId::new(1)),
//! ];
//! let mut draft = snapshot.clone();
//! draft[0].quantity = Decimal::from(3);
//!
//! let delta = ItemReconciler::default().reconcile(&snapshot, &draft).unwrap();
//! assert_eq!(delta.updates.len(), 1);
//! assert!(delta.creates.is_empty() && delta.deletes.is_empty());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod consolidation;
pub mod error;
pub mod items;
pub mod metrics;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::api::OrderApi;
    pub use crate::api::memory::InMemoryOrderApi;
    pub use crate::consolidation::decision::DecisionState;
    pub use crate::consolidation::engine::ConsolidationEngine;
    pub use crate::consolidation::ledger::SessionLedger;
    pub use crate::consolidation::submitter::{Cart, CartLine, SubmitReceipt, SubmitRejection};
    pub use crate::error::{Error, Result};
    pub use crate::items::applier::{ApplyReport, ItemApplier};
    pub use crate::items::reconciler::{ItemReconciler, ReconciliationDelta};
}
