//! Order consolidation: one order per user, area and canonical day.
//!
//! Creation path, leaves first:
//!
//! 1. [`probe::ExistenceProbe`] asks the backend whether today's order exists
//! 2. [`fallback::FallbackScanner`] scans the recent listing when the probe
//!    says "no" or cannot be reached
//! 3. [`decision::DecisionMachine`] folds both answers into a
//!    [`decision::DecisionState`]
//! 4. [`submitter::OrderSubmitter`] creates a new order or merges into the
//!    open one
//! 5. [`ledger::SessionLedger`] remembers the area for the rest of the session
//!
//! [`engine::ConsolidationEngine`] wires the steps together.

pub mod decision;
pub mod engine;
pub mod events;
pub mod fallback;
pub mod ledger;
pub mod probe;
pub mod submitter;
