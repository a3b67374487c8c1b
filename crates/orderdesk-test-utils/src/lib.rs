//! Shared test utilities for orderdesk tests.
//!
//! This crate provides:
//! - [`ScriptedOrderApi`]: In-memory backend with failure injection, call
//!   recording and held responses
//! - [`TestContext`]: Scripted backend, ledger and configuration wired together
//! - Factory functions for keys, summaries, line items and carts
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use orderdesk_test_utils::{TestContext, assert_rejected};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     let engine = ctx.engine();
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod scripted;

pub use assertions::*;
pub use fixtures::*;
pub use scripted::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("orderdesk=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
