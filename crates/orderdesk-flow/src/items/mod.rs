//! Line-item collection editing.
//!
//! - [`reconciler`]: computes the minimal delta between a snapshot and a draft
//! - [`applier`]: applies a delta with bounded concurrency and reports
//!   partial failures

pub mod applier;
pub mod reconciler;
