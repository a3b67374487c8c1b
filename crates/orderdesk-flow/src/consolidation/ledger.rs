//! Session-scoped record of areas submitted during this session.
//!
//! The ledger is created at session start, shared by handle with the engine,
//! and cleared at logout. It is never persisted: a fresh process starts with
//! an empty ledger and relies on the backend for anything older.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use orderdesk_core::AreaId;

/// Areas that received a successful submission during this session.
///
/// Cloning yields another handle to the same ledger.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    areas: Arc<RwLock<BTreeSet<AreaId>>>,
}

impl SessionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful submission. Returns false if the area was
    /// already recorded.
    pub fn record(&self, area_id: AreaId) -> bool {
        let inserted = self
            .areas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(area_id);
        if inserted {
            tracing::info!(area_id = %area_id, "area recorded in session ledger");
        }
        inserted
    }

    /// Returns true if the area was submitted during this session.
    #[must_use]
    pub fn contains(&self, area_id: AreaId) -> bool {
        self.areas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&area_id)
    }

    /// Returns the recorded areas in ascending order.
    #[must_use]
    pub fn areas(&self) -> Vec<AreaId> {
        self.areas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Number of recorded areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing was submitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every recorded area. Called at session end.
    pub fn clear(&self) {
        self.areas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("session ledger cleared");
    }
}
