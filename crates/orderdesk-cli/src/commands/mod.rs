//! CLI command implementations.

pub mod check;
pub mod reconcile;
pub mod submit;

use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use orderdesk_flow::consolidation::decision::DecisionState;
use orderdesk_flow::consolidation::engine::ConsolidationEngine;
use orderdesk_flow::consolidation::ledger::SessionLedger;

use crate::Config;
use crate::client::HttpOrderApi;

/// Builds an engine over the HTTP backend with a fresh session ledger.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the core
/// configuration is invalid.
pub fn http_engine(config: &Config) -> Result<ConsolidationEngine> {
    let api = Arc::new(HttpOrderApi::new(config)?);
    ConsolidationEngine::new(api, &config.core, SessionLedger::new())
        .context("Invalid consolidation configuration")
}

fn format_decision_colored(state: &DecisionState) -> String {
    let text = state.to_string();
    match state {
        DecisionState::NoOrder => text.green().to_string(),
        DecisionState::OpenMergeable(_) => text.blue().to_string(),
        DecisionState::Blocked(_) => text.red().to_string(),
        DecisionState::Checking => text.yellow().to_string(),
    }
}
