//! # orderdesk-cli
//!
//! Command-line interface for orderdesk order consolidation.
//!
//! ## Commands
//!
//! - `orderdesk check` - Resolve today's consolidation decision for a user and area
//! - `orderdesk submit` - Submit a cart, creating or merging into today's order
//! - `orderdesk reconcile` - Diff an item snapshot against a draft, optionally applying it
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `ORDERDESK_API_URL` - API endpoint (default: `http://localhost:3000/api`)
//! - `ORDERDESK_API_TOKEN` - API bearer token
//! - `ORDERDESK_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `ORDERDESK_TIMEZONE`, `ORDERDESK_DECIMAL_SCALE`, `ORDERDESK_FALLBACK_PAGE_LIMIT`,
//!   `ORDERDESK_FALLBACK_MAX_PAGES`, `ORDERDESK_APPLY_MAX_IN_FLIGHT` - see
//!   [`CoreConfig`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod client;
pub mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use orderdesk_core::CoreConfig;

/// orderdesk CLI - one order per user, area and day.
#[derive(Debug, Parser)]
#[command(name = "orderdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API server URL.
    #[arg(long, env = "ORDERDESK_API_URL", default_value = "http://localhost:3000/api")]
    pub api_url: String,

    /// API bearer token.
    #[arg(long, env = "ORDERDESK_API_TOKEN")]
    pub api_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "ORDERDESK_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Emit logs as JSON on stderr.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration, reading core settings from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an `ORDERDESK_*` variable is malformed.
    pub fn config(&self) -> Result<Config> {
        let core = CoreConfig::from_env().context("Invalid ORDERDESK_* configuration")?;
        Ok(self.config_with(core))
    }

    /// Get the effective configuration with explicit core settings.
    #[must_use]
    pub fn config_with(&self, core: CoreConfig) -> Config {
        Config {
            api_url: self.api_url.trim_end_matches('/').to_string(),
            api_token: self.api_token.clone(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            format: self.format.clone(),
            core,
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve today's consolidation decision.
    Check(commands::check::CheckArgs),
    /// Submit a cart.
    Submit(commands::submit::SubmitArgs),
    /// Diff an item snapshot against a draft.
    Reconcile(commands::reconcile::ReconcileArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server URL, without a trailing slash.
    pub api_url: String,
    /// API bearer token.
    pub api_token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Output format.
    pub format: OutputFormat,
    /// Consolidation and reconciliation settings.
    pub core: CoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".to_string(),
            api_token: None,
            timeout: Duration::from_secs(30),
            format: OutputFormat::default(),
            core: CoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_from_flags() {
        let cli = Cli::parse_from([
            "orderdesk",
            "--api-url",
            "https://api.example.com/",
            "--api-token",
            "token-abc",
            "--timeout-secs",
            "5",
            "--format",
            "json",
            "check",
            "--user",
            "5",
            "--area",
            "2",
        ]);

        let config = cli.config_with(CoreConfig::default());
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.api_token.as_deref(), Some("token-abc"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(matches!(config.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Check(_)));
    }
}
