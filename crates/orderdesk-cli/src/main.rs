//! orderdesk CLI - order consolidation against the dashboard backend.
//!
//! The main entry point for the `orderdesk` CLI binary.

use anyhow::Result;
use clap::Parser;

use orderdesk_cli::{Cli, Commands};
use orderdesk_core::{LogFormat, init_logging};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });
    let config = cli.config()?;

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Check(args) => orderdesk_cli::commands::check::execute(args, &config).await,
            Commands::Submit(args) => orderdesk_cli::commands::submit::execute(args, &config).await,
            Commands::Reconcile(args) => {
                orderdesk_cli::commands::reconcile::execute(args, &config).await
            }
        }
    })
}
