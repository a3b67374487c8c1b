//! Submit command - send a cart for today's order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use orderdesk_core::{AreaId, UserId};
use orderdesk_flow::consolidation::engine::ConsolidationEngine;
use orderdesk_flow::consolidation::submitter::{Cart, SubmitReceipt};

use super::http_engine;
use crate::{Config, OutputFormat};

/// Arguments for the submit command.
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// User placing the order.
    #[arg(long)]
    pub user: u64,

    /// Area receiving the order.
    #[arg(long)]
    pub area: u64,

    /// JSON file holding the cart lines.
    #[arg(long)]
    pub cart: PathBuf,

    /// Free-text note attached to a newly created order.
    #[arg(long)]
    pub observation: Option<String>,
}

/// Execute the submit command.
///
/// # Errors
///
/// Returns an error if the cart cannot be read, the submission is refused, or
/// the backend call fails.
pub async fn execute(args: SubmitArgs, config: &Config) -> Result<()> {
    let mut cart = load_cart(&args.cart)?;
    let engine = http_engine(config)?;

    let receipt = submit(
        &engine,
        UserId::new(args.user),
        AreaId::new(args.area),
        &mut cart,
        args.observation,
    )
    .await?;

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&receipt).context("Failed to serialize receipt")?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            if receipt.merged {
                println!("Cart merged into open order {}", receipt.order.id);
            } else {
                println!("Order {} created", receipt.order.id);
            }
            println!();
            println!("  Lines:  {}", receipt.lines);
            println!("  Status: {}", receipt.order.status);
            println!("  Total:  {}", receipt.order.total_amount);
        }
    }

    Ok(())
}

/// Reads a cart from a JSON array of lines.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_cart(path: &Path) -> Result<Cart> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cart file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse cart file: {}", path.display()))
}

/// Resolves the decision for `user_id` and `area_id` and submits `cart`.
///
/// # Errors
///
/// Returns an error if the submission is refused or the backend call fails.
pub async fn submit(
    engine: &ConsolidationEngine,
    user_id: UserId,
    area_id: AreaId,
    cart: &mut Cart,
    observation: Option<String>,
) -> Result<SubmitReceipt> {
    let decision = engine.select(Some(user_id), Some(area_id)).await?;
    tracing::debug!(%decision, "resolved before submission");

    match engine.submit(cart, observation).await {
        Ok(receipt) => Ok(receipt),
        Err(err) if err.rejection().is_some() => {
            Err(anyhow::Error::new(err).context("Submission refused"))
        }
        Err(err) => Err(anyhow::Error::new(err).context("Submission failed")),
    }
}
