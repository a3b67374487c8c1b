//! Reconcile command - diff an item snapshot against a draft.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::Instrument;

use orderdesk_core::observability::reconcile_span;
use orderdesk_core::{LineItem, OrderId};
use orderdesk_flow::items::applier::{ApplyReport, ItemApplier};
use orderdesk_flow::items::reconciler::{ItemReconciler, ReconciliationDelta};

use crate::client::HttpOrderApi;
use crate::{Config, OutputFormat};

/// Arguments for the reconcile command.
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// JSON file holding the server's current items.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// JSON file holding the edited items.
    #[arg(long)]
    pub draft: PathBuf,

    /// Apply the delta against the backend.
    #[arg(long)]
    pub apply: bool,

    /// Order the items belong to (required with --apply).
    #[arg(long)]
    pub parent: Option<u64>,
}

/// One line of the delta listing.
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct DeltaRow {
    /// Operation kind.
    #[tabled(rename = "Operation")]
    pub operation: &'static str,
    /// Item identity, `-` for creates.
    #[tabled(rename = "Item")]
    pub item: String,
    /// What the operation sends.
    #[tabled(rename = "Details")]
    pub details: String,
}

#[derive(Serialize)]
struct ApplyOutput<'a> {
    delta: &'a ReconciliationDelta,
    report: &'a ApplyReport,
}

/// Execute the reconcile command.
///
/// # Errors
///
/// Returns an error if a file cannot be read, the items cannot be reconciled,
/// `--apply` is given without `--parent`, or any item operation fails.
pub async fn execute(args: ReconcileArgs, config: &Config) -> Result<()> {
    let parent = match (args.apply, args.parent) {
        (true, Some(parent)) => Some(OrderId::new(parent)),
        (true, None) => anyhow::bail!("--parent is required with --apply"),
        (false, _) => None,
    };

    let snapshot = load_items(&args.snapshot)?;
    let draft = load_items(&args.draft)?;
    let delta = ItemReconciler::new(config.core.decimal_policy())
        .reconcile(&snapshot, &draft)
        .context("Snapshot and draft cannot be reconciled")?;

    let Some(parent) = parent else {
        return print_delta(&delta, &config.format);
    };

    let api = Arc::new(HttpOrderApi::new(config)?);
    let applier = ItemApplier::from_config(api, &config.core);
    let report = apply(&applier, parent, &delta).await;

    match config.format {
        OutputFormat::Json => {
            let output = ApplyOutput {
                delta: &delta,
                report: &report,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialize report")?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            print_delta(&delta, &config.format)?;
            println!();
            print_report(&report);
        }
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} item operations failed",
            report.failures.len(),
            delta.operation_count()
        );
    }
    Ok(())
}

/// Reads line items from a JSON array.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_items(path: &Path) -> Result<Vec<LineItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read items file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse items file: {}", path.display()))
}

/// Applies `delta` to the items of `parent`.
pub async fn apply(
    applier: &ItemApplier,
    parent: OrderId,
    delta: &ReconciliationDelta,
) -> ApplyReport {
    applier
        .apply(parent, delta)
        .instrument(reconcile_span("apply", parent.get()))
        .await
}

/// Lists the delta's operations: creates, then updates, then deletes.
#[must_use]
pub fn delta_rows(delta: &ReconciliationDelta) -> Vec<DeltaRow> {
    let creates = delta.creates.iter().map(|item| DeltaRow {
        operation: "create",
        item: "-".to_string(),
        details: format!(
            "product {} x {} @ {}",
            item.product_id, item.quantity, item.unit_cost
        ),
    });
    let updates = delta.updates.iter().map(|update| DeltaRow {
        operation: "update",
        item: update.id.to_string(),
        details: update
            .changes
            .fields()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    });
    let deletes = delta.deletes.iter().map(|id| DeltaRow {
        operation: "delete",
        item: id.to_string(),
        details: String::new(),
    });
    creates.chain(updates).chain(deletes).collect()
}

fn print_delta(delta: &ReconciliationDelta, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(delta).context("Failed to serialize delta")?
            );
        }
        OutputFormat::Text => {
            if delta.is_empty() {
                println!("Draft matches snapshot; nothing to do");
                return Ok(());
            }
            println!("Delta ({} operations):", delta.operation_count());
            println!();
            for row in delta_rows(delta) {
                println!(
                    "  {} {} {}",
                    format_operation_colored(row.operation),
                    row.item,
                    row.details
                );
            }
        }
        OutputFormat::Table => {
            let rows = delta_rows(delta);
            if rows.is_empty() {
                println!("Draft matches snapshot; nothing to do");
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}

fn print_report(report: &ApplyReport) {
    println!("Applied: {}", format!("{}", report.succeeded()).green());
    if report.failures.is_empty() {
        return;
    }
    println!("Failed:  {}", format!("{}", report.failures.len()).red());
    for failure in &report.failures {
        println!("  {}: {}", failure.target, failure.message.red());
    }
    let pending = report.pending_identities();
    if !pending.is_empty() {
        let ids: Vec<String> = pending.iter().map(ToString::to_string).collect();
        println!("Still out of sync: {}", ids.join(", "));
    }
}

fn format_operation_colored(operation: &str) -> String {
    match operation {
        "create" => operation.green().to_string(),
        "update" => operation.yellow().to_string(),
        "delete" => operation.red().to_string(),
        _ => operation.to_string(),
    }
}
