//! Check command - resolve today's consolidation decision.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use orderdesk_core::{AreaId, CalendarDay, OrderKey, OrderSummary, UserId};
use orderdesk_flow::consolidation::decision::DecisionState;
use orderdesk_flow::consolidation::engine::ConsolidationEngine;

use super::{format_decision_colored, http_engine};
use crate::{Config, OutputFormat};

/// Arguments for the check command.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// User placing the order.
    #[arg(long)]
    pub user: u64,

    /// Area receiving the order.
    #[arg(long)]
    pub area: u64,

    /// Day to check (`YYYY-MM-DD`). Defaults to today in the configured timezone.
    #[arg(long)]
    pub day: Option<String>,
}

/// Outcome of one resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Key that was decided.
    pub key: OrderKey,
    /// The decision.
    pub decision: DecisionState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput<'a> {
    user_id: UserId,
    area_id: AreaId,
    day: &'a CalendarDay,
    decision: &'static str,
    submission_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<&'a OrderSummary>,
}

/// Execute the check command.
///
/// # Errors
///
/// Returns an error if the day is malformed or the engine cannot be built.
pub async fn execute(args: CheckArgs, config: &Config) -> Result<()> {
    let engine = http_engine(config)?;
    let report = check(&engine, &args).await?;
    print_report(&report, &config.format)
}

/// Runs one resolution cycle for the arguments' key.
///
/// # Errors
///
/// Returns an error if the day is malformed or shared state is poisoned.
pub async fn check(engine: &ConsolidationEngine, args: &CheckArgs) -> Result<CheckReport> {
    let user_id = UserId::new(args.user);
    let area_id = AreaId::new(args.area);

    let decision = match &args.day {
        Some(day) => {
            let day = CalendarDay::parse(day).context("Invalid --day")?;
            engine
                .select_key(OrderKey::new(user_id, area_id, day))
                .await?
        }
        None => engine.select(Some(user_id), Some(area_id)).await?,
    };
    let key = engine
        .current_key()?
        .context("No key selected after resolution")?;

    Ok(CheckReport { key, decision })
}

fn print_report(report: &CheckReport, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = CheckOutput {
                user_id: report.key.user_id,
                area_id: report.key.area_id,
                day: &report.key.day,
                decision: report.decision.label(),
                submission_allowed: report.decision.allows_submission(),
                order: report.decision.summary(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialize decision")?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            println!("User:     {}", report.key.user_id);
            println!("Area:     {}", report.key.area_id);
            println!("Day:      {}", report.key.day);
            println!("Decision: {}", format_decision_colored(&report.decision));
            if let Some(order) = report.decision.summary() {
                println!("Order:    {} ({}, total {})", order.id, order.status, order.total_amount);
            }
            if report.decision.allows_submission() {
                println!();
                println!("A cart may be submitted for this area.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: CheckArgs,
        }

        let cli = TestCli::parse_from(["test", "--user", "5", "--area", "2", "--day", "2025-01-15"]);
        assert_eq!(cli.args.user, 5);
        assert_eq!(cli.args.area, 2);
        assert_eq!(cli.args.day.as_deref(), Some("2025-01-15"));
    }
}
