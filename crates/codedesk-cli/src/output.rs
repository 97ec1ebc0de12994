//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use codedesk_api_models::{ActionKind, OverviewCounters, UsagePolicy};
use codedesk_console::{
    ActionOutcome, Column, Page, Record, RecordStatus, RowActions, columns_for, outcome_message,
};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// One table row with the actions the console offers for it.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RowView {
    pub(crate) record: Record,
    pub(crate) status: RecordStatus,
    pub(crate) actions: RowActions,
    pub(crate) visibility: Option<ActionKind>,
}

#[derive(Serialize)]
struct PageView<'a> {
    filter: String,
    page: u32,
    page_count: u32,
    total_count: u64,
    rows: &'a [RowView],
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_page(page: &Page, rows: &[RowView], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&PageView {
            filter: page.filter.to_string(),
            page: page.page_index + 1,
            page_count: page.page_count,
            total_count: page.total_count,
            rows,
        }),
        OutputFormat::Table => {
            let columns = columns_for(page.filter);
            let header: Vec<String> = columns
                .iter()
                .map(|column| format!("{:<width$}", column.label(), width = column_width(*column)))
                .collect();
            println!("{}", header.join(" ").trim_end());
            for row in rows {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|column| {
                        format!(
                            "{:<width$}",
                            format_cell(*column, row),
                            width = column_width(*column)
                        )
                    })
                    .collect();
                println!("{}", cells.join(" ").trim_end());
            }
            println!(
                "page {} of {} ({} codes, filter {})",
                page.page_index + 1,
                page.page_count.max(1),
                page.total_count,
                page.filter
            );
            Ok(())
        }
    }
}

pub(crate) fn render_overview(overview: &OverviewCounters, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(overview),
        OutputFormat::Table => {
            println!("coupon: {}", overview.coupon_id);
            println!("available: {}", overview.is_available);
            println!("usage policy: {}", usage_policy_label(overview));
            println!(
                "unassigned: {} of {} codes",
                overview.unassigned_codes, overview.total_codes
            );
            println!("redemptions used: {}", overview.redemptions_used);
            Ok(())
        }
    }
}

pub(crate) fn render_outcome(outcome: &ActionOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Table => {
            println!("{}", outcome_message(outcome));
            for error in &outcome.errors {
                let subject = error
                    .code
                    .as_ref()
                    .map(ToString::to_string)
                    .or_else(|| error.email.clone())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {subject}: {}", error.message);
            }
            Ok(())
        }
    }
}

pub(crate) fn format_cell(column: Column, row: &RowView) -> String {
    let record = &row.record;
    match column {
        Column::Code => record.id.to_string(),
        Column::Redemptions => {
            format!("{}/{}", record.redemptions.used, record.redemptions.total)
        }
        Column::AssignmentsRemaining => match row.actions {
            RowActions::Assign { remaining_uses } => remaining_uses.to_string(),
            _ => "0".to_string(),
        },
        Column::AssignedTo => record.assigned_to.clone().unwrap_or_else(|| "-".into()),
        Column::RedeemedBy => record.redeemed_by.clone().unwrap_or_else(|| "-".into()),
        Column::Status => status_label(row.status).to_string(),
        Column::Actions => {
            let mut kinds: Vec<&str> = row
                .actions
                .kinds()
                .into_iter()
                .map(ActionKind::as_str)
                .collect();
            if let Some(kind) = row.visibility {
                kinds.push(kind.as_str());
            }
            if kinds.is_empty() {
                "-".to_string()
            } else {
                kinds.join(",")
            }
        }
    }
}

const fn column_width(column: Column) -> usize {
    match column {
        Column::Code => 20,
        Column::Redemptions => 12,
        Column::AssignmentsRemaining => 10,
        Column::AssignedTo | Column::RedeemedBy => 32,
        Column::Status => 20,
        Column::Actions => 0,
    }
}

pub(crate) const fn status_label(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Unassigned => "unassigned",
        RecordStatus::Assigned => "assigned",
        RecordStatus::PartiallyRedeemed => "partially redeemed",
        RecordStatus::Redeemed => "redeemed",
    }
}

const fn usage_policy_label(overview: &OverviewCounters) -> &'static str {
    match overview.usage_policy {
        UsagePolicy::SingleUse => "single use",
        UsagePolicy::OncePerCustomer => "once per customer",
        UsagePolicy::MultiUse => "multi use",
    }
}
