//! Rendering of reconciliation results

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use timing_lib::{ImagePullTable, ReconciliationReport};

use crate::output::{
    color_error, format_percent, format_secs, format_timestamp, print_warning, OutputFormat,
};

/// Row for the per-container timing table
#[derive(Tabled)]
struct TimingRow {
    #[tabled(rename = "Container Name")]
    name: String,
    #[tabled(rename = "Start Time")]
    started_at: String,
    #[tabled(rename = "Finish Time")]
    finished_at: String,
    #[tabled(rename = "Duration (s)")]
    observed: String,
    #[tabled(rename = "Total Duration (s)")]
    pull_adjusted: String,
    #[tabled(rename = "Total Duration Using Formula (s)")]
    formula: String,
    #[tabled(rename = "Relative Error (%)")]
    relative_error: String,
}

/// Row for the image pull table
#[derive(Tabled)]
struct PullRow {
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Pull Latency")]
    latency: String,
    #[tabled(rename = "Rounded (s)")]
    rounded: String,
}

/// JSON document for a full run
#[derive(Serialize)]
struct ReportOutput<'a> {
    image_pulls: &'a ImagePullTable,
    #[serde(flatten)]
    report: &'a ReconciliationReport,
}

fn pull_table(pulls: &ImagePullTable) -> String {
    let rows: Vec<PullRow> = pulls
        .iter()
        .map(|(image, latency)| PullRow {
            image: image.to_string(),
            latency: latency.to_string(),
            rounded: format_secs(Some(latency.ceil_secs())),
        })
        .collect();

    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}

/// Print the image pulls parsed from event text
pub fn print_pulls(pulls: &ImagePullTable, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(pulls)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if pulls.is_empty() {
                print_warning("No image pull events found");
                return Ok(());
            }
            println!("{}", pull_table(pulls));
        }
    }

    Ok(())
}

/// Print a reconciliation report with the image pulls it was based on
pub fn print_report(
    report: &ReconciliationReport,
    pulls: &ImagePullTable,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = ReportOutput {
                image_pulls: pulls,
                report,
            };
            let json = serde_json::to_string_pretty(&output)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Image Pull Times".bold());
            println!("{}", "=".repeat(60));
            if pulls.is_empty() {
                print_warning("No image pull events found, pull latency counts as 0");
            } else {
                println!("{}", pull_table(pulls));
            }
            println!();

            println!(
                "Pod Start Time: {}",
                format_timestamp(report.pod_start_time).cyan()
            );
            println!();

            if report.rows.is_empty() {
                print_warning("Pod has no init container statuses");
                return Ok(());
            }

            let rows: Vec<TimingRow> = report
                .rows
                .iter()
                .map(|r| TimingRow {
                    name: r.name.clone(),
                    started_at: format_timestamp(r.started_at),
                    finished_at: format_timestamp(r.finished_at),
                    observed: format_secs(r.observed_secs),
                    pull_adjusted: format_secs(r.pull_adjusted_secs),
                    formula: format_secs(r.formula_secs),
                    relative_error: color_error(r.relative_error_pct),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let aggregate = &report.aggregate;
            if aggregate.rows_excluded > 0 {
                print_warning(&format!(
                    "{} of {} init containers have unknown totals ({:?} policy)",
                    aggregate.rows_excluded,
                    report.rows.len(),
                    report.policy
                ));
            }

            println!(
                "\n{} {} %",
                "Total Relative Error:".bold(),
                format_percent(aggregate.relative_error_pct)
            );
        }
    }

    Ok(())
}
