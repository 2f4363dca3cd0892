//! Offline analysis of saved kubectl output

use anyhow::{Context, Result};
use std::path::Path;
use timing_lib::{reconcile, scan_describe_output, ImagePullTable, PodTimeline, StructuredLogger};

use super::render::{print_pulls, print_report};
use crate::config::RunConfig;
use crate::output::OutputFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn read_pulls(events: &Path, limit: Option<usize>) -> Result<ImagePullTable> {
    let text = std::fs::read_to_string(events)
        .with_context(|| format!("Failed to read events file {}", events.display()))?;
    Ok(scan_describe_output(&text, limit))
}

/// Reconcile a saved `kubectl get pod -o yaml` against saved `kubectl describe pod` output
pub fn analyze(
    config: &RunConfig,
    pod_status: &Path,
    events: &Path,
    format: OutputFormat,
) -> Result<()> {
    let logger = StructuredLogger::new(&config.namespace, &config.pod_name);
    logger.log_run_started(VERSION, "analyze");

    let pulls = read_pulls(events, config.event_limit)?;
    logger.log_pull_events(&pulls);

    let timeline = PodTimeline::from_file(pod_status)
        .with_context(|| format!("Failed to load pod status from {}", pod_status.display()))?;
    logger.log_timeline(&timeline);

    let report = reconcile(&timeline, &pulls, config.aggregate_policy());
    logger.log_report(&report);

    print_report(&report, &pulls, format)
}

/// Show the image pulls found in saved `kubectl describe pod` output
pub fn show_events(config: &RunConfig, events: &Path, format: OutputFormat) -> Result<()> {
    let pulls = read_pulls(events, config.event_limit)?;
    print_pulls(&pulls, format)
}
