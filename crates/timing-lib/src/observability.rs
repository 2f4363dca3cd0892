//! Structured logging for measurement runs
//!
//! Every significant step of a run is logged with a stable `event` field and
//! the pod it concerns, so JSON logs can be filtered per pod and per step.

use tracing::{info, warn};

use crate::events::ImagePullTable;
use crate::models::{PodTimeline, ReconciliationReport};

/// Structured logger for a single pod measurement
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
    pod_name: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }

    /// Log the start of a run
    pub fn log_run_started(&self, version: &str, mode: &str) {
        info!(
            event = "run_started",
            namespace = %self.namespace,
            pod_name = %self.pod_name,
            version = %version,
            mode = %mode,
            "Init container timing run started"
        );
    }

    /// Log a pod lifecycle action taken against the cluster
    pub fn log_pod_action(&self, action: &str) {
        info!(
            event = "pod_action",
            namespace = %self.namespace,
            pod_name = %self.pod_name,
            action = %action,
            "Pod action completed"
        );
    }

    /// Log the image pulls found in the pod's events
    pub fn log_pull_events(&self, pulls: &ImagePullTable) {
        if pulls.is_empty() {
            warn!(
                event = "pull_events_missing",
                namespace = %self.namespace,
                pod_name = %self.pod_name,
                "No image pull events found, pull latency will count as zero"
            );
            return;
        }

        for (image, latency) in pulls.iter() {
            info!(
                event = "pull_event_recorded",
                namespace = %self.namespace,
                pod_name = %self.pod_name,
                image = %image,
                pull_latency_ms = latency.as_millis(),
                "Image pull latency recorded"
            );
        }
    }

    /// Log the loaded pod timeline
    pub fn log_timeline(&self, timeline: &PodTimeline) {
        let incomplete = timeline
            .init_containers
            .iter()
            .filter(|c| c.started_at.is_none() || c.finished_at.is_none())
            .count();

        info!(
            event = "timeline_loaded",
            namespace = %self.namespace,
            pod_name = %self.pod_name,
            init_containers = timeline.init_containers.len(),
            incomplete_containers = incomplete,
            has_start_time = timeline.start_time.is_some(),
            "Pod timeline loaded"
        );
    }

    /// Log the outcome of a reconciliation
    pub fn log_report(&self, report: &ReconciliationReport) {
        let aggregate = &report.aggregate;

        if aggregate.rows_excluded > 0 {
            warn!(
                event = "rows_excluded",
                namespace = %self.namespace,
                pod_name = %self.pod_name,
                rows_excluded = aggregate.rows_excluded,
                policy = ?report.policy,
                "Some init containers have unknown totals"
            );
        }

        info!(
            event = "reconciliation_complete",
            namespace = %self.namespace,
            pod_name = %self.pod_name,
            rows = report.rows.len(),
            rows_included = aggregate.rows_included,
            sum_pull_adjusted_secs = aggregate.sum_pull_adjusted_secs,
            sum_formula_secs = aggregate.sum_formula_secs,
            relative_error_pct = ?aggregate.relative_error_pct,
            "Reconciliation complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AggregatePolicy;
    use crate::reconciler::reconcile;

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("default", "sample-pod");
        assert_eq!(logger.namespace, "default");
        assert_eq!(logger.pod_name, "sample-pod");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = StructuredLogger::new("default", "sample-pod");
        let timeline = PodTimeline::default();
        let pulls = ImagePullTable::new();

        logger.log_run_started("0.1.0", "analyze");
        logger.log_pull_events(&pulls);
        logger.log_timeline(&timeline);
        logger.log_report(&reconcile(&timeline, &pulls, AggregatePolicy::SkipUnknown));
    }
}
