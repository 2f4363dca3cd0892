//! Init-container timing reconciliation
//!
//! Compares two estimates of how long each init container took:
//! - pull-adjusted: image pull latency (rounded up to whole seconds) plus the
//!   container's own run time
//! - formula-based: gap between this container's finish and the previous
//!   container's finish (or the pod start, for the first container)
//!
//! The relative error of each row is measured against the pull-adjusted
//! total. Unknown inputs propagate to unknown outputs; division by a zero
//! total yields unknown rather than infinity.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::events::ImagePullTable;
use crate::models::{
    Aggregate, AggregatePolicy, PodTimeline, ReconciliationReport, ReconciliationRow,
};


/// Seconds elapsed from `from` to `to`; negative if `to` is earlier
fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

fn elapsed(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    Some(secs_between(from?, to?))
}

/// `|reference - other| / reference * 100`, unknown when `reference` is zero
pub fn relative_error(reference: f64, other: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((reference - other).abs() / reference * 100.0)
}

/// Reconcile pull-derived and timestamp-derived durations for every init container
pub fn reconcile(
    timeline: &PodTimeline,
    pulls: &ImagePullTable,
    policy: AggregatePolicy,
) -> ReconciliationReport {
    let mut rows = Vec::with_capacity(timeline.init_containers.len());
    let mut aggregate = Aggregate::default();
    let mut previous_finish: Option<DateTime<Utc>> = None;

    for (index, container) in timeline.init_containers.iter().enumerate() {
        let observed_secs = elapsed(container.started_at, container.finished_at);

        let pull_secs = pulls.latency_or_zero(&container.image).ceil_secs();
        let pull_adjusted_secs = observed_secs.map(|observed| pull_secs + observed);

        let anchor = if index == 0 {
            timeline.start_time
        } else {
            previous_finish
        };
        let formula_secs = elapsed(anchor, container.finished_at);

        let relative_error_pct = match (pull_adjusted_secs, formula_secs) {
            (Some(pull_adjusted), Some(formula)) => relative_error(pull_adjusted, formula),
            _ => None,
        };

        match (pull_adjusted_secs, formula_secs) {
            (Some(pull_adjusted), Some(formula)) => {
                aggregate.sum_pull_adjusted_secs += pull_adjusted;
                aggregate.sum_formula_secs += formula;
                aggregate.rows_included += 1;
            }
            _ => aggregate.rows_excluded += 1,
        }

        debug!(
            container = %container.name,
            image = %container.image,
            observed_secs = ?observed_secs,
            pull_adjusted_secs = ?pull_adjusted_secs,
            formula_secs = ?formula_secs,
            relative_error_pct = ?relative_error_pct,
            "Reconciled init container"
        );

        rows.push(ReconciliationRow {
            name: container.name.clone(),
            image: container.image.clone(),
            started_at: container.started_at,
            finished_at: container.finished_at,
            observed_secs,
            pull_secs,
            pull_adjusted_secs,
            formula_secs,
            relative_error_pct,
        });

        previous_finish = container.finished_at;
    }

    aggregate.relative_error_pct = match policy {
        AggregatePolicy::RequireAll if aggregate.rows_excluded > 0 => None,
        _ => relative_error(aggregate.sum_pull_adjusted_secs, aggregate.sum_formula_secs),
    };

    ReconciliationReport {
        pod_start_time: timeline.start_time,
        policy,
        rows,
        aggregate,
    }
}
