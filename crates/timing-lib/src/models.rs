//! Core data models for init-container timing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimingError;

/// Tag suffix dropped from image references before lookup
const LATEST_TAG: &str = ":latest";

/// Strip a trailing `:latest` tag so `nginx:latest` and `nginx` compare equal
pub fn normalize_image(image: &str) -> String {
    image.strip_suffix(LATEST_TAG).unwrap_or(image).to_string()
}

/// Image pull latency reported by the kubelet, held in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct PullLatency {
    millis: f64,
}

impl PullLatency {
    pub fn from_millis(millis: f64) -> Self {
        Self { millis }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self {
            millis: secs * 1000.0,
        }
    }

    pub fn as_millis(&self) -> f64 {
        self.millis
    }

    /// Latency rounded up to whole seconds
    pub fn ceil_secs(&self) -> f64 {
        (self.millis / 1000.0).ceil()
    }
}

impl FromStr for PullLatency {
    type Err = TimingError;

    /// Parse `812ms` or `2.4s` (no space between value and unit)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimingError::InvalidDuration(s.to_string());

        let (value, to_millis) = if let Some(v) = s.strip_suffix("ms") {
            (v, 1.0)
        } else if let Some(v) = s.strip_suffix('s') {
            (v, 1000.0)
        } else {
            return Err(invalid());
        };

        if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(invalid());
        }

        let value: f64 = value.parse().map_err(|_| invalid())?;
        Ok(Self::from_millis(value * to_millis))
    }
}

impl fmt::Display for PullLatency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis < 1000.0 {
            write!(f, "{}ms", self.millis)
        } else {
            write!(f, "{}s", self.millis / 1000.0)
        }
    }
}

/// Lifecycle timestamps of one init container, in pod spec order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerTiming {
    pub name: String,
    /// Image reference with `:latest` already stripped
    pub image: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ContainerTiming {
    pub fn new(
        name: impl Into<String>,
        image: &str,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            image: normalize_image(image),
            started_at,
            finished_at,
        }
    }
}

/// Pod start time plus its init containers in declaration order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PodTimeline {
    pub start_time: Option<DateTime<Utc>>,
    pub init_containers: Vec<ContainerTiming>,
}

impl PodTimeline {
    pub fn new(start_time: Option<DateTime<Utc>>, init_containers: Vec<ContainerTiming>) -> Self {
        Self {
            start_time,
            init_containers,
        }
    }
}

/// How the aggregate treats rows that have an unknown total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatePolicy {
    /// Rows with any unknown total are left out of both sums
    #[default]
    SkipUnknown,
    /// A single row with an unknown total makes the aggregate unknown
    RequireAll,
}

/// Reconciled timing for a single init container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub name: String,
    pub image: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Seconds the container ran (finish - start)
    pub observed_secs: Option<f64>,
    /// Seconds spent pulling, rounded up to whole seconds
    pub pull_secs: f64,
    /// Pull time plus observed run time
    pub pull_adjusted_secs: Option<f64>,
    /// Gap since the previous finish (or pod start for the first container)
    pub formula_secs: Option<f64>,
    /// Divergence between the two totals, in percent of the pull-adjusted total
    pub relative_error_pct: Option<f64>,
}

/// Sums over all rows that entered the aggregate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub sum_pull_adjusted_secs: f64,
    pub sum_formula_secs: f64,
    pub rows_included: usize,
    pub rows_excluded: usize,
    pub relative_error_pct: Option<f64>,
}

/// Full result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub pod_start_time: Option<DateTime<Utc>>,
    pub policy: AggregatePolicy,
    pub rows: Vec<ReconciliationRow>,
    pub aggregate: Aggregate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_image_strips_latest_only() {
        assert_eq!(normalize_image("nginx:latest"), "nginx");
        assert_eq!(normalize_image("nginx"), "nginx");
        assert_eq!(normalize_image("repo/img:1.2"), "repo/img:1.2");
        assert_eq!(normalize_image("latest"), "latest");
    }

    #[test]
    fn test_parse_seconds_latency() {
        let latency: PullLatency = "2.5s".parse().unwrap();
        assert_eq!(latency.as_millis(), 2500.0);
        assert_eq!(latency.ceil_secs(), 3.0);
    }

    #[test]
    fn test_parse_millis_latency() {
        let latency: PullLatency = "812ms".parse().unwrap();
        assert_eq!(latency.as_millis(), 812.0);
        assert_eq!(latency.ceil_secs(), 1.0);
    }

    #[test]
    fn test_whole_seconds_not_rounded_up() {
        let latency: PullLatency = "3s".parse().unwrap();
        assert_eq!(latency.ceil_secs(), 3.0);
        assert_eq!(PullLatency::default().ceil_secs(), 0.0);
    }

    #[test]
    fn test_parse_rejects_bad_durations() {
        for input in ["", "s", "ms", "12", "1.2.3s", "5 s", "-1s", "1m"] {
            assert!(
                input.parse::<PullLatency>().is_err(),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_latency_display() {
        assert_eq!(PullLatency::from_millis(812.0).to_string(), "812ms");
        assert_eq!(PullLatency::from_secs(1.2).to_string(), "1.2s");
    }

    #[test]
    fn test_container_timing_normalizes_image() {
        let timing = ContainerTiming::new("init-a", "busybox:latest", None, None);
        assert_eq!(timing.image, "busybox");
    }
}
