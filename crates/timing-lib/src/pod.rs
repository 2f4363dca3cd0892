//! Pod status document parsing
//!
//! Reads the output of `kubectl get pod -o yaml` (or `-o json`) into a
//! [`PodTimeline`]. Absent fields become unknown; present timestamps that
//! fail to parse abort with [`TimingError::MalformedTimestamp`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TimingError};
use crate::models::{ContainerTiming, PodTimeline};

/// Placeholder for a missing container name or image
const UNKNOWN: &str = "unknown";

#[derive(Debug, Default, Deserialize)]
struct PodDocument {
    #[serde(default)]
    status: Option<PodStatusDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatusDoc {
    start_time: Option<String>,
    #[serde(default)]
    init_container_statuses: Vec<InitContainerStatusDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct InitContainerStatusDoc {
    name: Option<String>,
    image: Option<String>,
    state: Option<ContainerStateDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerStateDoc {
    terminated: Option<TerminatedDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerminatedDoc {
    started_at: Option<String>,
    finished_at: Option<String>,
}

/// Parse an RFC 3339 timestamp, naming the field on failure
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| TimingError::MalformedTimestamp {
            field: field.to_string(),
            value: value.to_string(),
            source,
        })
}

fn parse_optional(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(field, v)).transpose()
}

impl PodTimeline {
    /// Parse a pod manifest with status, as YAML or JSON
    pub fn from_document(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let doc: Option<PodDocument> = serde_yaml::from_str(text)?;
        let status = doc.and_then(|d| d.status).unwrap_or_default();

        let start_time = parse_optional("status.startTime", status.start_time.as_deref())?;

        let init_containers = status
            .init_container_statuses
            .into_iter()
            .enumerate()
            .map(|(index, c)| -> Result<ContainerTiming> {
                let terminated = c.state.and_then(|s| s.terminated).unwrap_or_default();
                let prefix = format!("status.initContainerStatuses[{}].state.terminated", index);

                let started_at = parse_optional(
                    &format!("{}.startedAt", prefix),
                    terminated.started_at.as_deref(),
                )?;
                let finished_at = parse_optional(
                    &format!("{}.finishedAt", prefix),
                    terminated.finished_at.as_deref(),
                )?;

                Ok(ContainerTiming::new(
                    c.name.unwrap_or_else(|| UNKNOWN.to_string()),
                    c.image.as_deref().unwrap_or(UNKNOWN),
                    started_at,
                    finished_at,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            init_containers = init_containers.len(),
            has_start_time = start_time.is_some(),
            "Parsed pod status document"
        );

        Ok(Self::new(start_time, init_containers))
    }

    /// Read and parse a pod status document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TimingError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_document(&text)
    }
}
