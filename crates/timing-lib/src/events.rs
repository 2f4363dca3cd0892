//! Image pull event matching
//!
//! Extracts image pull latencies from kubelet event text, either from the
//! `Events` section of `kubectl describe pod` output or from individual event
//! messages fetched through the API.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::models::{normalize_image, PullLatency};

/// Header that opens the events section of `kubectl describe` output
const EVENTS_HEADER: &str = "Events";

const PULL_EVENT_PATTERN: &str =
    r#"Successfully pulled image "([^"]+)" in ([\d.]+(?:ms|s)) \(([\d.]+(?:ms|s)) including waiting\)"#;

static PULL_EVENT_RE: OnceLock<Regex> = OnceLock::new();

fn pull_event_re() -> &'static Regex {
    PULL_EVENT_RE.get_or_init(|| Regex::new(PULL_EVENT_PATTERN).expect("pull event pattern is valid"))
}

/// A successful image pull reported by the kubelet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullEvent {
    /// Image reference exactly as it appears in the event
    pub image_reference: String,
    /// Pull time excluding time spent waiting for other pulls
    pub pull_latency: PullLatency,
    /// Pull time including waiting; informational only, unknown if unparsable
    pub pull_latency_including_wait: Option<PullLatency>,
}

/// Match a single line of event text against the successful-pull message
///
/// Returns `None` if the line does not report a pull or its pull latency is
/// not a valid number. A malformed wait latency alone keeps the event.
pub fn match_pull_event(line: &str) -> Option<PullEvent> {
    let caps = pull_event_re().captures(line)?;

    let image_reference = caps.get(1)?.as_str().to_string();
    let pull_latency = match caps[2].parse::<PullLatency>() {
        Ok(latency) => latency,
        Err(e) => {
            debug!(error = %e, line = %line, "Ignoring pull event with unparsable latency");
            return None;
        }
    };
    let pull_latency_including_wait = match caps[3].parse::<PullLatency>() {
        Ok(latency) => Some(latency),
        Err(e) => {
            debug!(error = %e, line = %line, "Unparsable wait latency in pull event");
            None
        }
    };

    Some(PullEvent {
        image_reference,
        pull_latency,
        pull_latency_including_wait,
    })
}

/// Pull latency per normalized image reference
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePullTable {
    latencies: BTreeMap<String, PullLatency>,
}

impl ImagePullTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pull event; a later event for the same image replaces the earlier one
    pub fn insert(&mut self, event: &PullEvent) {
        let image = normalize_image(&event.image_reference);
        debug!(image = %image, latency = %event.pull_latency, "Recorded image pull");
        self.latencies.insert(image, event.pull_latency);
    }

    /// Latency for an image, looked up after normalization
    pub fn get(&self, image: &str) -> Option<PullLatency> {
        self.latencies.get(&normalize_image(image)).copied()
    }

    /// Latency for an image, or zero if no pull was recorded
    pub fn latency_or_zero(&self, image: &str) -> PullLatency {
        self.get(image).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PullLatency)> {
        self.latencies.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }

    /// Build a table from event messages given in chronological order
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for message in messages {
            if let Some(event) = match_pull_event(message.as_ref().trim()) {
                table.insert(&event);
            }
        }
        table
    }
}

/// Scan `kubectl describe pod` output for image pull events
///
/// Only lines after the first line containing `Events` are considered.
/// Scanning stops early once `limit` distinct images have been recorded.
pub fn scan_describe_output(text: &str, limit: Option<usize>) -> ImagePullTable {
    let mut table = ImagePullTable::new();
    let mut lines = text.lines();

    if !lines.any(|line| line.contains(EVENTS_HEADER)) {
        debug!("No Events section found in describe output");
        return table;
    }

    for line in lines {
        if limit.is_some_and(|max| table.len() >= max) {
            break;
        }
        if let Some(event) = match_pull_event(line.trim()) {
            table.insert(&event);
        }
    }

    table
}
