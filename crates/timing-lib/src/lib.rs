//! Init container startup timing library
//!
//! This crate provides the core functionality for:
//! - Matching image pull events in kubelet event text
//! - Parsing pod status documents into init container timelines
//! - Reconciling pull-derived and timestamp-derived durations
//! - Structured logging of measurement runs

pub mod error;
pub mod events;
pub mod models;
pub mod observability;
pub mod pod;
pub mod reconciler;

pub use error::{Result, TimingError};
pub use events::{match_pull_event, scan_describe_output, ImagePullTable, PullEvent};
pub use models::*;
pub use observability::StructuredLogger;
pub use reconciler::reconcile;
