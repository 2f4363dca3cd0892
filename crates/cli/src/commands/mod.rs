//! CLI command implementations

pub mod analyze;
pub mod live;
pub mod render;
