//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timing_lib::AggregatePolicy;

/// Settings for a measurement run
///
/// Merged from defaults, the config file and `INITLAT_*` environment
/// variables; command-line flags are applied on top by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Namespace of the measured pod
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name of the measured pod
    #[serde(default = "default_pod_name")]
    pub pod_name: String,

    /// Pod manifest used to recreate the pod
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Interval between "still waiting" progress logs
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum time to wait for deletion and for the Running phase
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Make the aggregate unknown if any container has an unknown total
    #[serde(default)]
    pub strict_aggregate: bool,

    /// Stop scanning describe output after this many distinct images
    #[serde(default)]
    pub event_limit: Option<usize>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_pod_name() -> String {
    "sample-pod".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("sample-pod.yaml")
}

fn default_poll_interval() -> u64 {
    5
}

fn default_wait_timeout() -> u64 {
    300
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            pod_name: default_pod_name(),
            manifest: default_manifest(),
            poll_interval_secs: default_poll_interval(),
            wait_timeout_secs: default_wait_timeout(),
            strict_aggregate: false,
            event_limit: None,
        }
    }
}

impl RunConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = Self::config_path() {
                    let default_path = default_path.to_string_lossy();
                    builder = builder.add_source(config::File::with_name(&default_path).required(false));
                }
            }
        }

        let config = builder
            .add_source(config::Environment::with_prefix("INITLAT"))
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Default config file location, without extension
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("initlat").join("config"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn aggregate_policy(&self) -> AggregatePolicy {
        if self.strict_aggregate {
            AggregatePolicy::RequireAll
        } else {
            AggregatePolicy::SkipUnknown
        }
    }
}

/// Get kubeconfig path
pub fn kubeconfig_path(override_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs_next::home_dir().map(|home| home.join(".kube").join("config"))
}
