//! Live measurement against a cluster

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use std::path::Path;
use timing_lib::{reconcile, StructuredLogger};
use tracing::warn;

use super::render::print_report;
use crate::client::{load_manifest, timeline_from_pod, PodClient};
use crate::config::RunConfig;
use crate::output::{print_info, print_success, OutputFormat};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Recreate the pod from its manifest, wait for it to start and report its init timing
///
/// With `keep_existing`, a pod that already exists is measured as-is.
pub async fn run(
    config: &RunConfig,
    kubeconfig: Option<&Path>,
    keep_existing: bool,
    format: OutputFormat,
) -> Result<()> {
    let manifest = load_manifest(&config.manifest, Some(&config.pod_name))?;
    let logger = StructuredLogger::new(&config.namespace, &config.pod_name);
    logger.log_run_started(VERSION, "run");

    let client = PodClient::connect(kubeconfig, &config.namespace).await?;
    let name = config.pod_name.as_str();

    let existing = if keep_existing {
        client.get(name).await?
    } else {
        if client.delete_if_exists(name, config.wait_timeout()).await? {
            logger.log_pod_action("deleted");
        }
        None
    };

    if existing.is_none() {
        client.create(&manifest).await?;
        logger.log_pod_action("created");
        if matches!(format, OutputFormat::Table) {
            print_info(&format!("Created pod {}, waiting for it to become Running...", name));
        }
    }

    let pod = client
        .wait_until_running(name, config.poll_interval(), config.wait_timeout())
        .await?;
    logger.log_pod_action("running");
    if matches!(format, OutputFormat::Table) {
        print_success(&format!("Pod {} is Running", name));
        println!();
    }

    measure(&client, &logger, &pod, config, format).await
}

/// Report init timing for a pod that already exists
pub async fn report(config: &RunConfig, kubeconfig: Option<&Path>, format: OutputFormat) -> Result<()> {
    let logger = StructuredLogger::new(&config.namespace, &config.pod_name);
    logger.log_run_started(VERSION, "report");

    let client = PodClient::connect(kubeconfig, &config.namespace).await?;
    let pod = client
        .get(&config.pod_name)
        .await?
        .with_context(|| format!("Pod {}/{} not found", config.namespace, config.pod_name))?;

    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    if phase != Some("Running") {
        warn!(pod = %config.pod_name, phase = ?phase, "Pod is not Running, init timing may be incomplete");
    }

    measure(&client, &logger, &pod, config, format).await
}

async fn measure(
    client: &PodClient,
    logger: &StructuredLogger,
    pod: &Pod,
    config: &RunConfig,
    format: OutputFormat,
) -> Result<()> {
    let pulls = client.pull_events(pod).await?;
    logger.log_pull_events(&pulls);

    let timeline = timeline_from_pod(pod);
    logger.log_timeline(&timeline);

    let report = reconcile(&timeline, &pulls, config.aggregate_policy());
    logger.log_report(&report);

    print_report(&report, &pulls, format)
}
