//! Kubernetes client for pod lifecycle operations
//!
//! Wraps the handful of API calls a measurement run needs: recreating the
//! pod, waiting for it to start, and reading back its events and init
//! container statuses.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;
use timing_lib::{ContainerTiming, ImagePullTable, PodTimeline};
use tracing::{debug, info};

/// Phase reported once every init container has completed
const RUNNING_PHASE: &str = "Running";

/// Client for a single namespace
pub struct PodClient {
    pods: Api<Pod>,
    events: Api<Event>,
    namespace: String,
}

impl PodClient {
    /// Create a new client, from an explicit kubeconfig if one exists
    pub async fn connect(kubeconfig: Option<&Path>, namespace: &str) -> Result<Self> {
        let config = match kubeconfig.filter(|path| path.exists()) {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Invalid kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        debug!(namespace = %namespace, "Connected to Kubernetes API");

        Ok(Self {
            pods: Api::namespaced(client.clone(), namespace),
            events: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        })
    }

    /// Fetch a pod, or `None` if it does not exist
    pub async fn get(&self, name: &str) -> Result<Option<Pod>> {
        self.pods
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get pod {}/{}", self.namespace, name))
    }

    /// Delete a pod if it exists and wait until it is gone
    ///
    /// Returns whether a pod was deleted.
    pub async fn delete_if_exists(&self, name: &str, timeout: Duration) -> Result<bool> {
        let Some(existing) = self.get(name).await? else {
            debug!(pod = %name, "No existing pod to delete");
            return Ok(false);
        };
        let uid = existing.metadata.uid.unwrap_or_default();

        self.pods
            .delete(name, &DeleteParams::default())
            .await
            .with_context(|| format!("Failed to delete pod {}/{}", self.namespace, name))?;
        info!(pod = %name, "Deleting existing pod");

        let deleted = await_condition(self.pods.clone(), name, conditions::is_deleted(&uid));
        tokio::time::timeout(timeout, deleted)
            .await
            .with_context(|| format!("Timed out waiting for pod {} to be deleted", name))?
            .context("Failed while watching pod deletion")?;

        Ok(true)
    }

    /// Create a pod in this client's namespace
    pub async fn create(&self, pod: &Pod) -> Result<Pod> {
        let mut pod = pod.clone();
        pod.metadata.namespace = Some(self.namespace.clone());

        let created = self
            .pods
            .create(&PostParams::default(), &pod)
            .await
            .with_context(|| format!("Failed to create pod in {}", self.namespace))?;
        info!(pod = ?created.metadata.name, "Created pod");
        Ok(created)
    }

    /// Wait until the pod reaches the Running phase
    pub async fn wait_until_running(
        &self,
        name: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Pod> {
        let running = await_condition(self.pods.clone(), name, is_running);
        tokio::pin!(running);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                result = &mut running => {
                    let pod = result.context("Failed while watching pod phase")?;
                    return pod.with_context(|| format!("Pod {} disappeared while waiting", name));
                }
                _ = ticker.tick() => {
                    info!(pod = %name, "Waiting for pod to become Running");
                }
                _ = &mut deadline => {
                    bail!(
                        "Timed out after {}s waiting for pod {} to become Running",
                        timeout.as_secs(),
                        name
                    );
                }
            }
        }
    }

    /// Collect image pull latencies from the pod's events, oldest first
    pub async fn pull_events(&self, pod: &Pod) -> Result<ImagePullTable> {
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        let mut selector = format!("involvedObject.kind=Pod,involvedObject.name={}", name);
        if let Some(uid) = &pod.metadata.uid {
            selector.push_str(&format!(",involvedObject.uid={}", uid));
        }

        let mut events = self
            .events
            .list(&ListParams::default().fields(&selector))
            .await
            .with_context(|| format!("Failed to list events for pod {}", name))?
            .items;
        events.sort_by_key(event_time);
        debug!(pod = %name, count = events.len(), "Fetched pod events");

        Ok(ImagePullTable::from_messages(
            events.iter().filter_map(|e| e.message.as_deref()),
        ))
    }
}

fn is_running(pod: Option<&Pod>) -> bool {
    pod.and_then(|p| p.status.as_ref())
        .and_then(|s| s.phase.as_deref())
        == Some(RUNNING_PHASE)
}

/// Best available timestamp for ordering events
fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

/// Read a pod manifest, optionally overriding its name
pub fn load_manifest(path: &Path, name_override: Option<&str>) -> Result<Pod> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut pod: Pod = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse pod manifest {}", path.display()))?;

    if let Some(name) = name_override {
        pod.metadata.name = Some(name.to_string());
    }
    if pod.metadata.name.is_none() {
        bail!("Pod manifest {} has no metadata.name", path.display());
    }

    Ok(pod)
}

/// Convert a pod's status into a timeline, in init container declaration order
pub fn timeline_from_pod(pod: &Pod) -> PodTimeline {
    let Some(status) = pod.status.as_ref() else {
        return PodTimeline::default();
    };

    let declared: Vec<(&str, Option<&str>)> = pod
        .spec
        .as_ref()
        .and_then(|s| s.init_containers.as_ref())
        .map(|containers| {
            containers
                .iter()
                .map(|c| (c.name.as_str(), c.image.as_deref()))
                .collect()
        })
        .unwrap_or_default();

    let mut statuses: Vec<_> = status.init_container_statuses.iter().flatten().collect();
    // statuses without a spec entry keep their relative order at the end
    statuses.sort_by_key(|s| {
        declared
            .iter()
            .position(|(name, _)| *name == s.name)
            .unwrap_or(usize::MAX)
    });

    let init_containers = statuses
        .into_iter()
        .map(|s| {
            let terminated = s.state.as_ref().and_then(|state| state.terminated.as_ref());
            // pull events name the image as declared, not the runtime's resolved reference
            let image = declared
                .iter()
                .find(|(name, _)| *name == s.name)
                .and_then(|(_, image)| *image)
                .unwrap_or(s.image.as_str());
            ContainerTiming::new(
                s.name.clone(),
                image,
                terminated.and_then(|t| t.started_at.as_ref()).map(|t| t.0),
                terminated.and_then(|t| t.finished_at.as_ref()).map(|t| t.0),
            )
        })
        .collect();

    PodTimeline::new(status.start_time.as_ref().map(|t| t.0), init_containers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: sample-pod
spec:
  initContainers:
    - name: init-first
      image: busybox:latest
      command: ["sh", "-c", "sleep 2"]
    - name: init-second
      image: alpine:3.19
      command: ["sh", "-c", "sleep 3"]
  containers:
    - name: app
      image: nginx
"#;

    fn pod_with_status(status: serde_json::Value) -> Pod {
        let mut pod: Pod = serde_yaml::from_str(MANIFEST).unwrap();
        pod.status = Some(serde_json::from_value(status).unwrap());
        pod
    }

    #[test]
    fn test_timeline_follows_spec_order() {
        let pod = pod_with_status(serde_json::json!({
            "phase": "Running",
            "startTime": "2024-05-01T10:00:00Z",
            "initContainerStatuses": [
                {"name": "init-second", "image": "alpine:3.19", "imageID": "", "ready": true,
                 "restartCount": 0,
                 "state": {"terminated": {"exitCode": 0,
                    "startedAt": "2024-05-01T10:00:08Z", "finishedAt": "2024-05-01T10:00:11Z"}}},
                {"name": "init-first", "image": "docker.io/library/busybox:latest", "imageID": "",
                 "ready": true, "restartCount": 0,
                 "state": {"terminated": {"exitCode": 0,
                    "startedAt": "2024-05-01T10:00:03Z", "finishedAt": "2024-05-01T10:00:05Z"}}}
            ]
        }));

        let timeline = timeline_from_pod(&pod);
        let names: Vec<_> = timeline.init_containers.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, ["init-first", "init-second"]);
        assert_eq!(timeline.init_containers[0].image, "busybox");
        assert_eq!(timeline.init_containers[1].image, "alpine:3.19");
        assert!(timeline.start_time.is_some());
        assert!(timeline.init_containers[1].finished_at.is_some());
    }

    #[test]
    fn test_declared_image_matches_pull_event() {
        let pod = pod_with_status(serde_json::json!({
            "phase": "Running",
            "startTime": "2024-05-01T10:00:00Z",
            "initContainerStatuses": [
                {"name": "init-first", "image": "docker.io/library/busybox:latest", "imageID": "",
                 "ready": true, "restartCount": 0,
                 "state": {"terminated": {"exitCode": 0,
                    "startedAt": "2024-05-01T10:00:04Z", "finishedAt": "2024-05-01T10:00:09Z"}}}
            ]
        }));
        let pulls = ImagePullTable::from_messages([
            r#"Successfully pulled image "busybox:latest" in 3.1s (3.1s including waiting)"#,
        ]);

        let report = timing_lib::reconcile(
            &timeline_from_pod(&pod),
            &pulls,
            timing_lib::AggregatePolicy::SkipUnknown,
        );
        let row = &report.rows[0];

        assert_eq!(row.pull_secs, 4.0);
        assert_eq!(row.pull_adjusted_secs, Some(9.0));
        assert_eq!(row.formula_secs, Some(9.0));
        assert_eq!(row.relative_error_pct, Some(0.0));
    }

    #[test]
    fn test_status_image_used_without_spec_entry() {
        let pod = pod_with_status(serde_json::json!({
            "initContainerStatuses": [
                {"name": "injected", "image": "docker.io/istio/proxyv2:1.20", "imageID": "",
                 "ready": true, "restartCount": 0}
            ]
        }));

        let timeline = timeline_from_pod(&pod);
        assert_eq!(timeline.init_containers[0].image, "docker.io/istio/proxyv2:1.20");
    }

    #[test]
    fn test_timeline_with_running_init_container() {
        let pod = pod_with_status(serde_json::json!({
            "phase": "Pending",
            "initContainerStatuses": [
                {"name": "init-first", "image": "busybox", "imageID": "", "ready": false,
                 "restartCount": 0,
                 "state": {"running": {"startedAt": "2024-05-01T10:00:03Z"}}}
            ]
        }));

        let timeline = timeline_from_pod(&pod);

        assert!(timeline.start_time.is_none());
        assert!(timeline.init_containers[0].started_at.is_none());
        assert!(timeline.init_containers[0].finished_at.is_none());
    }

    #[test]
    fn test_timeline_without_status() {
        let pod: Pod = serde_yaml::from_str(MANIFEST).unwrap();
        assert!(timeline_from_pod(&pod).init_containers.is_empty());
    }

    #[test]
    fn test_is_running() {
        let running = pod_with_status(serde_json::json!({"phase": "Running"}));
        let pending = pod_with_status(serde_json::json!({"phase": "Pending"}));

        assert!(is_running(Some(&running)));
        assert!(!is_running(Some(&pending)));
        assert!(!is_running(None));
    }

    #[test]
    fn test_event_time_prefers_last_timestamp() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "e1", "creationTimestamp": "2024-05-01T09:00:00Z"},
            "involvedObject": {},
            "lastTimestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        let fallback: Event = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "e2", "creationTimestamp": "2024-05-01T09:00:00Z"},
            "involvedObject": {}
        }))
        .unwrap();

        assert_eq!(event_time(&event).unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(event_time(&fallback).unwrap().to_rfc3339(), "2024-05-01T09:00:00+00:00");
    }

    #[test]
    fn test_load_manifest_with_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let pod = load_manifest(file.path(), None).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("sample-pod"));

        let renamed = load_manifest(file.path(), Some("timing-probe")).unwrap();
        assert_eq!(renamed.metadata.name.as_deref(), Some("timing-probe"));
    }

    #[test]
    fn test_load_manifest_without_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"apiVersion: v1\nkind: Pod\nmetadata: {}\n").unwrap();

        assert!(load_manifest(file.path(), None).is_err());
    }
}
