//! Remote execution of filesystem commands through privileged pods
//!
//! [`RemoteExecutor::run_on_node`] is the only place the provisioner touches
//! a node's filesystem. Per call it:
//!
//! 1. creates one pod that mounts the given host path and runs the command,
//!    pinned to the node when one is given;
//! 2. polls the pod at a fixed interval up to a fixed ceiling;
//! 3. on `Succeeded` or `Failed`, deletes the pod once and reports the result.
//!
//! Reaching the ceiling is not an error. It yields
//! [`ExecutionState::Indeterminate`] and the caller decides what that means.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hostpath_core::ProvisionerConfig;
use hostpath_core::keys::{HOSTNAME_LABEL, MANAGED_BY_LABEL};
use hostpath_resilience::FixedInterval;
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, Pod, PodSpec, ResourceRequirements, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ExecutorError;
use crate::pods::PodApi;

/// Name of the helper container
pub const CONTAINER_NAME: &str = "busybox";

/// Name of the hostPath volume inside the helper pod
pub const VOLUME_NAME: &str = "hostpath-pv-dir";

/// hostPath type that creates the mount point when it is missing
pub const DIRECTORY_OR_CREATE: &str = "DirectoryOrCreate";

/// Lifecycle phase of an execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not all containers started
    Pending,
    /// Bound to a node and running
    Running,
    /// All containers exited with status zero
    Succeeded,
    /// At least one container failed
    Failed,
    /// Phase missing or not recognised
    Unknown,
}

impl PodPhase {
    /// Phase reported in a pod's status
    #[must_use]
    pub fn of(pod: &Pod) -> Self {
        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether the phase is final
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of reclaiming an execution unit.
///
/// Reclamation is attempted once per terminal observation and never turns
/// into the call's error: a leaked pod is logged and reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// The pod was deleted
    Reclaimed,
    /// Deleting the pod failed; it is left behind
    Leaked {
        /// Error returned by the delete call
        reason: String,
    },
    /// No terminal phase was observed, so nothing was deleted
    NotAttempted,
}

/// How a completed [`RemoteExecutor::run_on_node`] call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    /// The command ran to completion on `node`
    Succeeded,
    /// The poll ceiling was reached before a terminal phase was seen
    Indeterminate {
        /// Last phase observed, if any read succeeded
        last_phase: Option<PodPhase>,
    },
}

/// Report of a remote execution that did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Generated pod name
    pub pod: String,
    /// Node the pod was scheduled on, as last observed
    pub node: Option<String>,
    /// Terminal state, or lack of one
    pub state: ExecutionState,
    /// Reclamation result
    pub cleanup: Cleanup,
    /// Polls made
    pub attempts: u32,
}

impl Execution {
    /// Whether the command is known to have succeeded
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.state == ExecutionState::Succeeded
    }

    /// Node the command is known to have run on; `None` unless it succeeded
    #[must_use]
    pub fn confirmed_node(&self) -> Option<&str> {
        if self.is_succeeded() {
            self.node.as_deref().filter(|node| !node.is_empty())
        } else {
            None
        }
    }
}

/// Runs one command on one node through a short-lived privileged pod
#[derive(Clone)]
pub struct RemoteExecutor {
    pods: Arc<dyn PodApi>,
    config: Arc<ProvisionerConfig>,
}

impl fmt::Debug for RemoteExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("namespace", &self.config.namespace())
            .field("image", &self.config.helper_image())
            .finish_non_exhaustive()
    }
}

impl RemoteExecutor {
    /// Create an executor over `pods`
    pub fn new(pods: Arc<dyn PodApi>, config: Arc<ProvisionerConfig>) -> Self {
        Self { pods, config }
    }

    /// Configuration this executor runs with
    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Build the pod that runs `command` with `host_path` mounted at the same
    /// path, pinned to `node` when given.
    #[must_use]
    pub fn unit(&self, node: Option<&str>, host_path: &str, command: &[String]) -> Pod {
        let limits = BTreeMap::from([
            ("cpu".to_string(), Quantity("100m".to_string())),
            ("memory".to_string(), Quantity("64Mi".to_string())),
        ]);
        let requests = BTreeMap::from([
            ("cpu".to_string(), Quantity("15m".to_string())),
            ("memory".to_string(), Quantity("16Mi".to_string())),
        ]);

        Pod {
            metadata: ObjectMeta {
                generate_name: Some(format!("hostpath-provisioner-{}-", node.unwrap_or_default())),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    self.config.identity().to_string(),
                )])),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                restart_policy: Some("Never".to_string()),
                node_selector: node.map(|node| {
                    BTreeMap::from([(HOSTNAME_LABEL.to_string(), node.to_string())])
                }),
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: Some(self.config.helper_image().to_string()),
                    command: Some(command.to_vec()),
                    volume_mounts: Some(vec![VolumeMount {
                        name: VOLUME_NAME.to_string(),
                        mount_path: host_path.to_string(),
                        ..VolumeMount::default()
                    }]),
                    security_context: Some(SecurityContext {
                        run_as_user: Some(0),
                        ..SecurityContext::default()
                    }),
                    resources: Some(ResourceRequirements {
                        limits: Some(limits),
                        requests: Some(requests),
                        ..ResourceRequirements::default()
                    }),
                    ..Container::default()
                }],
                volumes: Some(vec![Volume {
                    name: VOLUME_NAME.to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: host_path.to_string(),
                        type_: Some(DIRECTORY_OR_CREATE.to_string()),
                    }),
                    ..Volume::default()
                }]),
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    /// Run `command` on `node` (or wherever the scheduler puts it) with
    /// `host_path` mounted.
    ///
    /// Failure to create the pod is returned immediately. Failed reads while
    /// polling are logged and polling continues. A `Failed` pod is an error;
    /// reaching the poll ceiling is not (see [`ExecutionState::Indeterminate`]).
    /// Cancellation stops polling promptly but never interrupts a create or
    /// delete call that is already in flight.
    #[instrument(skip(self, command, cancel), fields(node = node.unwrap_or("<any>")))]
    pub async fn run_on_node(
        &self,
        node: Option<&str>,
        host_path: &str,
        command: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Execution, ExecutorError> {
        let unit = self.unit(node, host_path, &command);
        let created = self
            .pods
            .create(&unit)
            .await
            .map_err(|source| ExecutorError::Dispatch { source })?;
        let pod = created.metadata.name.clone().ok_or(ExecutorError::Unnamed)?;
        debug!(
            namespace = created.metadata.namespace.as_deref().unwrap_or(self.config.namespace()),
            pod = %pod,
            ?command,
            "started pod"
        );

        let mut ticker = FixedInterval::new(*self.config.poll(), cancel.clone());
        let mut last_seen: Option<Pod> = None;

        loop {
            let attempt = match ticker.tick().await {
                Ok(Some(attempt)) => attempt,
                Ok(None) => break,
                Err(err) => {
                    info!(pod = %pod, error = %err, "stopped waiting for pod");
                    return Err(ExecutorError::Cancelled {
                        pod,
                        attempts: ticker.attempts(),
                    });
                }
            };
            debug!(attempt, pod = %pod, "waiting for pod");

            let observed = match self.pods.get(&pod).await {
                Ok(observed) => observed,
                Err(err) => {
                    error!(attempt, pod = %pod, error = %err, "failed to get pod");
                    continue;
                }
            };

            match PodPhase::of(&observed) {
                PodPhase::Succeeded => {
                    info!(pod = %pod, "pod completed");
                    let cleanup = self.reclaim(&pod).await;
                    return Ok(Execution {
                        node: node_name(&observed),
                        pod,
                        state: ExecutionState::Succeeded,
                        cleanup,
                        attempts: attempt,
                    });
                }
                PodPhase::Failed => {
                    info!(pod = %pod, "pod failed");
                    let cleanup = self.reclaim(&pod).await;
                    return Err(ExecutorError::Failed {
                        node: node_name(&observed),
                        pod,
                        cleanup,
                    });
                }
                phase => {
                    debug!(attempt, pod = %pod, %phase, "pod not finished");
                    last_seen = Some(observed);
                }
            }
        }

        let last_phase = last_seen.as_ref().map(PodPhase::of);
        warn!(
            pod = %pod,
            attempts = ticker.attempts(),
            budget = ?self.config.poll().budget(),
            ?last_phase,
            "pod did not finish within the poll budget"
        );
        Ok(Execution {
            node: node_name(last_seen.as_ref().unwrap_or(&created)),
            pod,
            state: ExecutionState::Indeterminate { last_phase },
            cleanup: Cleanup::NotAttempted,
            attempts: ticker.attempts(),
        })
    }

    /// Delete `pod`, logging instead of failing.
    async fn reclaim(&self, pod: &str) -> Cleanup {
        match self.pods.delete(pod).await {
            Ok(()) => Cleanup::Reclaimed,
            Err(err) => {
                warn!(pod = %pod, error = %err, "failed to delete pod");
                Cleanup::Leaked {
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn node_name(pod: &Pod) -> Option<String> {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .filter(|node| !node.is_empty())
}
