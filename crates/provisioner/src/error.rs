//! Error types for remote execution, provisioning and deprovisioning

use thiserror::Error;

use crate::executor::{Cleanup, PodPhase};

/// How the control loop should treat a provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    /// The attempt is over; success or failure is final for this call
    Finished,
    /// The outcome is unknown; the next attempt must use the same inputs
    InBackground,
}

/// Errors from [`RemoteExecutor::run_on_node`](crate::RemoteExecutor::run_on_node)
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The execution unit could not be created at all
    #[error("failed to create pod: {source}")]
    Dispatch {
        /// API error from the create call
        #[source]
        source: kube::Error,
    },

    /// The API accepted the unit but returned it without a name to poll
    #[error("created pod has no name")]
    Unnamed,

    /// The unit reached the `Failed` phase
    #[error("pod failed: {pod}")]
    Failed {
        /// Name of the failed pod
        pod: String,
        /// Node the pod ran on, if it was scheduled
        node: Option<String>,
        /// What happened when the pod was reclaimed
        cleanup: Cleanup,
    },

    /// The caller's cancellation token fired while polling
    #[error("stopped waiting for pod {pod} after {attempts} poll(s): cancelled")]
    Cancelled {
        /// Name of the pod that was being polled
        pod: String,
        /// Polls made before cancellation
        attempts: u32,
    },
}

impl ExecutorError {
    /// Name of the pod involved, when one was created
    #[must_use]
    pub fn pod(&self) -> Option<&str> {
        match self {
            Self::Dispatch { .. } | Self::Unnamed => None,
            Self::Failed { pod, .. } | Self::Cancelled { pod, .. } => Some(pod),
        }
    }
}

/// Errors from [`Provisioner::provision`](crate::Provisioner::provision)
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The request cannot be turned into a volume
    #[error("invalid provisioning request for {claim}: {reason}")]
    InvalidRequest {
        /// `namespace/name` of the claim
        claim: String,
        /// What is wrong with it
        reason: String,
    },

    /// Creating the backing directory failed
    #[error("failed to create backing directory: {0}")]
    Execution(#[from] ExecutorError),

    /// The helper pod never reached a terminal phase within the poll budget
    #[error("timed out waiting for pod {pod} to create the backing directory (last phase: {last_phase:?})")]
    Indeterminate {
        /// Name of the pod
        pod: String,
        /// Last phase observed, if any read succeeded
        last_phase: Option<PodPhase>,
    },

    /// The helper pod succeeded but reported no node to pin the volume to
    #[error("pod {pod} succeeded without reporting a node")]
    UnknownNode {
        /// Name of the pod
        pod: String,
    },
}

impl ProvisionError {
    /// Classify the failure for the control loop.
    ///
    /// Only outcomes that leave the directory in an unknown state ask for a
    /// retry with identical inputs; everything else is a finished failure.
    #[must_use]
    pub fn state(&self) -> ProvisioningState {
        match self {
            Self::Indeterminate { .. } | Self::Execution(ExecutorError::Cancelled { .. }) => {
                ProvisioningState::InBackground
            }
            Self::InvalidRequest { .. } | Self::Execution(_) | Self::UnknownNode { .. } => {
                ProvisioningState::Finished
            }
        }
    }
}

/// Errors from [`Deprovisioner::deprovision`](crate::Deprovisioner::deprovision)
#[derive(Debug, Error)]
pub enum DeprovisionError {
    /// The volume carries no ownership annotation at all
    #[error("identity annotation not found on volume {volume}")]
    MissingIdentity {
        /// Volume name
        volume: String,
    },

    /// The volume has no hostPath source to remove
    #[error("volume {volume} has no hostPath source")]
    MissingHostPath {
        /// Volume name
        volume: String,
    },

    /// The caller's cancellation token fired while polling
    #[error("removal of {volume} cancelled: {source}")]
    Cancelled {
        /// Volume name
        volume: String,
        /// Executor error carrying the pod name
        #[source]
        source: ExecutorError,
    },
}
