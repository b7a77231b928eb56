//! Removal of backing directories for released volumes

use std::sync::Arc;

use hostpath_core::ProvisionerConfig;
use k8s_openapi::api::core::v1::PersistentVolume;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::descriptor::VolumeDescriptorExt;
use crate::error::{DeprovisionError, ExecutorError};
use crate::executor::{ExecutionState, RemoteExecutor};
use crate::pods::PodApi;

/// How a deprovisioning call ended.
///
/// Every variant except [`DeleteOutcome::Ignored`] means the caller may go on
/// and delete the volume object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The backing directory was removed
    Removed,
    /// Removing the backing directory failed; the directory may be left behind
    RemovalFailed {
        /// What went wrong
        reason: String,
    },
    /// The removal pod did not finish within the poll budget
    RemovalUnconfirmed {
        /// Name of the pod, which may still complete
        pod: String,
    },
    /// The volume does not say which node holds its directory
    NoTarget,
    /// The volume belongs to another provisioner instance; leave it alone
    Ignored {
        /// Ownership tag found on the volume
        reason: String,
    },
}

impl DeleteOutcome {
    /// Whether the caller should delete the volume object
    #[must_use]
    pub fn releases_volume(&self) -> bool {
        !matches!(self, Self::Ignored { .. })
    }
}

/// Removes backing directories of volumes this instance provisioned
#[derive(Debug, Clone)]
pub struct Deprovisioner {
    executor: RemoteExecutor,
}

impl Deprovisioner {
    /// Create a deprovisioner that executes through `pods`
    pub fn new(pods: Arc<dyn PodApi>, config: Arc<ProvisionerConfig>) -> Self {
        Self::with_executor(RemoteExecutor::new(pods, config))
    }

    /// Create a deprovisioner around an existing executor
    #[must_use]
    pub fn with_executor(executor: RemoteExecutor) -> Self {
        Self { executor }
    }

    /// Remove the backing directory of `volume`.
    ///
    /// Ownership is checked before anything else, and no pod is created
    /// unless the volume names exactly one node. Removal failures are
    /// reported in the outcome rather than as errors so a broken node cannot
    /// hold the volume object forever.
    #[instrument(skip_all, fields(volume = volume.metadata.name.as_deref().unwrap_or_default()))]
    pub async fn deprovision(
        &self,
        volume: &PersistentVolume,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, DeprovisionError> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let identity = self.executor.config().identity();

        let tag = volume
            .ownership_tag()
            .ok_or_else(|| DeprovisionError::MissingIdentity {
                volume: name.clone(),
            })?;
        if tag != identity {
            warn!(tag, identity, "volume belongs to another provisioner; ignoring");
            return Ok(DeleteOutcome::Ignored {
                reason: format!("identity annotation {tag:?} does not match {identity:?}"),
            });
        }

        let Some(node) = volume.owner_node() else {
            warn!("volume has no usable node affinity; nothing to remove");
            return Ok(DeleteOutcome::NoTarget);
        };
        let path = volume
            .backing_path()
            .ok_or_else(|| DeprovisionError::MissingHostPath {
                volume: name.clone(),
            })?;

        let command = vec!["rm".to_string(), "-rf".to_string(), path.as_str().to_string()];
        match self
            .executor
            .run_on_node(Some(node), &path.parent(), command, cancel)
            .await
        {
            Ok(execution) => match execution.state {
                ExecutionState::Succeeded => {
                    info!(path = %path, node, "removed backing directory");
                    Ok(DeleteOutcome::Removed)
                }
                ExecutionState::Indeterminate { .. } => {
                    warn!(path = %path, node, pod = %execution.pod, "removal not confirmed");
                    Ok(DeleteOutcome::RemovalUnconfirmed { pod: execution.pod })
                }
            },
            Err(source @ ExecutorError::Cancelled { .. }) => {
                Err(DeprovisionError::Cancelled { volume: name, source })
            }
            Err(err) => {
                warn!(path = %path, node, error = %err, "failed to remove backing directory");
                Ok(DeleteOutcome::RemovalFailed {
                    reason: err.to_string(),
                })
            }
        }
    }
}
