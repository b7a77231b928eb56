//! Creation of backing directories and their volume descriptors

use std::path::Path;
use std::sync::Arc;

use hostpath_core::{BackingPath, ProvisionerConfig, ProvisioningRequest};
use k8s_openapi::api::core::v1::PersistentVolume;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::descriptor;
use crate::error::{ProvisionError, ProvisioningState};
use crate::executor::{ExecutionState, RemoteExecutor};
use crate::pods::PodApi;

/// Mode the backing directory is created with
pub const DIRECTORY_MODE: &str = "0777";

/// A volume whose backing directory exists on `node`
#[derive(Debug, Clone)]
pub struct ProvisionedVolume {
    /// Descriptor to persist
    pub volume: PersistentVolume,
    /// Directory created on the node
    pub path: BackingPath,
    /// Node the directory was created on
    pub node: String,
    /// Always [`ProvisioningState::Finished`]; there is no background continuation
    pub state: ProvisioningState,
}

/// Creates backing directories for claims
#[derive(Debug, Clone)]
pub struct Provisioner {
    executor: RemoteExecutor,
}

impl Provisioner {
    /// Create a provisioner that executes through `pods`
    pub fn new(pods: Arc<dyn PodApi>, config: Arc<ProvisionerConfig>) -> Self {
        Self::with_executor(RemoteExecutor::new(pods, config))
    }

    /// Create a provisioner around an existing executor
    #[must_use]
    pub fn with_executor(executor: RemoteExecutor) -> Self {
        Self { executor }
    }

    /// Create the backing directory for `request` and describe the volume.
    ///
    /// The directory is created on the selected node, or on whichever node
    /// the scheduler picks when none was selected. The descriptor pins the
    /// volume to the node the command was observed to run on.
    #[instrument(skip_all, fields(claim = %request.claim_key(), volume = %request.volume_name))]
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedVolume, ProvisionError> {
        let config = self.executor.config();

        if request.capacity.is_none() {
            return Err(invalid(request, "claim has no storage request"));
        }
        let base_dir = config.base_dir_for(request);
        if !Path::new(base_dir).is_absolute() {
            return Err(invalid(
                request,
                format!("base directory {base_dir:?} is not absolute"),
            ));
        }

        let path = BackingPath::for_request(base_dir, request);
        let target = request.selected_node.as_deref().filter(|node| !node.is_empty());
        if target.is_none() {
            warn!(
                path = %path,
                "no node selected for claim; volume will be pinned to wherever the directory is created"
            );
        }

        let command = vec![
            "mkdir".to_string(),
            "-m".to_string(),
            DIRECTORY_MODE.to_string(),
            "-p".to_string(),
            path.as_str().to_string(),
        ];
        let execution = self
            .executor
            .run_on_node(target, base_dir, command, cancel)
            .await?;

        if let ExecutionState::Indeterminate { last_phase } = execution.state {
            return Err(ProvisionError::Indeterminate {
                pod: execution.pod,
                last_phase,
            });
        }
        let node = match execution.confirmed_node() {
            Some(node) => node.to_string(),
            None => return Err(ProvisionError::UnknownNode { pod: execution.pod }),
        };

        let policy = config.reclaim_policy_for(request.class_reclaim_policy);
        let volume = descriptor::build(request, &path, &node, policy, config.identity());
        info!(path = %path, node = %node, "created backing directory");

        Ok(ProvisionedVolume {
            volume,
            path,
            node,
            state: ProvisioningState::Finished,
        })
    }
}

fn invalid(request: &ProvisioningRequest, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidRequest {
        claim: request.claim_key(),
        reason: reason.into(),
    }
}
