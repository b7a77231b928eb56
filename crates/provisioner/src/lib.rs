//! # Hostpath Provisioner
//!
//! Creates and removes hostPath-backed volumes on specific nodes using nothing
//! but short-lived privileged pods.
//!
//! ## Components
//!
//! - [`RemoteExecutor`]: run one filesystem command on one node through a pod,
//!   wait for it with a bounded, cancellable poll and always reclaim it once a
//!   terminal phase is seen
//! - [`Provisioner`]: derive the backing path, create it remotely and describe
//!   the result as a node-pinned `PersistentVolume`
//! - [`Deprovisioner`]: check ownership, find the node from the volume's
//!   affinity and remove the backing directory remotely
//! - [`PodApi`]: the create/get/delete capability the executor runs on,
//!   implemented by [`ClusterPods`] and, with the `testing` feature, by an
//!   in-memory double
//!
//! No component keeps mutable state between calls; everything shared is the
//! read-only [`ProvisionerConfig`](hostpath_core::ProvisionerConfig).

pub mod deprovisioner;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod pods;
pub mod provisioner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use deprovisioner::{DeleteOutcome, Deprovisioner};
pub use descriptor::VolumeDescriptorExt;
pub use error::{DeprovisionError, ExecutorError, ProvisionError, ProvisioningState};
pub use executor::{Cleanup, Execution, ExecutionState, PodPhase, RemoteExecutor};
pub use pods::{ClusterPods, PodApi};
pub use provisioner::{ProvisionedVolume, Provisioner};
