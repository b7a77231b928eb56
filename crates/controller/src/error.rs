//! Control-loop errors

use hostpath_core::ConfigError;
use hostpath_provisioner::{DeprovisionError, ProvisionError};
use thiserror::Error;

/// Result alias for reconcilers
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that make a reconciliation retry
#[derive(Debug, Error)]
pub enum Error {
    /// A call to the API server failed
    #[error("kubernetes API call failed: {0}")]
    Kube(#[from] kube::Error),

    /// Provisioning a claim failed
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Deprovisioning a volume failed
    #[error(transparent)]
    Deprovision(#[from] DeprovisionError),

    /// The claim's storage class does not exist
    #[error("storage class {0} not found")]
    MissingClass(String),

    /// The claim or its class cannot be turned into a request
    #[error("claim {claim} cannot be provisioned: {reason}")]
    InvalidClaim {
        /// `namespace/name` of the claim
        claim: String,
        /// What is wrong with it
        reason: String,
    },

    /// The storage class declares a reclaim policy that is not recognised
    #[error(transparent)]
    ReclaimPolicy(#[from] ConfigError),
}
