//! Provisioning requests handed over by the control loop

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::keys::PV_DIR_PARAMETER;
use crate::policy::ReclaimPolicy;

/// Everything the provisioner needs to know about one claim.
///
/// Produced by the control loop from a claim and its storage class; never
/// mutated by the provisioner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningRequest {
    /// Name the resulting volume must carry
    pub volume_name: String,
    /// Namespace of the claim
    pub claim_namespace: String,
    /// Name of the claim
    pub claim_name: String,
    /// Requested storage quantity, copied into the volume capacity
    pub capacity: Option<Quantity>,
    /// Access modes requested by the claim, copied verbatim
    pub access_modes: Vec<String>,
    /// Storage-class parameters
    pub parameters: BTreeMap<String, String>,
    /// Reclaim policy declared by the storage class, if any
    pub class_reclaim_policy: Option<ReclaimPolicy>,
    /// Node chosen by the scheduler for the first consumer, if any
    pub selected_node: Option<String>,
}

impl ProvisioningRequest {
    /// Create a request for `volume_name` backing claim `namespace/claim_name`
    pub fn new(
        volume_name: impl Into<String>,
        claim_namespace: impl Into<String>,
        claim_name: impl Into<String>,
    ) -> Self {
        Self {
            volume_name: volume_name.into(),
            claim_namespace: claim_namespace.into(),
            claim_name: claim_name.into(),
            ..Self::default()
        }
    }

    /// Set the requested capacity
    pub fn with_capacity(mut self, capacity: impl Into<String>) -> Self {
        self.capacity = Some(Quantity(capacity.into()));
        self
    }

    /// Set the requested access modes
    pub fn with_access_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access_modes = modes.into_iter().map(Into::into).collect();
        self
    }

    /// Add a storage-class parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set the reclaim policy declared by the storage class
    pub fn with_class_reclaim_policy(mut self, policy: ReclaimPolicy) -> Self {
        self.class_reclaim_policy = Some(policy);
        self
    }

    /// Pin the request to a node selected upstream
    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.selected_node = Some(node.into());
        self
    }

    /// Base directory override from the storage class, if present
    #[must_use]
    pub fn pv_dir_override(&self) -> Option<&str> {
        self.parameters.get(PV_DIR_PARAMETER).map(String::as_str)
    }

    /// `namespace/name` of the claim, for logs
    #[must_use]
    pub fn claim_key(&self) -> String {
        format!("{}/{}", self.claim_namespace, self.claim_name)
    }
}
