//! Well-known label, annotation and parameter keys.

/// Node label matched by execution-unit node selectors and volume affinity.
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Annotation carrying the identity of the provisioner instance that created a volume.
pub const IDENTITY_ANNOTATION: &str = "hostPathProvisionerIdentity";

/// Label put on every execution unit, valued with the provisioner identity.
pub const MANAGED_BY_LABEL: &str = "k8s.hostpath.io/managed-by";

/// Storage-class parameter overriding the base directory.
pub const PV_DIR_PARAMETER: &str = "pvDir";

/// Annotation the volume controller uses to record which provisioner created a volume.
pub const PROVISIONED_BY_ANNOTATION: &str = "pv.kubernetes.io/provisioned-by";

/// Annotation the scheduler sets on a claim once a consumer has been placed.
pub const SELECTED_NODE_ANNOTATION: &str = "volume.kubernetes.io/selected-node";

/// Resource name of storage capacity in claim requests and volume capacity.
pub const STORAGE_RESOURCE: &str = "storage";

/// Default provisioner name that storage classes refer to.
pub const DEFAULT_PROVISIONER_NAME: &str = "k8s.canonical.com/hostpath";
