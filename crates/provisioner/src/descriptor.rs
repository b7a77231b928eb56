//! PersistentVolume descriptors for provisioned volumes

use std::collections::BTreeMap;

use hostpath_core::keys::{HOSTNAME_LABEL, IDENTITY_ANNOTATION, STORAGE_RESOURCE};
use hostpath_core::{BackingPath, ProvisioningRequest, ReclaimPolicy};
use k8s_openapi::api::core::v1::{
    HostPathVolumeSource, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm,
    PersistentVolume, PersistentVolumeSpec, VolumeNodeAffinity,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::executor::DIRECTORY_OR_CREATE;

/// Affinity operator used for node pinning
pub const OPERATOR_IN: &str = "In";

/// Describe a provisioned volume.
///
/// The result carries the identity annotation, the requested capacity and
/// access modes, a hostPath source at `path` and a required node affinity
/// with exactly one term pinning the volume to `node`.
#[must_use]
pub fn build(
    request: &ProvisioningRequest,
    path: &BackingPath,
    node: &str,
    reclaim_policy: ReclaimPolicy,
    identity: &str,
) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(request.volume_name.clone()),
            annotations: Some(BTreeMap::from([(
                IDENTITY_ANNOTATION.to_string(),
                identity.to_string(),
            )])),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some(reclaim_policy.as_str().to_string()),
            access_modes: Some(request.access_modes.clone()),
            capacity: request
                .capacity
                .clone()
                .map(|quantity| BTreeMap::from([(STORAGE_RESOURCE.to_string(), quantity)])),
            host_path: Some(HostPathVolumeSource {
                path: path.as_str().to_string(),
                type_: Some(DIRECTORY_OR_CREATE.to_string()),
            }),
            node_affinity: Some(node_affinity(node)),
            ..PersistentVolumeSpec::default()
        }),
        ..PersistentVolume::default()
    }
}

fn node_affinity(node: &str) -> VolumeNodeAffinity {
    VolumeNodeAffinity {
        required: Some(NodeSelector {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: Some(vec![NodeSelectorRequirement {
                    key: HOSTNAME_LABEL.to_string(),
                    operator: OPERATOR_IN.to_string(),
                    values: Some(vec![node.to_string()]),
                }]),
                ..NodeSelectorTerm::default()
            }],
        }),
    }
}

/// Read-side accessors over volumes this provisioner describes
pub trait VolumeDescriptorExt {
    /// Value of the identity annotation, if present
    fn ownership_tag(&self) -> Option<&str>;

    /// Node the volume is pinned to.
    ///
    /// Only the shape written by [`build`] is recognised: the first term's
    /// first expression, keyed on the hostname label with operator `In` and
    /// exactly one non-empty value.
    fn owner_node(&self) -> Option<&str>;

    /// hostPath source path, if the volume has one
    fn backing_path(&self) -> Option<BackingPath>;
}

impl VolumeDescriptorExt for PersistentVolume {
    fn ownership_tag(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()?
            .get(IDENTITY_ANNOTATION)
            .map(String::as_str)
    }

    fn owner_node(&self) -> Option<&str> {
        let term = self
            .spec
            .as_ref()?
            .node_affinity
            .as_ref()?
            .required
            .as_ref()?
            .node_selector_terms
            .first()?;
        let expression = term.match_expressions.as_ref()?.first()?;
        if expression.key != HOSTNAME_LABEL || expression.operator != OPERATOR_IN {
            return None;
        }
        match expression.values.as_deref()? {
            [node] if !node.is_empty() => Some(node.as_str()),
            _ => None,
        }
    }

    fn backing_path(&self) -> Option<BackingPath> {
        let source = self.spec.as_ref()?.host_path.as_ref()?;
        Some(BackingPath::from_host_path(source.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn request() -> ProvisioningRequest {
        ProvisioningRequest::new("pv-001", "a", "c1")
            .with_capacity("1Gi")
            .with_access_modes(["ReadWriteOnce"])
    }

    fn volume() -> PersistentVolume {
        let path = BackingPath::for_request("/data", &request());
        build(&request(), &path, "node-a", ReclaimPolicy::Delete, "node-y")
    }

    #[test]
    fn describes_request_and_pins_node() {
        let pv = volume();

        assert_eq!(pv.metadata.name.as_deref(), Some("pv-001"));
        assert_eq!(pv.ownership_tag(), Some("node-y"));
        assert_eq!(pv.owner_node(), Some("node-a"));
        assert_eq!(
            pv.backing_path().map(String::from).as_deref(),
            Some("/data/a-c1-pv-001")
        );

        let spec = pv.spec.unwrap();
        assert_eq!(spec.persistent_volume_reclaim_policy.as_deref(), Some("Delete"));
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
        assert_eq!(spec.capacity.unwrap()[STORAGE_RESOURCE].0, "1Gi");
        assert_eq!(
            spec.node_affinity.unwrap().required.unwrap().node_selector_terms.len(),
            1
        );
    }

    fn with_expression(key: &str, operator: &str, values: &[&str]) -> PersistentVolume {
        let mut pv = volume();
        let terms = &mut pv
            .spec
            .as_mut()
            .unwrap()
            .node_affinity
            .as_mut()
            .unwrap()
            .required
            .as_mut()
            .unwrap()
            .node_selector_terms;
        terms[0].match_expressions = Some(vec![NodeSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: Some(values.iter().map(ToString::to_string).collect()),
        }]);
        pv
    }

    #[rstest]
    #[case::wrong_key("topology.kubernetes.io/zone", "In", &["node-a"])]
    #[case::wrong_operator(HOSTNAME_LABEL, "NotIn", &["node-a"])]
    #[case::no_values(HOSTNAME_LABEL, "In", &[])]
    #[case::two_values(HOSTNAME_LABEL, "In", &["node-a", "node-b"])]
    #[case::empty_value(HOSTNAME_LABEL, "In", &[""])]
    fn malformed_affinity_has_no_owner(
        #[case] key: &str,
        #[case] operator: &str,
        #[case] values: &[&str],
    ) {
        assert_eq!(with_expression(key, operator, values).owner_node(), None);
    }

    #[test]
    fn missing_affinity_has_no_owner() {
        let mut pv = volume();
        pv.spec.as_mut().unwrap().node_affinity = None;
        assert_eq!(pv.owner_node(), None);

        pv.spec = None;
        assert_eq!(pv.owner_node(), None);
        assert_eq!(pv.backing_path(), None);
    }

    #[test]
    fn unannotated_volume_has_no_tag() {
        let mut pv = volume();
        pv.metadata.annotations = None;
        assert_eq!(pv.ownership_tag(), None);
    }
}
