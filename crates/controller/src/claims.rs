//! Claim reconciliation: provision volumes for pending claims

use std::collections::BTreeMap;
use std::sync::Arc;

use hostpath_core::keys::{
    PROVISIONED_BY_ANNOTATION, SELECTED_NODE_ANNOTATION, STORAGE_RESOURCE,
};
use hostpath_core::{ProvisioningRequest, ReclaimPolicy};
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::PostParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::context::{Context, Failures};
use crate::error::{Error, Result};

/// Binding mode that defers provisioning until a consumer is scheduled
pub const WAIT_FOR_FIRST_CONSUMER: &str = "WaitForFirstConsumer";

/// Failure-counter key for a claim.
///
/// Keyed by uid, so a claim recreated under the same name starts afresh.
pub fn failure_key(claim: &PersistentVolumeClaim) -> String {
    match claim.metadata.uid.as_deref() {
        Some(uid) => format!("claim:{uid}"),
        None => format!("claim:{}", claim_key(claim)),
    }
}

fn claim_key(claim: &PersistentVolumeClaim) -> String {
    format!(
        "{}/{}",
        claim.namespace().unwrap_or_default(),
        claim.name_any()
    )
}

/// Name of the volume provisioned for `claim`
pub fn volume_name_for(claim: &PersistentVolumeClaim) -> Option<String> {
    claim.metadata.uid.as_ref().map(|uid| format!("pvc-{uid}"))
}

/// Whether `claim` is still waiting for a volume
pub fn is_unbound(claim: &PersistentVolumeClaim) -> bool {
    let pending = claim
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .is_none_or(|phase| phase == "Pending");
    let bound = claim
        .spec
        .as_ref()
        .and_then(|spec| spec.volume_name.as_deref())
        .is_some_and(|name| !name.is_empty());
    pending && !bound && claim.metadata.deletion_timestamp.is_none()
}

/// Drop the failure count of a claim that is bound or being deleted.
///
/// Returns whether the claim is settled and needs no provisioning.
pub fn forget_if_settled(failures: &Failures, claim: &PersistentVolumeClaim) -> bool {
    if is_unbound(claim) {
        return false;
    }
    failures.clear(&failure_key(claim));
    true
}

/// Selected node annotation, if the scheduler has placed a consumer
pub fn selected_node(claim: &PersistentVolumeClaim) -> Option<&str> {
    claim
        .annotations()
        .get(SELECTED_NODE_ANNOTATION)
        .map(String::as_str)
        .filter(|node| !node.is_empty())
}

/// Whether `class` is ready to be acted on for `claim`
pub fn waits_for_consumer(claim: &PersistentVolumeClaim, class: &StorageClass) -> bool {
    class.volume_binding_mode.as_deref() == Some(WAIT_FOR_FIRST_CONSUMER)
        && selected_node(claim).is_none()
}

/// Turn a claim and its class into a provisioning request
pub fn request_for(
    claim: &PersistentVolumeClaim,
    class: &StorageClass,
    volume_name: &str,
) -> Result<ProvisioningRequest> {
    let key = claim_key(claim);
    let spec = claim.spec.as_ref().ok_or_else(|| Error::InvalidClaim {
        claim: key.clone(),
        reason: "claim has no spec".to_string(),
    })?;

    let capacity = spec
        .resources
        .as_ref()
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get(STORAGE_RESOURCE))
        .cloned()
        .ok_or_else(|| Error::InvalidClaim {
            claim: key,
            reason: "claim has no storage request".to_string(),
        })?;

    let class_reclaim_policy = class
        .reclaim_policy
        .as_deref()
        .map(str::parse::<ReclaimPolicy>)
        .transpose()?;

    let mut request = ProvisioningRequest::new(
        volume_name,
        claim.namespace().unwrap_or_default(),
        claim.name_any(),
    );
    request.capacity = Some(capacity);
    request.access_modes = spec.access_modes.clone().unwrap_or_default();
    request.parameters = class.parameters.clone().unwrap_or_default();
    request.class_reclaim_policy = class_reclaim_policy;
    request.selected_node = selected_node(claim).map(ToString::to_string);
    Ok(request)
}

/// Bind a provisioned volume to `claim` and record who created it
pub fn complete_volume(
    mut volume: PersistentVolume,
    claim: &PersistentVolumeClaim,
    class: &StorageClass,
    provisioner_name: &str,
) -> PersistentVolume {
    volume
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(
            PROVISIONED_BY_ANNOTATION.to_string(),
            provisioner_name.to_string(),
        );

    let spec = volume.spec.get_or_insert_with(Default::default);
    spec.claim_ref = Some(ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("PersistentVolumeClaim".to_string()),
        namespace: claim.namespace(),
        name: Some(claim.name_any()),
        uid: claim.metadata.uid.clone(),
        resource_version: claim.metadata.resource_version.clone(),
        ..ObjectReference::default()
    });
    spec.storage_class_name = Some(class.name_any());
    spec.mount_options = class.mount_options.clone();
    spec.volume_mode = claim.spec.as_ref().and_then(|spec| spec.volume_mode.clone());
    volume
}

/// Provision a volume for `claim` if it is ours and still unbound
#[instrument(skip_all, fields(claim = %claim_key(&claim)))]
pub async fn reconcile(claim: Arc<PersistentVolumeClaim>, ctx: Arc<Context>) -> Result<Action> {
    if forget_if_settled(ctx.failures(), &claim) {
        return Ok(Action::await_change());
    }
    let key = failure_key(&claim);
    let Some(class_name) = claim
        .spec
        .as_ref()
        .and_then(|spec| spec.storage_class_name.clone())
    else {
        debug!("claim names no storage class");
        return Ok(Action::await_change());
    };

    let classes = Api::<StorageClass>::all(ctx.client().clone());
    let class = classes
        .get_opt(&class_name)
        .await?
        .ok_or(Error::MissingClass(class_name))?;
    if class.provisioner != ctx.config().provisioner_name {
        return Ok(Action::await_change());
    }
    if waits_for_consumer(&claim, &class) {
        debug!("waiting for a consumer to be scheduled");
        return Ok(Action::await_change());
    }

    if ctx.failures().exhausted(&key) {
        debug!("retry threshold reached; not provisioning");
        return Ok(Action::await_change());
    }

    let volume_name = volume_name_for(&claim).ok_or_else(|| Error::InvalidClaim {
        claim: claim_key(&claim),
        reason: "claim has no uid".to_string(),
    })?;
    let volumes = Api::<PersistentVolume>::all(ctx.client().clone());
    if volumes.get_opt(&volume_name).await?.is_some() {
        debug!(volume = %volume_name, "volume already exists");
        return Ok(Action::await_change());
    }

    let request = request_for(&claim, &class, &volume_name)?;
    let provisioned = ctx
        .provisioner()
        .provision(&request, ctx.cancel_token())
        .await?;

    let volume = complete_volume(
        provisioned.volume,
        &claim,
        &class,
        &ctx.config().provisioner_name,
    );
    match volumes.create(&PostParams::default(), &volume).await {
        Ok(_) => info!(volume = %volume_name, node = %provisioned.node, "provisioned volume"),
        Err(kube::Error::Api(response)) if response.code == 409 => {
            debug!(volume = %volume_name, "volume created concurrently");
        }
        Err(err) => return Err(err.into()),
    }
    ctx.failures().clear(&key);
    Ok(Action::await_change())
}

/// Requeue a failed claim at the resync period until the threshold is hit
pub fn error_policy(claim: Arc<PersistentVolumeClaim>, err: &Error, ctx: Arc<Context>) -> Action {
    let name = claim_key(&claim);
    if let Error::Provision(provision) = err {
        warn!(claim = %name, state = ?provision.state(), error = %err, "provisioning failed");
    }

    let failures = ctx.failures().record(&failure_key(&claim));
    if failures >= ctx.config().failed_retry_threshold {
        error!(claim = %name, failures, error = %err, "giving up on claim");
        Action::await_change()
    } else {
        Action::requeue(ctx.config().resync_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        PersistentVolumeClaimSpec, PersistentVolumeClaimStatus, ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn claim() -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("c1".into()),
                namespace: Some("a".into()),
                uid: Some("1234".into()),
                resource_version: Some("7".into()),
                annotations: Some(BTreeMap::from([(
                    SELECTED_NODE_ANNOTATION.to_string(),
                    "node-a".to_string(),
                )])),
                ..ObjectMeta::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".into()]),
                storage_class_name: Some("hostpath".into()),
                resources: Some(ResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        STORAGE_RESOURCE.to_string(),
                        Quantity("1Gi".into()),
                    )])),
                    ..ResourceRequirements::default()
                }),
                ..PersistentVolumeClaimSpec::default()
            }),
            status: Some(PersistentVolumeClaimStatus {
                phase: Some("Pending".into()),
                ..PersistentVolumeClaimStatus::default()
            }),
        }
    }

    fn class() -> StorageClass {
        StorageClass {
            metadata: ObjectMeta {
                name: Some("hostpath".into()),
                ..ObjectMeta::default()
            },
            provisioner: "k8s.canonical.com/hostpath".into(),
            reclaim_policy: Some("Retain".into()),
            volume_binding_mode: Some(WAIT_FOR_FIRST_CONSUMER.into()),
            parameters: Some(BTreeMap::from([("pvDir".to_string(), "/fast".to_string())])),
            mount_options: Some(vec!["noatime".into()]),
            ..StorageClass::default()
        }
    }

    #[test]
    fn request_carries_claim_and_class() {
        let request = request_for(&claim(), &class(), "pvc-1234").unwrap();

        assert_eq!(request.volume_name, "pvc-1234");
        assert_eq!(request.claim_key(), "a/c1");
        assert_eq!(request.capacity, Some(Quantity("1Gi".into())));
        assert_eq!(request.access_modes, vec!["ReadWriteOnce".to_string()]);
        assert_eq!(request.pv_dir_override(), Some("/fast"));
        assert_eq!(request.class_reclaim_policy, Some(ReclaimPolicy::Retain));
        assert_eq!(request.selected_node.as_deref(), Some("node-a"));
    }

    #[test]
    fn missing_storage_request_is_invalid() {
        let mut claim = claim();
        claim.spec.as_mut().unwrap().resources = None;
        assert!(matches!(
            request_for(&claim, &class(), "pvc-1234"),
            Err(Error::InvalidClaim { .. })
        ));
    }

    #[test]
    fn unknown_class_policy_is_rejected() {
        let mut class = class();
        class.reclaim_policy = Some("Shred".into());
        assert!(matches!(
            request_for(&claim(), &class, "pvc-1234"),
            Err(Error::ReclaimPolicy(_))
        ));
    }

    #[test]
    fn recreated_claim_starts_with_no_failures() {
        let failures = Failures::new(5);
        let original = claim();
        for _ in 0..5 {
            failures.record(&failure_key(&original));
        }
        assert!(failures.exhausted(&failure_key(&original)));

        let mut recreated = claim();
        recreated.metadata.uid = Some("5678".into());
        assert_ne!(failure_key(&original), failure_key(&recreated));
        assert!(!failures.exhausted(&failure_key(&recreated)));
    }

    #[rstest]
    #[case::bound(|claim: &mut PersistentVolumeClaim| {
        claim.status.as_mut().unwrap().phase = Some("Bound".into());
    })]
    #[case::deleting(|claim: &mut PersistentVolumeClaim| {
        claim.metadata.deletion_timestamp = Some(
            k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(Default::default()),
        );
    })]
    fn settled_claims_drop_their_failures(#[case] settle: fn(&mut PersistentVolumeClaim)) {
        let failures = Failures::new(5);
        let mut claim = claim();
        failures.record(&failure_key(&claim));
        assert!(!forget_if_settled(&failures, &claim));
        assert_eq!(failures.len(), 1);

        settle(&mut claim);
        assert!(forget_if_settled(&failures, &claim));
        assert!(failures.is_empty());
    }

    #[test]
    fn failure_key_falls_back_to_name_without_uid() {
        let mut claim = claim();
        assert_eq!(failure_key(&claim), "claim:1234");
        claim.metadata.uid = None;
        assert_eq!(failure_key(&claim), "claim:a/c1");
    }

    #[test]
    fn volume_name_uses_claim_uid() {
        assert_eq!(volume_name_for(&claim()).as_deref(), Some("pvc-1234"));
    }

    #[rstest]
    #[case::pending(Some("Pending"), None, true)]
    #[case::no_status(None, None, true)]
    #[case::bound_phase(Some("Bound"), None, false)]
    #[case::volume_named(Some("Pending"), Some("pvc-1234"), false)]
    fn unbound_claims(
        #[case] phase: Option<&str>,
        #[case] volume: Option<&str>,
        #[case] expected: bool,
    ) {
        let mut claim = claim();
        claim.status.as_mut().unwrap().phase = phase.map(ToString::to_string);
        claim.spec.as_mut().unwrap().volume_name = volume.map(ToString::to_string);
        assert_eq!(is_unbound(&claim), expected);
    }

    #[test]
    fn wait_for_first_consumer_needs_selected_node() {
        let mut claim = claim();
        assert!(!waits_for_consumer(&claim, &class()));

        claim.metadata.annotations = None;
        assert!(waits_for_consumer(&claim, &class()));

        let mut immediate = class();
        immediate.volume_binding_mode = Some("Immediate".into());
        assert!(!waits_for_consumer(&claim, &immediate));
    }

    #[test]
    fn completed_volume_is_bound_to_claim() {
        let volume = complete_volume(
            PersistentVolume::default(),
            &claim(),
            &class(),
            "k8s.canonical.com/hostpath",
        );

        assert_eq!(
            volume.annotations()[PROVISIONED_BY_ANNOTATION],
            "k8s.canonical.com/hostpath"
        );
        let spec = volume.spec.unwrap();
        let claim_ref = spec.claim_ref.unwrap();
        assert_eq!(claim_ref.name.as_deref(), Some("c1"));
        assert_eq!(claim_ref.namespace.as_deref(), Some("a"));
        assert_eq!(claim_ref.uid.as_deref(), Some("1234"));
        assert_eq!(spec.storage_class_name.as_deref(), Some("hostpath"));
        assert_eq!(spec.mount_options, Some(vec!["noatime".to_string()]));
    }
}
