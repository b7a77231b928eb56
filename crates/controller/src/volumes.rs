//! Volume reconciliation: remove backing directories of released volumes

use std::sync::Arc;

use hostpath_core::keys::PROVISIONED_BY_ANNOTATION;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::api::DeleteParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::context::{Context, Failures};
use crate::error::{Error, Result};

/// Failure-counter key for a volume; keyed by uid like claims
pub fn failure_key(volume: &PersistentVolume) -> String {
    match volume.metadata.uid.as_deref() {
        Some(uid) => format!("volume:{uid}"),
        None => format!("volume:{}", volume.name_any()),
    }
}

/// Whether `volume` was released, should be deleted and was created by
/// `provisioner_name`
pub fn wants_deletion(volume: &PersistentVolume, provisioner_name: &str) -> bool {
    let released = volume
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some("Released");
    let delete_policy = volume
        .spec
        .as_ref()
        .and_then(|spec| spec.persistent_volume_reclaim_policy.as_deref())
        == Some("Delete");
    let ours = volume
        .annotations()
        .get(PROVISIONED_BY_ANNOTATION)
        .is_some_and(|name| name == provisioner_name);
    released && delete_policy && ours && volume.metadata.deletion_timestamp.is_none()
}

/// Drop the failure count of a volume that no longer needs deleting.
///
/// Returns whether the volume is settled.
pub fn forget_if_settled(
    failures: &Failures,
    volume: &PersistentVolume,
    provisioner_name: &str,
) -> bool {
    if wants_deletion(volume, provisioner_name) {
        return false;
    }
    failures.clear(&failure_key(volume));
    true
}

/// Remove the backing directory of a released volume, then the volume itself
#[instrument(skip_all, fields(volume = %volume.name_any()))]
pub async fn reconcile(volume: Arc<PersistentVolume>, ctx: Arc<Context>) -> Result<Action> {
    if forget_if_settled(ctx.failures(), &volume, &ctx.config().provisioner_name) {
        return Ok(Action::await_change());
    }
    let key = failure_key(&volume);
    if ctx.failures().exhausted(&key) {
        debug!("retry threshold reached; not deleting");
        return Ok(Action::await_change());
    }

    let outcome = ctx
        .deprovisioner()
        .deprovision(&volume, ctx.cancel_token())
        .await?;
    if !outcome.releases_volume() {
        debug!(?outcome, "leaving volume in place");
        return Ok(Action::await_change());
    }

    let volumes = Api::<PersistentVolume>::all(ctx.client().clone());
    match volumes.delete(&volume.name_any(), &DeleteParams::default()).await {
        Ok(_) => info!(?outcome, "deleted volume"),
        Err(kube::Error::Api(response)) if response.code == 404 => {
            debug!("volume already gone");
        }
        Err(err) => return Err(err.into()),
    }
    ctx.failures().clear(&key);
    Ok(Action::await_change())
}

/// Requeue a failed volume at the resync period until the threshold is hit
pub fn error_policy(volume: Arc<PersistentVolume>, err: &Error, ctx: Arc<Context>) -> Action {
    let key = failure_key(&volume);
    let failures = ctx.failures().record(&key);
    if failures >= ctx.config().failed_retry_threshold {
        error!(volume = %volume.name_any(), failures, error = %err, "giving up on volume");
        Action::await_change()
    } else {
        warn!(volume = %volume.name_any(), failures, error = %err, "deleting volume failed");
        Action::requeue(ctx.config().resync_period)
    }
}
