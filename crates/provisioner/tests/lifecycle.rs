//! Provision-then-deprovision flows against the in-memory pod API

use std::sync::Arc;
use std::time::Duration;

use hostpath_core::{ProvisionerConfig, ProvisioningRequest};
use hostpath_provisioner::testing::{MockPods, PodCall};
use hostpath_provisioner::{
    DeleteOutcome, Deprovisioner, Provisioner, ProvisioningState, VolumeDescriptorExt,
};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn config(identity: &str) -> Arc<ProvisionerConfig> {
    Arc::new(
        ProvisionerConfig::builder(identity, "hostpath", "/data")
            .build()
            .expect("valid config"),
    )
}

fn request() -> ProvisioningRequest {
    ProvisioningRequest::new("pv-001", "a", "c1")
        .with_capacity("5Gi")
        .with_access_modes(["ReadWriteOnce"])
        .on_node("node-a")
}

#[tokio::test(start_paused = true)]
async fn success_on_third_poll_stops_polling() {
    let pods = Arc::new(MockPods::new().with_phases(["Pending", "Running", "Succeeded", "Failed"]));
    let provisioner = Provisioner::new(pods.clone(), config("node-y"));
    let start = Instant::now();

    let provisioned = provisioner
        .provision(&request(), &CancellationToken::new())
        .await
        .expect("provisioned");

    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(provisioned.state, ProvisioningState::Finished);
    assert_eq!(pods.gets(), 3);
    assert_eq!(pods.deletes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn volume_from_one_instance_is_ignored_by_another() {
    let pods = Arc::new(MockPods::new().with_phases(["Succeeded"]));
    let provisioned = Provisioner::new(pods.clone(), config("node-x"))
        .provision(&request(), &CancellationToken::new())
        .await
        .expect("provisioned");
    assert_eq!(provisioned.volume.ownership_tag(), Some("node-x"));

    let other = Arc::new(MockPods::new());
    let outcome = Deprovisioner::new(other.clone(), config("node-y"))
        .deprovision(&provisioned.volume, &CancellationToken::new())
        .await
        .expect("ignored");

    assert!(matches!(outcome, DeleteOutcome::Ignored { .. }));
    assert!(other.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn provisioned_volume_is_removed_on_its_node() {
    let pods = Arc::new(MockPods::new().with_phases(["Succeeded"]));
    let config = config("node-y");

    let provisioned = Provisioner::new(pods.clone(), config.clone())
        .provision(&request(), &CancellationToken::new())
        .await
        .expect("provisioned");
    assert_eq!(provisioned.volume.owner_node(), Some("node-a"));

    let outcome = Deprovisioner::new(pods.clone(), config)
        .deprovision(&provisioned.volume, &CancellationToken::new())
        .await
        .expect("removed");
    assert_eq!(outcome, DeleteOutcome::Removed);

    let created = pods.created();
    assert_eq!(created.len(), 2);
    let removal = created[1].spec.as_ref().expect("spec");
    assert_eq!(
        removal.node_selector.as_ref().expect("pinned")["kubernetes.io/hostname"],
        "node-a"
    );
    assert_eq!(
        removal.containers[0].command.clone().expect("command"),
        vec!["rm", "-rf", "/data/a-c1-pv-001"]
    );

    let creates = pods
        .calls()
        .into_iter()
        .filter(|call| matches!(call, PodCall::Create { .. }))
        .count();
    assert_eq!(creates, 2);
    assert_eq!(pods.deletes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_use_distinct_pods() {
    let pods = Arc::new(MockPods::new().with_phases(["Succeeded"]));
    let provisioner = Provisioner::new(pods.clone(), config("node-y"));
    let cancel = CancellationToken::new();

    let first = request();
    let second = ProvisioningRequest::new("pv-002", "a", "c1")
        .with_capacity("5Gi")
        .on_node("node-a");
    let (first, second) = tokio::join!(
        provisioner.provision(&first, &cancel),
        provisioner.provision(&second, &cancel)
    );
    let (first, second) = (first.expect("first"), second.expect("second"));

    assert_ne!(first.path, second.path);
    let mut deleted = pods.deletes();
    deleted.sort();
    deleted.dedup();
    assert_eq!(deleted.len(), 2);
}
