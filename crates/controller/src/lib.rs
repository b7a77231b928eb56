//! # Hostpath Controller
//!
//! Watches claims and volumes and drives the provisioner from them.
//!
//! - Pending, unbound claims whose storage class names this provisioner get a
//!   backing directory and a volume bound to them
//! - Released volumes this provisioner created, with reclaim policy `Delete`,
//!   get their backing directory removed and the volume object deleted
//!
//! Both loops run on `kube::runtime::Controller`. Failures are retried at a
//! fixed period until a per-object threshold is reached.

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod volumes;

pub use config::ControllerConfig;
pub use context::Context;
pub use error::{Error, Result};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use tracing::{debug, info, warn};

/// Run both control loops until the context's cancellation token fires.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let cancel = ctx.cancel_token().clone();
    let claims = Controller::new(
        Api::<PersistentVolumeClaim>::all(client.clone()),
        watcher::Config::default(),
    )
    .graceful_shutdown_on({
        let cancel = cancel.clone();
        async move { cancel.cancelled().await }
    })
    .run(claims::reconcile, claims::error_policy, ctx.clone())
    .for_each(|result| async move {
        match result {
            Ok((claim, _)) => debug!(%claim, "reconciled claim"),
            Err(err) => warn!(error = %err, "claim reconciliation failed"),
        }
    });

    let volumes = Controller::new(
        Api::<PersistentVolume>::all(client),
        watcher::Config::default(),
    )
    .graceful_shutdown_on(async move { cancel.cancelled().await })
    .run(volumes::reconcile, volumes::error_policy, ctx.clone())
    .for_each(|result| async move {
        match result {
            Ok((volume, _)) => debug!(%volume, "reconciled volume"),
            Err(err) => warn!(error = %err, "volume reconciliation failed"),
        }
    });

    info!(
        provisioner = %ctx.config().provisioner_name,
        "watching claims and volumes"
    );
    futures::join!(claims, volumes);
    info!("controllers stopped");
}
