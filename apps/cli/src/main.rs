//! `hostpath-provisioner` binary

mod cli;
mod client;
mod signal;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use hostpath_controller::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    hostpath_log::init_with(cli.log_config()?).context("failed to initialize logging")?;

    let provisioner = Arc::new(cli.provisioner_config()?);
    let controller = cli.controller_config();
    info!(
        identity = provisioner.identity(),
        namespace = provisioner.namespace(),
        pv_dir = provisioner.pv_dir(),
        image = provisioner.helper_image(),
        provisioner = %controller.provisioner_name,
        "starting hostpath provisioner"
    );

    let client = client::connect(cli.kubeconfig.as_deref()).await?;

    let cancel = CancellationToken::new();
    signal::cancel_on_signal(cancel.clone());

    let ctx = Arc::new(Context::new(client.clone(), provisioner, controller, cancel));
    hostpath_controller::run(client, ctx).await;

    info!("hostpath provisioner stopped");
    Ok(())
}
