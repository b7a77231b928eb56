//! Command-line flags and their environment fallbacks

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use hostpath_controller::ControllerConfig;
use hostpath_core::keys::DEFAULT_PROVISIONER_NAME;
use hostpath_core::{DEFAULT_HELPER_IMAGE, ProvisionerConfig};
use hostpath_log::Format;

/// Dynamic hostPath volume provisioner
#[derive(Debug, Parser)]
#[command(name = "hostpath-provisioner", version, about)]
pub struct Cli {
    /// Namespace helper pods are created in
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Name of the node this instance runs on; stamped on every volume it creates
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Default directory backing directories are created under
    #[arg(long, env = "PV_DIR")]
    pub pv_dir: String,

    /// Image helper pods run
    #[arg(long, env = "BUSYBOX_IMAGE", default_value = DEFAULT_HELPER_IMAGE)]
    pub busybox_image: String,

    /// Reclaim policy for every volume, overriding the storage class (empty for none)
    #[arg(long, env = "PV_RECLAIM_POLICY", default_value = "")]
    pub reclaim_policy: String,

    /// Kubeconfig to use instead of in-cluster or default discovery
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Provisioner name storage classes refer to
    #[arg(long, default_value = DEFAULT_PROVISIONER_NAME)]
    pub provisioner_name: String,

    /// Seconds before a failed claim or volume is retried
    #[arg(long, default_value_t = 15)]
    pub resync_period: u64,

    /// Consecutive failures after which a claim or volume is no longer retried
    #[arg(long, default_value_t = 5)]
    pub failed_retry_threshold: u32,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format: pretty, compact or json (overrides HOSTPATH_LOG_FORMAT)
    #[arg(long)]
    pub log_format: Option<Format>,
}

impl Cli {
    /// Provisioner settings, validated
    pub fn provisioner_config(&self) -> Result<ProvisionerConfig> {
        ProvisionerConfig::builder(&*self.node_name, &*self.namespace, &*self.pv_dir)
            .helper_image(&*self.busybox_image)
            .reclaim_policy_str(&self.reclaim_policy)
            .context("invalid PV_RECLAIM_POLICY")?
            .build()
            .context("invalid provisioner configuration")
    }

    /// Control-loop settings
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            provisioner_name: self.provisioner_name.clone(),
            resync_period: Duration::from_secs(self.resync_period),
            failed_retry_threshold: self.failed_retry_threshold,
        }
    }

    /// Logger settings: environment first, then flags
    pub fn log_config(&self) -> Result<hostpath_log::Config> {
        let config = hostpath_log::Config::from_env()
            .context("invalid logging environment")?
            .with_verbosity(self.verbose);
        Ok(match self.log_format {
            Some(format) => config.with_format(format),
            None => config,
        })
    }
}
