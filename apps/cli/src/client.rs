//! Kubernetes client bootstrap

use std::path::Path;

use anyhow::{Context as _, Result};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};

/// Client from `kubeconfig` when given, else in-cluster or default discovery
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("failed to create Kubernetes client");
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read kubeconfig from {}", path.display()))?;
    let kubeconfig = Kubeconfig::from_yaml(&content).context("failed to parse kubeconfig")?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("failed to load kubeconfig")?;
    Client::try_from(config).context("failed to create Kubernetes client")
}
