//! State shared by the reconcilers

use std::sync::Arc;

use dashmap::DashMap;
use hostpath_core::ProvisionerConfig;
use hostpath_provisioner::{ClusterPods, Deprovisioner, PodApi, Provisioner};
use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;

/// Consecutive failure counts per object.
///
/// Keyed per object, so concurrent reconciliations never touch the same entry.
#[derive(Debug, Default)]
pub struct Failures {
    counts: DashMap<String, u32>,
    threshold: u32,
}

impl Failures {
    /// Tracker that gives up after `threshold` consecutive failures
    pub fn new(threshold: u32) -> Self {
        Self {
            counts: DashMap::new(),
            threshold,
        }
    }

    /// Record a failure for `key` and return the consecutive count
    pub fn record(&self, key: &str) -> u32 {
        let mut count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Forget failures for `key` after a success
    pub fn clear(&self, key: &str) {
        self.counts.remove(key);
    }

    /// Number of objects with recorded failures
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no failures are recorded
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Whether `key` has failed often enough to stop retrying
    pub fn exhausted(&self, key: &str) -> bool {
        self.counts
            .get(key)
            .is_some_and(|count| *count >= self.threshold)
    }
}

/// Everything a reconciler needs
pub struct Context {
    client: Client,
    provisioner: Provisioner,
    deprovisioner: Deprovisioner,
    config: ControllerConfig,
    failures: Failures,
    cancel: CancellationToken,
}

impl Context {
    /// Build a context whose helper pods live in the provisioner namespace
    pub fn new(
        client: Client,
        provisioner: Arc<ProvisionerConfig>,
        config: ControllerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let pods: Arc<dyn PodApi> =
            Arc::new(ClusterPods::new(client.clone(), provisioner.namespace()));
        Self {
            client,
            provisioner: Provisioner::new(pods.clone(), provisioner.clone()),
            deprovisioner: Deprovisioner::new(pods, provisioner),
            failures: Failures::new(config.failed_retry_threshold),
            config,
            cancel,
        }
    }

    /// API client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Provisioner for claims
    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Deprovisioner for released volumes
    pub fn deprovisioner(&self) -> &Deprovisioner {
        &self.deprovisioner
    }

    /// Control-loop settings
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Token that stops both loops and any poll in flight
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Failure counters for claims and volumes
    pub fn failures(&self) -> &Failures {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_at_threshold_and_resets_on_success() {
        let failures = Failures::new(2);
        assert!(!failures.exhausted("claim:a/c1"));

        assert_eq!(failures.record("claim:a/c1"), 1);
        assert!(!failures.exhausted("claim:a/c1"));
        assert_eq!(failures.record("claim:a/c1"), 2);
        assert!(failures.exhausted("claim:a/c1"));
        assert!(!failures.exhausted("claim:a/c2"));

        failures.clear("claim:a/c1");
        assert!(!failures.exhausted("claim:a/c1"));
        assert!(failures.is_empty());
    }
}
