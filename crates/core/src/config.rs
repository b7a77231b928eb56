//! Process-wide provisioner configuration
//!
//! [`ProvisionerConfig`] is assembled once at startup and then only read.
//! Components receive it by reference (or behind an `Arc`), so concurrent
//! provisioning calls never share anything mutable.

use std::path::Path;

use hostpath_resilience::PollConfig;

use crate::error::{ConfigError, ConfigResult};
use crate::policy::ReclaimPolicy;
use crate::request::ProvisioningRequest;

/// Helper image used for execution units when none is configured
pub const DEFAULT_HELPER_IMAGE: &str = "busybox:1.34.1";

/// Immutable provisioner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    identity: String,
    namespace: String,
    pv_dir: String,
    helper_image: String,
    reclaim_policy_override: Option<ReclaimPolicy>,
    poll: PollConfig,
}

impl ProvisionerConfig {
    /// Start building a configuration.
    ///
    /// `identity` is normally the name of the node this instance runs on;
    /// `namespace` is where execution units are created; `pv_dir` is the
    /// default base directory for backing paths.
    pub fn builder(
        identity: impl Into<String>,
        namespace: impl Into<String>,
        pv_dir: impl Into<String>,
    ) -> ProvisionerConfigBuilder {
        ProvisionerConfigBuilder {
            identity: identity.into(),
            namespace: namespace.into(),
            pv_dir: pv_dir.into(),
            helper_image: DEFAULT_HELPER_IMAGE.to_string(),
            reclaim_policy_override: None,
            poll: PollConfig::default(),
        }
    }

    /// Identity written to, and compared against, the ownership annotation
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Namespace execution units are created in
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Default base directory
    #[must_use]
    pub fn pv_dir(&self) -> &str {
        &self.pv_dir
    }

    /// Image run by execution units
    #[must_use]
    pub fn helper_image(&self) -> &str {
        &self.helper_image
    }

    /// Reclaim policy forced onto every volume, if configured
    #[must_use]
    pub fn reclaim_policy_override(&self) -> Option<ReclaimPolicy> {
        self.reclaim_policy_override
    }

    /// Poll settings for execution units
    #[must_use]
    pub fn poll(&self) -> &PollConfig {
        &self.poll
    }

    /// Base directory for `request`: the storage-class override, else the default
    #[must_use]
    pub fn base_dir_for<'a>(&'a self, request: &'a ProvisioningRequest) -> &'a str {
        request.pv_dir_override().unwrap_or(&self.pv_dir)
    }

    /// Effective reclaim policy: the configured override, else the class policy,
    /// else the cluster default
    #[must_use]
    pub fn reclaim_policy_for(&self, class_policy: Option<ReclaimPolicy>) -> ReclaimPolicy {
        self.reclaim_policy_override
            .or(class_policy)
            .unwrap_or_default()
    }
}

/// Builder for [`ProvisionerConfig`]
#[derive(Debug, Clone)]
pub struct ProvisionerConfigBuilder {
    identity: String,
    namespace: String,
    pv_dir: String,
    helper_image: String,
    reclaim_policy_override: Option<ReclaimPolicy>,
    poll: PollConfig,
}

impl ProvisionerConfigBuilder {
    /// Override the helper image
    pub fn helper_image(mut self, image: impl Into<String>) -> Self {
        self.helper_image = image.into();
        self
    }

    /// Force a reclaim policy onto every provisioned volume
    pub fn reclaim_policy_override(mut self, policy: Option<ReclaimPolicy>) -> Self {
        self.reclaim_policy_override = policy;
        self
    }

    /// Parse and set the reclaim policy override; an empty string means "none"
    pub fn reclaim_policy_str(mut self, raw: &str) -> ConfigResult<Self> {
        self.reclaim_policy_override = if raw.is_empty() {
            None
        } else {
            Some(raw.parse()?)
        };
        Ok(self)
    }

    /// Override the poll settings
    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Validate and build
    pub fn build(self) -> ConfigResult<ProvisionerConfig> {
        if self.identity.is_empty() {
            return Err(ConfigError::Missing { field: "identity" });
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::Missing { field: "namespace" });
        }
        if self.pv_dir.is_empty() {
            return Err(ConfigError::Missing { field: "pv_dir" });
        }
        if !Path::new(&self.pv_dir).is_absolute() {
            return Err(ConfigError::RelativeBaseDir(self.pv_dir));
        }
        if self.helper_image.is_empty() {
            return Err(ConfigError::Missing {
                field: "helper_image",
            });
        }
        self.poll.validate().map_err(ConfigError::InvalidPoll)?;

        Ok(ProvisionerConfig {
            identity: self.identity,
            namespace: self.namespace,
            pv_dir: self.pv_dir,
            helper_image: self.helper_image,
            reclaim_policy_override: self.reclaim_policy_override,
            poll: self.poll,
        })
    }
}
