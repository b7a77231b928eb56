//! Control-loop settings

use std::time::Duration;

use hostpath_core::keys::DEFAULT_PROVISIONER_NAME;

/// Settings for the control loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Name storage classes use to select this provisioner
    pub provisioner_name: String,
    /// Delay before a failed object is retried
    pub resync_period: Duration,
    /// Consecutive failures after which an object is no longer retried
    pub failed_retry_threshold: u32,
}

impl ControllerConfig {
    /// Default retry delay
    pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(15);
    /// Default failure threshold
    pub const DEFAULT_FAILED_RETRY_THRESHOLD: u32 = 5;
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            provisioner_name: DEFAULT_PROVISIONER_NAME.to_string(),
            resync_period: Self::DEFAULT_RESYNC_PERIOD,
            failed_retry_threshold: Self::DEFAULT_FAILED_RETRY_THRESHOLD,
        }
    }
}
