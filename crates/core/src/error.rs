//! Configuration errors

use thiserror::Error;

/// Result type for configuration construction
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while assembling a [`ProvisionerConfig`](crate::ProvisionerConfig)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required setting was empty
    #[error("{field} must be set")]
    Missing {
        /// Name of the setting
        field: &'static str,
    },

    /// The base directory is not an absolute path
    #[error("base directory must be absolute, got '{0}'")]
    RelativeBaseDir(String),

    /// A reclaim policy string did not name a known policy
    #[error("unknown reclaim policy '{0}' (expected Retain, Delete or Recycle)")]
    UnknownReclaimPolicy(String),

    /// The poll settings cannot produce a bounded, non-busy wait
    #[error("invalid poll settings: {0}")]
    InvalidPoll(&'static str),
}
