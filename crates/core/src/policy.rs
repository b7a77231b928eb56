//! Volume reclaim policy

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the cluster does with a volume once its claim is released.
///
/// Spelled exactly as the Kubernetes API spells it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    /// Keep the volume and its data around for manual reclamation
    Retain,
    /// Delete the volume and its backing directory
    #[default]
    Delete,
    /// Scrub the data and make the volume available again (deprecated upstream)
    Recycle,
}

impl ReclaimPolicy {
    /// API string for this policy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retain => "Retain",
            Self::Delete => "Delete",
            Self::Recycle => "Recycle",
        }
    }
}

impl fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReclaimPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Retain" => Ok(Self::Retain),
            "Delete" => Ok(Self::Delete),
            "Recycle" => Ok(Self::Recycle),
            other => Err(ConfigError::UnknownReclaimPolicy(other.to_string())),
        }
    }
}
