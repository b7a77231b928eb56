//! # Hostpath Core
//!
//! Configuration and data model shared by every hostpath crate.
//!
//! ## Key Components
//!
//! - **Configuration**: [`ProvisionerConfig`], the immutable process-wide settings
//!   built once at startup and passed by reference into each component
//! - **Backing paths**: [`BackingPath`], the deterministic host directory for a claim
//! - **Requests**: [`ProvisioningRequest`], the input handed over by the control loop
//! - **Keys**: well-known labels, annotations and storage-class parameters
//!
//! ## Usage
//!
//! ```rust
//! use hostpath_core::{BackingPath, ProvisionerConfig, ProvisioningRequest};
//!
//! let config = ProvisionerConfig::builder("node-a", "kube-system", "/data")
//!     .build()
//!     .unwrap();
//!
//! let request = ProvisioningRequest::new("pv-001", "a", "c1");
//! let path = BackingPath::for_request(config.base_dir_for(&request), &request);
//! assert_eq!(path.as_str(), "/data/a-c1-pv-001");
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod path;
pub mod policy;
pub mod request;

pub use config::{DEFAULT_HELPER_IMAGE, ProvisionerConfig, ProvisionerConfigBuilder};
pub use error::{ConfigError, ConfigResult};
pub use path::BackingPath;
pub use policy::ReclaimPolicy;
pub use request::ProvisioningRequest;

pub use hostpath_resilience::PollConfig;
