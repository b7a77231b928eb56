//! # Hostpath Log
//!
//! Logging bootstrap for the provisioner binaries, built on `tracing-subscriber`.
//!
//! ```rust,no_run
//! use hostpath_log::Config;
//!
//! fn main() -> Result<(), hostpath_log::LogError> {
//!     hostpath_log::init_with(Config::from_env()?.with_verbosity(1))?;
//!     tracing::info!(port = 8080, "starting");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;

pub use builder::LoggerBuilder;
pub use config::{Config, DisplayConfig, Format, Writer};
pub use error::{LogError, LogResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{Config, Format, LogResult, auto_init, init_with};
    pub use tracing::{debug, error, info, trace, warn};
}

/// Pick a configuration from the environment and build type, then install it.
///
/// An explicit `HOSTPATH_LOG`/`RUST_LOG` wins; otherwise debug builds get
/// [`Config::development`] and release builds [`Config::production`].
pub fn auto_init() -> LogResult<()> {
    if std::env::var_os("HOSTPATH_LOG").is_some() || std::env::var_os("RUST_LOG").is_some() {
        init_with(Config::from_env()?)
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Install the global subscriber for `config`
pub fn init_with(config: Config) -> LogResult<()> {
    LoggerBuilder::from_config(config).build()
}
