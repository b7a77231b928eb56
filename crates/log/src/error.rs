//! Logger errors

use thiserror::Error;

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while installing the logger
#[derive(Debug, Error)]
pub enum LogError {
    /// The filter directive could not be parsed
    #[error("invalid filter '{directive}': {reason}")]
    Filter {
        /// Directive as given
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),

    /// Unknown output format name
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),
}
