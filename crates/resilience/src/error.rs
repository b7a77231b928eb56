//! Error types for polling

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors raised by the polling primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// The caller's cancellation token fired while waiting
    #[error("polling cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts handed out before cancellation
        attempts: u32,
    },
}

impl ResilienceError {
    /// Check if this error came from cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
