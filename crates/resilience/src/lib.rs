//! # Hostpath Resilience
//!
//! Bounded, cancellable waiting for eventually-consistent cluster state.
//!
//! [`FixedInterval`] hands out numbered attempts separated by a fixed sleep,
//! stops after a configured ceiling, and returns promptly once its
//! [`CancellationToken`] fires. Callers own the loop body, so they can carry
//! whatever they last observed from one attempt to the next:
//!
//! ```rust,no_run
//! use hostpath_resilience::{FixedInterval, PollConfig, ResilienceResult};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn wait_for_ready(cancel: CancellationToken) -> ResilienceResult<bool> {
//!     let mut ticker = FixedInterval::new(PollConfig::default(), cancel);
//!     while let Some(attempt) = ticker.tick().await? {
//!         if attempt == 3 {
//!             return Ok(true);
//!         }
//!     }
//!     Ok(false)
//! }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod poll;

pub use error::{ResilienceError, ResilienceResult};
pub use poll::{FixedInterval, PollConfig};

pub use tokio_util::sync::CancellationToken;
