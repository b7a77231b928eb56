//! Fixed-interval polling
//!
//! The wait budget is `interval × max_attempts`. Failed observations inside
//! the loop body do not change that arithmetic: the caller just asks for the
//! next tick.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{ResilienceError, ResilienceResult};

/// Interval and ceiling for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep before each attempt
    pub interval: Duration,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl PollConfig {
    /// Default sleep between attempts
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    /// Default attempt ceiling
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

    /// Create a poll configuration
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Total wall time the loop may spend sleeping
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Reject settings that would busy-loop or never poll at all
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.interval.is_zero() {
            return Err("interval must be greater than zero");
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than zero");
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Retry-with-fixed-interval ticker.
///
/// Each call to [`tick`](Self::tick) sleeps one interval and yields the next
/// attempt number (1-based). After `max_attempts` ticks it yields `None`.
/// Cancellation is honoured while sleeping; it never interrupts work the
/// caller does between ticks.
#[derive(Debug)]
pub struct FixedInterval {
    config: PollConfig,
    cancel: CancellationToken,
    attempt: u32,
}

impl FixedInterval {
    /// Create a ticker bound to `cancel`
    #[must_use]
    pub fn new(config: PollConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            attempt: 0,
        }
    }

    /// Wait for the next attempt.
    ///
    /// Returns `Ok(None)` once the ceiling is reached and
    /// [`ResilienceError::Cancelled`] if the token fires first.
    pub async fn tick(&mut self) -> ResilienceResult<Option<u32>> {
        if self.is_exhausted() {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.cancelled()),
            () = tokio::time::sleep(self.config.interval) => {}
        }

        self.attempt += 1;
        trace!(
            attempt = self.attempt,
            max_attempts = self.config.max_attempts,
            "poll tick"
        );
        Ok(Some(self.attempt))
    }

    /// Attempts handed out so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Whether the ceiling has been reached
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Settings this ticker runs with
    #[must_use]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    fn cancelled(&self) -> ResilienceError {
        ResilienceError::Cancelled {
            attempts: self.attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    #[test]
    fn default_budget_is_five_hundred_seconds() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 100);
        assert_eq!(config.budget(), Duration::from_secs(500));
    }

    #[test]
    fn validate_rejects_degenerate_settings() {
        assert!(PollConfig::new(Duration::ZERO, 3).validate().is_err());
        assert!(PollConfig::new(Duration::from_secs(1), 0).validate().is_err());
        assert!(PollConfig::new(Duration::from_secs(1), 1).validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_before_every_attempt() {
        let start = Instant::now();
        let mut ticker = FixedInterval::new(
            PollConfig::new(Duration::from_secs(5), 3),
            CancellationToken::new(),
        );

        assert_eq!(ticker.tick().await, Ok(Some(1)));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(ticker.tick().await, Ok(Some(2)));
        assert_eq!(ticker.tick().await, Ok(Some(3)));
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_ceiling_without_sleeping_again() {
        let mut ticker = FixedInterval::new(
            PollConfig::new(Duration::from_secs(5), 2),
            CancellationToken::new(),
        );
        while ticker.tick().await.unwrap().is_some() {}

        let after_last = Instant::now();
        assert_eq!(ticker.tick().await, Ok(None));
        assert_eq!(after_last.elapsed(), Duration::ZERO);
        assert!(ticker.is_exhausted());
        assert_eq!(ticker.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let mut ticker = FixedInterval::new(
            PollConfig::new(Duration::from_secs(60), 10),
            cancel.clone(),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = ticker.tick().await;
        assert_eq!(result, Err(ResilienceError::Cancelled { attempts: 0 }));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ticker = FixedInterval::new(PollConfig::default(), cancel);

        let start = Instant::now();
        let err = ticker.tick().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_reports_attempts_so_far() {
        let cancel = CancellationToken::new();
        let mut ticker = FixedInterval::new(
            PollConfig::new(Duration::from_secs(1), 10),
            cancel.clone(),
        );
        ticker.tick().await.unwrap();
        ticker.tick().await.unwrap();
        cancel.cancel();

        assert_eq!(
            ticker.tick().await,
            Err(ResilienceError::Cancelled { attempts: 2 })
        );
    }
}
