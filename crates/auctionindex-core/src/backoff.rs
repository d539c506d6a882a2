//! Capped exponential backoff for retryable errors.
//!
//! Transient source and storage failures are never fatal; the loop retries
//! the same batch forever, only the delay between attempts is policy.

use std::time::Duration;

/// Configuration for the backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Maximum delay (caps exponential growth).
    pub max: Duration,
    /// Multiplier applied on each consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Stateless policy — computes the delay for the `attempt`-th consecutive
/// failure (1-based). The caller resets its attempt counter on success.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Delay before retrying after `attempt` consecutive failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial.as_millis() as f64
            * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let cap_ms = self.config.max.as_millis() as f64;
        Duration::from_millis(base_ms.min(cap_ms) as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
