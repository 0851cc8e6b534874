//! Route layer engine configuration.

use std::time::Duration;

/// Timing parameters for polling and activation retries.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay before the first poll (milliseconds).
    pub initial_delay_ms: u64,

    /// Time between polls (milliseconds).
    pub poll_period_ms: u64,

    /// Backoff before the first activation retry (milliseconds).
    /// Doubles on each further failure.
    pub retry_base_ms: u64,

    /// Upper bound on the activation retry backoff (milliseconds).
    pub retry_max_ms: u64,

    /// Activation attempts before a route is left inactive until it is
    /// selected again.
    pub max_activation_attempts: u32,

    /// Capacity of the layer event broadcast channel.
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Returns the initial poll delay as a Duration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the poll period as a Duration.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Backoff after the `attempt`-th failed activation (1-based).
    ///
    /// Returns `None` once `max_activation_attempts` have been made.
    pub fn retry_backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_activation_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let ms = self.retry_base_ms.saturating_mul(factor).min(self.retry_max_ms);
        Some(Duration::from_millis(ms))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            poll_period_ms: 15_000,
            retry_base_ms: 2_000,
            retry_max_ms: 60_000,
            max_activation_attempts: 5,
            event_capacity: 64,
        }
    }
}
