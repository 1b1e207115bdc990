use std::time::Duration;

use serde::Deserialize;

use crate::config::millis;

/// Exponential backoff schedule for reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Growth factor applied after every failure.
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(60_000),
            multiplier: 2,
        }
    }
}

/// Reconnect backoff state.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    next: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let next = config.initial_delay.min(config.max_delay);
        Self {
            config,
            next,
            failures: 0,
        }
    }

    /// Delay to wait before the next attempt; grows the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay
            .checked_mul(self.config.multiplier.max(1))
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will return.
    pub fn peek(&self) -> Duration {
        self.next
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Back to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.next = self.config.initial_delay.min(self.config.max_delay);
        self.failures = 0;
    }
}
