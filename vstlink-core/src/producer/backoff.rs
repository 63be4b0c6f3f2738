//! Acquisition backoff
//!
//! Busy and error statuses share one policy: sleep the current delay, then
//! grow it by `growth_num / growth_den` up to `max_ms`. With the defaults the
//! sequence is 30, 45, 67, 100, 150, ... 1200 ms.

use crate::config::BackoffConfig;

/// Multiplicative backoff with a floor and a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current_ms: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_ms: config.floor_ms,
            config,
        }
    }

    /// Delay to apply before the next poll
    pub fn current_ms(&self) -> u32 {
        self.current_ms
    }

    /// Back to the floor
    pub fn reset(&mut self) {
        self.current_ms = self.config.floor_ms;
    }

    /// Grow the delay and return the new value
    pub fn grow(&mut self) -> u32 {
        let scaled = u64::from(self.current_ms) * u64::from(self.config.growth_num)
            / u64::from(self.config.growth_den.max(1));
        let next = scaled.min(u64::from(self.config.max_ms)) as u32;
        // Always make progress towards the cap
        self.current_ms = next.max(self.current_ms.saturating_add(1).min(self.config.max_ms));
        self.current_ms
    }
}
