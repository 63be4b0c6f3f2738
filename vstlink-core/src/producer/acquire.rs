//! Acquisition loop
//!
//! Polls the frame source until it produces a result or the deadline
//! passes. Sleeps are the only suspension points and go through `DelayNs`,
//! so an async port can substitute a timer without touching the policy.

use embedded_hal::delay::DelayNs;
use vstlink_hal::Clock;

use super::backoff::Backoff;
use crate::config::{BackoffConfig, RecoveryConfig};
use crate::traits::{FrameSource, SourceStatus};

/// Acquisition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquireError {
    /// No result before the deadline; the source should be reinitialized
    Deadline {
        busy_polls: u32,
        last_status: SourceStatus,
    },
}

/// Busy/backoff/deadline policy around [`FrameSource::invoke`]
#[derive(Debug, Clone)]
pub struct Acquirer {
    backoff: Backoff,
    recovery: RecoveryConfig,
    last_busy_log_ms: Option<u32>,
}

impl Acquirer {
    pub fn new(backoff: BackoffConfig, recovery: RecoveryConfig) -> Self {
        Self {
            backoff: Backoff::new(backoff),
            recovery,
            last_busy_log_ms: None,
        }
    }

    /// Current backoff delay
    pub fn backoff_ms(&self) -> u32 {
        self.backoff.current_ms()
    }

    /// Reset the backoff after the source was reinitialized
    pub fn reset_backoff(&mut self) {
        self.backoff.reset();
    }

    /// Poll the source until it succeeds or the deadline passes
    ///
    /// On success the accessors of `source` hold the new result and the
    /// backoff is back at its floor.
    pub fn acquire<S, C, D>(
        &mut self,
        source: &mut S,
        clock: &C,
        delay: &mut D,
        capture_image: bool,
    ) -> Result<(), AcquireError>
    where
        S: FrameSource,
        C: Clock,
        D: DelayNs,
    {
        let started = clock.now_ms();
        let mut busy_polls: u32 = 0;

        loop {
            let status = source.invoke(capture_image);
            match status {
                SourceStatus::Ok => {
                    if busy_polls > 0 {
                        debug!("source ready after {} busy polls", busy_polls);
                    }
                    self.backoff.reset();
                    return Ok(());
                }
                SourceStatus::Busy => {
                    busy_polls += 1;
                    if self.busy_log_due(clock.now_ms()) {
                        info!(
                            "source busy x{}, backoff={}ms",
                            busy_polls,
                            self.backoff.current_ms()
                        );
                    }
                }
                SourceStatus::Error(code) => {
                    warn!(
                        "source invoke failed rc={} (backoff={}ms)",
                        code,
                        self.backoff.current_ms()
                    );
                }
            }

            delay.delay_ms(self.backoff.current_ms());
            self.backoff.grow();

            if clock.elapsed_ms(started) > self.recovery.acquire_deadline_ms {
                warn!(
                    "acquire deadline {}ms exceeded after {} busy polls",
                    self.recovery.acquire_deadline_ms,
                    busy_polls
                );
                return Err(AcquireError::Deadline {
                    busy_polls,
                    last_status: status,
                });
            }
        }
    }

    fn busy_log_due(&mut self, now_ms: u32) -> bool {
        let due = match self.last_busy_log_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.recovery.busy_log_interval_ms,
        };
        if due {
            self.last_busy_log_ms = Some(now_ms);
        }
        due
    }
}
