//! Embassy-backed monotonic clock

use embassy_time::Instant;
use vstlink_hal::Clock;

/// Milliseconds since boot from the embassy time driver
///
/// Truncated to `u32`; users compare instants with wrapping arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
