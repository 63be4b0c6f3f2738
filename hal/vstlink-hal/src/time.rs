//! Monotonic time source

/// Monotonic millisecond clock
///
/// The value wraps after `u32::MAX` milliseconds (~49.7 days). Callers must
/// compare instants with `wrapping_sub`, never with `<`.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch (usually boot)
    fn now_ms(&self) -> u32;

    /// Milliseconds elapsed since `since`, wrap-safe
    fn elapsed_ms(&self, since: u32) -> u32 {
        self.now_ms().wrapping_sub(since)
    }
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
