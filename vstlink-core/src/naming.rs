//! Stored image naming
//!
//! Images are named `/<timestamp>_frame_<id>.jpg` with the id zero-padded to
//! six digits, or `/frame_<id>.jpg` when no timestamp is available.

use core::fmt::Write;

use vstlink_hal::Clock;

use crate::traits::{TimeSource, Timestamp, MAX_TIMESTAMP_LEN};

/// Longest artifact name: `/` + timestamp + `_frame_` + 10 digits + `.jpg`
pub const MAX_ARTIFACT_NAME_LEN: usize = MAX_TIMESTAMP_LEN + 24;

pub type ArtifactName = heapless::String<MAX_ARTIFACT_NAME_LEN>;

/// Build the storage name for a frame
pub fn artifact_name(timestamp: Option<&str>, frame_id: u32) -> ArtifactName {
    let mut name = ArtifactName::new();
    // Capacity covers the longest timestamp and id
    let _ = match timestamp.filter(|ts| !ts.is_empty()) {
        Some(ts) => write!(name, "/{}_frame_{:06}.jpg", ts, frame_id),
        None => write!(name, "/frame_{:06}.jpg", frame_id),
    };
    name
}

/// Seconds-since-boot timestamp, rendered as `UPT_<seconds>`
pub struct UptimeTimestamp<C> {
    clock: C,
}

impl<C: Clock> UptimeTimestamp<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> TimeSource for UptimeTimestamp<C> {
    fn timestamp(&mut self) -> Option<Timestamp> {
        let mut ts = Timestamp::new();
        write!(ts, "UPT_{}", self.clock.now_ms() / 1000).ok()?;
        Some(ts)
    }
}

/// Prefer `primary`, fall back to uptime when it has no valid time
pub struct FallbackTime<T, C> {
    primary: T,
    uptime: UptimeTimestamp<C>,
}

impl<T: TimeSource, C: Clock> FallbackTime<T, C> {
    pub fn new(primary: T, clock: C) -> Self {
        Self {
            primary,
            uptime: UptimeTimestamp::new(clock),
        }
    }
}

impl<T: TimeSource, C: Clock> TimeSource for FallbackTime<T, C> {
    fn timestamp(&mut self) -> Option<Timestamp> {
        self.primary
            .timestamp()
            .or_else(|| self.uptime.timestamp())
    }
}

/// Time source that never knows the time
pub struct NoTime;

impl TimeSource for NoTime {
    fn timestamp(&mut self) -> Option<Timestamp> {
        None
    }
}
