//! Image storage and time-source traits

use alloc::vec::Vec;

/// Longest timestamp string used in artifact names
pub const MAX_TIMESTAMP_LEN: usize = 24;

/// Timestamp text used only for naming stored images
pub type Timestamp = heapless::String<MAX_TIMESTAMP_LEN>;

/// Errors from the image store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Storage medium unavailable
    Unavailable,
    /// Image does not fit the medium or its slot
    TooLarge,
    /// Medium reported a write failure
    Write,
    /// Hand-off queue is full
    Busy,
}

/// Durable image storage
///
/// Failures are logged by the caller and never retried by the link.
pub trait FrameStore {
    fn save(&mut self, frame_id: u32, jpeg: Vec<u8>) -> Result<(), StoreError>;
}

/// Wall-clock time for artifact names
pub trait TimeSource {
    /// Current timestamp, or `None` while time is unknown
    fn timestamp(&mut self) -> Option<Timestamp>;
}
