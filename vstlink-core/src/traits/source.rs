//! Frame source trait

use vstlink_protocol::{Detection, PerfCounters};

/// Status code of one inference invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceStatus {
    /// Result available through the accessors
    Ok,
    /// Engine not ready yet; retry after a backoff
    Busy,
    /// Any other engine error code
    Error(i32),
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceStatus::Ok)
    }
}

/// Vision inference engine
///
/// One [`invoke`](FrameSource::invoke) produces the data read back through
/// the accessors. Accessors are only meaningful after an `Ok` invocation.
pub trait FrameSource {
    /// Run one inference
    ///
    /// `capture_image` asks the engine to also keep the source image; it is
    /// false while the link is paused.
    fn invoke(&mut self, capture_image: bool) -> SourceStatus;

    /// Detections of the last successful invocation
    fn detections(&self) -> &[Detection];

    /// Stage timings of the last successful invocation
    fn performance(&self) -> PerfCounters;

    /// Base64 text of the last captured image
    fn last_image_text(&mut self) -> &[u8];

    /// Re-establish the engine after a stall
    ///
    /// Returns `false` if the engine did not come back.
    fn reinit(&mut self) -> bool;
}
