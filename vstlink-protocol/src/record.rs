//! Metadata record
//!
//! The first line of every frame carries one JSON object describing the
//! inference result:
//! ```text
//! {"frame":7,"dt_ms":412,"perf":{"preprocess":8,"inference":61,"postprocess":1},
//!  "boxes":[{"target":3,"score":87,"x":120,"y":96,"w":40,"h":52}]}
//! ```
//! Only the `frame` key is interpreted by the receiver.

use alloc::string::String;
use serde::Serialize;

/// Maximum detections carried in one record
pub const MAX_DETECTIONS: usize = 16;

/// Key the receiver scans for to recover the frame id
const FRAME_KEY: &str = "\"frame\":";
const TARGET_KEY: &str = "\"target\":";

/// Errors building a metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// JSON serialization failed
    Serialize,
}

/// One detected object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Detection {
    /// Model class id
    #[serde(rename = "target")]
    pub class_id: u8,
    /// Confidence, 0-100
    pub score: u8,
    pub x: u16,
    pub y: u16,
    #[serde(rename = "w")]
    pub width: u16,
    #[serde(rename = "h")]
    pub height: u16,
}

/// Per-stage inference timings in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PerfCounters {
    pub preprocess: u16,
    pub inference: u16,
    pub postprocess: u16,
}

/// Serializable view of one frame's metadata
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetadataRecord<'a> {
    #[serde(rename = "frame")]
    pub frame_id: u32,
    /// Milliseconds since the previous frame was built
    pub dt_ms: u32,
    pub perf: PerfCounters,
    #[serde(rename = "boxes")]
    pub detections: &'a [Detection],
}

impl<'a> MetadataRecord<'a> {
    /// Create a record, keeping at most [`MAX_DETECTIONS`] detections
    pub fn new(frame_id: u32, dt_ms: u32, perf: PerfCounters, detections: &'a [Detection]) -> Self {
        let kept = detections.len().min(MAX_DETECTIONS);
        Self {
            frame_id,
            dt_ms,
            perf,
            detections: &detections[..kept],
        }
    }

    /// Serialize to a single-line JSON object
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(|_| RecordError::Serialize)
    }
}

/// Recover the frame id from a metadata record
///
/// Scans for the `"frame":` key and reads the unsigned integer after it.
/// Returns `None` if the key is missing or not followed by digits.
pub fn extract_frame_id(record: &str) -> Option<u32> {
    let start = record.find(FRAME_KEY)? + FRAME_KEY.len();
    leading_uint(&record[start..])
}

/// Class ids of the detections in a metadata record, in record order
///
/// Scans for each `"target":` key. Entries that do not parse as a class id
/// are skipped; at most [`MAX_DETECTIONS`] are returned.
pub fn detection_classes(record: &str) -> heapless::Vec<u8, MAX_DETECTIONS> {
    let mut classes = heapless::Vec::new();
    let mut rest = record;
    while let Some(pos) = rest.find(TARGET_KEY) {
        rest = &rest[pos + TARGET_KEY.len()..];
        let Some(class_id) = leading_uint(rest).and_then(|v| u8::try_from(v).ok()) else {
            continue;
        };
        if classes.push(class_id).is_err() {
            break;
        }
    }
    classes
}

fn leading_uint(text: &str) -> Option<u32> {
    let rest = text.trim_start();
    let digits = rest
        .as_bytes()
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    rest[..digits].parse().ok()
}
