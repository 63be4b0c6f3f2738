//! VSTLINK Frame Link Protocol
//!
//! This crate defines the UART protocol between a vision producer (camera
//! module plus inference engine) and a receiver station. One frame is in
//! flight at a time; the receiver answers every frame with ACK or NACK.
//!
//! # Protocol Overview
//!
//! A frame is three text lines around a byte-counted body:
//! ```text
//! METADATA {"frame":7,"dt_ms":412,"perf":{..},"boxes":[..]}\n
//! IMAGE <image_len> <crc32_hex8>\n
//! <image_len bytes of base64 text, no newline>
//! END\n
//! ```
//!
//! The receiver replies with a single control line:
//! ```text
//! ACK <frame_id>\n      checksum matched
//! NACK <frame_id>\n     checksum mismatch, resend the same bytes
//! ```
//!
//! The CRC covers the base64 *text*, not the decoded JPEG, so both ends can
//! verify a frame without decoding it.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod checksum;
pub mod parser;
pub mod payload;
pub mod record;
pub mod wire;

pub use checksum::image_checksum;
pub use parser::{FrameError, FrameParser, ReceivedFrame, RxPhase, DEFAULT_MAX_IMAGE_LEN};
pub use payload::{check_jpeg, decode_image, PayloadError};
pub use record::{
    detection_classes, extract_frame_id, Detection, MetadataRecord, PerfCounters, RecordError,
    MAX_DETECTIONS,
};
pub use wire::{encode_frame, Control, ImageHeader, LineBuffer, LinePush, MAX_LINE_LEN};
