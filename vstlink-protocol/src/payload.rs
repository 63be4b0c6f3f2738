//! Image payload decoding and JPEG sanity checks
//!
//! These run on the receiver after the checksum has matched. A payload
//! that fails here was transported intact but is not a usable still.

use alloc::vec::Vec;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const MARKER: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const STUFFED: u8 = 0x00;

/// Reasons a payload is unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Body is not valid base64
    Decode,
    /// Fewer than four decoded bytes
    TooShort,
    /// Does not start with `FF D8`
    MissingSoi,
    /// Segment header runs past the end of the buffer
    TruncatedSegment,
    /// Segment length field below 2
    InvalidSegmentLength,
    /// No start-of-scan marker
    MissingSos,
    /// No end-of-image marker
    MissingEoi,
}

/// Decode a standard-alphabet base64 body
pub fn decode_image(text: &[u8]) -> Result<Vec<u8>, PayloadError> {
    STANDARD.decode(text).map_err(|_| PayloadError::Decode)
}

/// Walk the JPEG marker structure
///
/// Requires SOI, well-formed segment lengths up to SOS, and an EOI either
/// before SOS or somewhere in the entropy-coded data after it.
pub fn check_jpeg(buf: &[u8]) -> Result<(), PayloadError> {
    if buf.len() < 4 {
        return Err(PayloadError::TooShort);
    }
    if buf[0] != MARKER || buf[1] != SOI {
        return Err(PayloadError::MissingSoi);
    }

    let mut found_sos = false;
    let mut found_eoi = false;
    let mut i = 2;

    while i + 1 < buf.len() {
        if buf[i] != MARKER {
            i += 1;
            continue;
        }
        match buf[i + 1] {
            STUFFED | MARKER => i += 1,
            EOI => {
                found_eoi = true;
                break;
            }
            SOS => {
                found_sos = true;
                found_eoi = scan_for_eoi(&buf[i + 2..]);
                break;
            }
            _ => {
                if i + 3 >= buf.len() {
                    return Err(PayloadError::TruncatedSegment);
                }
                let seg_len = u16::from_be_bytes([buf[i + 2], buf[i + 3]]) as usize;
                if seg_len < 2 {
                    return Err(PayloadError::InvalidSegmentLength);
                }
                i += 2 + seg_len;
            }
        }
    }

    if !found_sos {
        return Err(PayloadError::MissingSos);
    }
    if !found_eoi {
        return Err(PayloadError::MissingEoi);
    }
    Ok(())
}

/// Entropy-coded data: `FF 00` is a stuffed byte, `FF D9` ends the image
fn scan_for_eoi(data: &[u8]) -> bool {
    data.windows(2).any(|w| w[0] == MARKER && w[1] == EOI)
}
