//! Image payload checksum
//!
//! CRC-32 (IEEE 802.3, reflected, init and xorout `0xFFFFFFFF`) over the
//! base64 text bytes. This is the same value `crc32_le(0, ..)` produces on
//! the producer module, and the checksum of an empty payload is `0`.

/// Compute the checksum declared in the `IMAGE` header line
pub fn image_checksum(text: &[u8]) -> u32 {
    crc32fast::hash(text)
}
