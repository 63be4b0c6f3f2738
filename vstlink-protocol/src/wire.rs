//! Line framing and control messages
//!
//! Everything on the link except the image body is a `\n`-terminated ASCII
//! line. Outgoing lines use a bare `\n`; incoming lines tolerate `\r\n` and
//! surrounding whitespace.

use alloc::vec::Vec;
use core::fmt::Write;

use crate::checksum::image_checksum;

/// Tag opening a frame's metadata line
pub const METADATA_TAG: &str = "METADATA";

/// Tag opening the image header line
pub const IMAGE_TAG: &str = "IMAGE";

/// Terminator line closing a frame
pub const END_LINE: &str = "END";

/// Positive acknowledgement tag
pub const ACK_TAG: &str = "ACK";

/// Negative acknowledgement tag
pub const NACK_TAG: &str = "NACK";

/// Longest text line either side accepts, excluding the terminator
pub const MAX_LINE_LEN: usize = 2048;

/// Longest encoded control line (`NACK 4294967295\n`)
pub const MAX_CONTROL_LEN: usize = 16;

/// Fixed bytes a frame adds around its metadata and image
const FRAME_OVERHEAD: usize = 48;

/// Declared size and checksum of an image body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageHeader {
    /// Body length in bytes
    pub len: usize,
    /// CRC-32 of the body
    pub checksum: u32,
}

impl ImageHeader {
    /// Header describing the given body
    pub fn for_image(image: &[u8]) -> Self {
        Self {
            len: image.len(),
            checksum: image_checksum(image),
        }
    }

    /// Parse `IMAGE <len> <hex>`
    ///
    /// The checksum accepts upper or lower case hex of up to 8 digits.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_ascii_whitespace();
        if fields.next()? != IMAGE_TAG {
            return None;
        }
        let len = fields.next()?.parse().ok()?;
        let hex = fields.next()?;
        if hex.len() > 8 || fields.next().is_some() {
            return None;
        }
        let checksum = u32::from_str_radix(hex, 16).ok()?;
        Some(Self { len, checksum })
    }
}

/// Encode one complete frame as it goes on the wire
///
/// `metadata` is the JSON record and `image` the base64 body. The bytes are
/// built once so retransmissions repeat them exactly.
pub fn encode_frame(metadata: &str, image: &[u8]) -> Vec<u8> {
    let header = ImageHeader::for_image(image);
    let mut line: heapless::String<40> = heapless::String::new();
    // 5 + 1 + 20 + 1 + 8 + 1 fits
    let _ = writeln!(line, "{} {} {:08x}", IMAGE_TAG, header.len, header.checksum);

    let mut out = Vec::with_capacity(metadata.len() + image.len() + FRAME_OVERHEAD);
    out.extend_from_slice(METADATA_TAG.as_bytes());
    out.push(b' ');
    out.extend_from_slice(metadata.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(image);
    out.extend_from_slice(END_LINE.as_bytes());
    out.push(b'\n');
    out
}

/// Receiver-to-producer control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Frame received with a matching checksum
    Ack(u32),
    /// Frame received with a checksum mismatch
    Nack(u32),
}

impl Control {
    /// Frame id the message refers to
    pub fn frame_id(&self) -> u32 {
        match self {
            Control::Ack(id) | Control::Nack(id) => *id,
        }
    }

    /// Parse a control line; anything other than `ACK <u32>` or `NACK <u32>` is `None`
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_ascii_whitespace();
        let tag = fields.next()?;
        let frame_id = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        match tag {
            ACK_TAG => Some(Control::Ack(frame_id)),
            NACK_TAG => Some(Control::Nack(frame_id)),
            _ => None,
        }
    }

    /// Encode including the trailing `\n`
    pub fn encode(&self) -> heapless::Vec<u8, MAX_CONTROL_LEN> {
        let mut line: heapless::String<MAX_CONTROL_LEN> = heapless::String::new();
        let _ = match self {
            Control::Ack(id) => writeln!(line, "{} {}", ACK_TAG, id),
            Control::Nack(id) => writeln!(line, "{} {}", NACK_TAG, id),
        };
        line.into_bytes()
    }
}

/// Result of pushing one byte into a [`LineBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinePush {
    /// Line still accumulating
    Pending,
    /// A `\n` arrived; the line is available until [`LineBuffer::clear`]
    Complete,
    /// The line exceeded capacity; bytes up to the next `\n` are dropped
    Overflow,
}

/// Fixed-capacity accumulator for `\n`-terminated lines
#[derive(Debug, Clone, Default)]
pub struct LineBuffer<const N: usize> {
    buf: heapless::Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            discarding: false,
        }
    }

    /// Push one byte
    pub fn push(&mut self, byte: u8) -> LinePush {
        if byte == b'\n' {
            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                return LinePush::Pending;
            }
            return LinePush::Complete;
        }
        if self.discarding {
            return LinePush::Pending;
        }
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            self.discarding = true;
            return LinePush::Overflow;
        }
        LinePush::Pending
    }

    /// Seed the buffer with bytes already consumed elsewhere
    pub fn extend(&mut self, bytes: &[u8]) {
        self.clear();
        if self.buf.extend_from_slice(bytes).is_err() {
            self.buf.clear();
        }
    }

    /// Current line with `\r` and surrounding whitespace trimmed
    ///
    /// Returns `None` if the bytes are not UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.buf).ok().map(str::trim)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let bytes = encode_frame(r#"{"frame":1}"#, b"QUJD");
        let text = core::str::from_utf8(&bytes).unwrap();
        let expected_crc = image_checksum(b"QUJD");
        let expected = alloc::format!(
            "METADATA {{\"frame\":1}}\nIMAGE 4 {:08x}\nQUJDEND\n",
            expected_crc
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_encode_frame_empty_image() {
        let bytes = encode_frame(r#"{"frame":2}"#, b"");
        let text = core::str::from_utf8(&bytes).unwrap();
        assert!(text.ends_with("\nIMAGE 0 00000000\nEND\n"));
    }

    #[test]
    fn test_image_header_parse() {
        assert_eq!(
            ImageHeader::parse("IMAGE 1024 0a1B2c3D"),
            Some(ImageHeader {
                len: 1024,
                checksum: 0x0A1B_2C3D
            })
        );
        assert_eq!(ImageHeader::parse("IMAGE 0 0"), Some(ImageHeader { len: 0, checksum: 0 }));
    }

    #[test]
    fn test_image_header_rejects_malformed() {
        assert_eq!(ImageHeader::parse("IMAGE"), None);
        assert_eq!(ImageHeader::parse("IMAGE 10"), None);
        assert_eq!(ImageHeader::parse("IMAGE -1 00000000"), None);
        assert_eq!(ImageHeader::parse("IMAGE 10 123456789"), None);
        assert_eq!(ImageHeader::parse("IMAGE 10 zz"), None);
        assert_eq!(ImageHeader::parse("IMAGES 10 00000000"), None);
        assert_eq!(ImageHeader::parse("IMAGE 10 00000000 extra"), None);
    }

    #[test]
    fn test_control_encode() {
        assert_eq!(&Control::Ack(7).encode()[..], b"ACK 7\n");
        assert_eq!(&Control::Nack(u32::MAX).encode()[..], b"NACK 4294967295\n");
    }

    #[test]
    fn test_control_parse() {
        assert_eq!(Control::parse("ACK 7"), Some(Control::Ack(7)));
        assert_eq!(Control::parse("  NACK 12 "), Some(Control::Nack(12)));
        assert_eq!(Control::parse("ACK"), None);
        assert_eq!(Control::parse("ACK x"), None);
        assert_eq!(Control::parse("ack 7"), None);
        assert_eq!(Control::parse("ACK 7 8"), None);
        assert_eq!(Control::parse("END"), None);
    }

    #[test]
    fn test_line_buffer_crlf() {
        let mut line: LineBuffer<16> = LineBuffer::new();
        for &b in b"ACK 3\r" {
            assert_eq!(line.push(b), LinePush::Pending);
        }
        assert_eq!(line.push(b'\n'), LinePush::Complete);
        assert_eq!(line.as_str(), Some("ACK 3"));
    }

    #[test]
    fn test_line_buffer_overflow_discards_to_newline() {
        let mut line: LineBuffer<4> = LineBuffer::new();
        for &b in b"ABCD" {
            assert_eq!(line.push(b), LinePush::Pending);
        }
        assert_eq!(line.push(b'E'), LinePush::Overflow);
        assert_eq!(line.push(b'F'), LinePush::Pending);
        assert_eq!(line.push(b'\n'), LinePush::Pending);
        for &b in b"OK" {
            line.push(b);
        }
        assert_eq!(line.push(b'\n'), LinePush::Complete);
        assert_eq!(line.as_str(), Some("OK"));
    }
}
