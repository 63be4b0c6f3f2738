//! Receiver-side frame parser
//!
//! Bytes are fed one at a time. Lines are accumulated until the `IMAGE`
//! header declares the body length; the body is then counted byte by byte
//! without looking for line terminators, and line mode resumes for `END`.
//! Every body byte counts, corrupted or not; the checksum decides.
//!
//! ```text
//!   AwaitingMetadata --METADATA--> AwaitingImageHeader --IMAGE n--> ReadingImage
//!          ^                                                 |  n == 0     | n bytes
//!          |                                                 v             v
//!          +----------- END (checksum verified) -------- AwaitingTerminator
//! ```
//!
//! A `METADATA` line seen in any state abandons the frame in progress and
//! starts a new one. Inside a body the tag is spotted by its trailing space,
//! which base64 text never contains.

use alloc::string::String;
use alloc::vec::Vec;

use crate::checksum::image_checksum;
use crate::record::extract_frame_id;
use crate::wire::{ImageHeader, LineBuffer, LinePush, END_LINE, MAX_LINE_LEN, METADATA_TAG};

/// Default upper bound on a declared image body
pub const DEFAULT_MAX_IMAGE_LEN: usize = 96 * 1024;

/// Errors reported while parsing
///
/// Every error leaves the parser ready for the next frame; none is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Image body checksum did not match the header
    ChecksumMismatch {
        frame_id: u32,
        expected: u32,
        computed: u32,
    },
    /// Metadata line without a recoverable frame id
    MissingFrameId,
    /// Header declared a body larger than the configured maximum
    ImageTooLarge { frame_id: u32, len: usize },
    /// Could not reserve memory for the declared body
    OutOfMemory { frame_id: u32, len: usize },
    /// Expected an `IMAGE` header or `END` and got something else
    UnexpectedLine { frame_id: u32 },
    /// Body cut short by the start of the next frame
    TruncatedImage { frame_id: u32 },
    /// A new `METADATA` line replaced a frame in progress
    Resynchronized { abandoned: u32, frame_id: u32 },
    /// Line exceeded [`MAX_LINE_LEN`]
    LineTooLong,
}

/// Parser phase, exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxPhase {
    AwaitingMetadata,
    AwaitingImageHeader,
    ReadingImage,
    AwaitingTerminator,
}

/// A frame whose body matched its declared checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame_id: u32,
    /// JSON record, without the `METADATA ` tag
    pub metadata: String,
    /// Base64 body exactly as received
    pub image_text: Vec<u8>,
    pub checksum: u32,
}

#[derive(Debug, Default)]
enum ParseState {
    #[default]
    AwaitingMetadata,
    AwaitingImageHeader {
        frame_id: u32,
        metadata: String,
    },
    ReadingImage {
        frame_id: u32,
        metadata: String,
        header: ImageHeader,
        image: Vec<u8>,
    },
    AwaitingTerminator {
        frame_id: u32,
        metadata: String,
        header: ImageHeader,
        image: Vec<u8>,
    },
}

impl ParseState {
    fn phase(&self) -> RxPhase {
        match self {
            ParseState::AwaitingMetadata => RxPhase::AwaitingMetadata,
            ParseState::AwaitingImageHeader { .. } => RxPhase::AwaitingImageHeader,
            ParseState::ReadingImage { .. } => RxPhase::ReadingImage,
            ParseState::AwaitingTerminator { .. } => RxPhase::AwaitingTerminator,
        }
    }

    fn frame_id(&self) -> Option<u32> {
        match self {
            ParseState::AwaitingMetadata => None,
            ParseState::AwaitingImageHeader { frame_id, .. }
            | ParseState::ReadingImage { frame_id, .. }
            | ParseState::AwaitingTerminator { frame_id, .. } => Some(*frame_id),
        }
    }
}

/// Byte-fed frame parser
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    line: LineBuffer<MAX_LINE_LEN>,
    max_image_len: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_LEN)
    }
}

impl FrameParser {
    /// Create a parser rejecting bodies longer than `max_image_len`
    pub fn new(max_image_len: usize) -> Self {
        Self {
            state: ParseState::AwaitingMetadata,
            line: LineBuffer::new(),
            max_image_len,
        }
    }

    /// Current phase
    pub fn phase(&self) -> RxPhase {
        self.state.phase()
    }

    /// Frame id of the frame in progress, if any
    pub fn current_frame_id(&self) -> Option<u32> {
        self.state.frame_id()
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = ParseState::AwaitingMetadata;
        self.line.clear();
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when `END` closes a frame whose checksum
    /// matched, `Ok(None)` when more bytes are needed, or `Err` when a frame
    /// was rejected or abandoned.
    pub fn feed(&mut self, byte: u8) -> Result<Option<ReceivedFrame>, FrameError> {
        if let ParseState::ReadingImage { .. } = self.state {
            return self.feed_body(byte).map(|_| None);
        }

        match self.line.push(byte) {
            LinePush::Pending => Ok(None),
            LinePush::Overflow => {
                self.state = ParseState::AwaitingMetadata;
                Err(FrameError::LineTooLong)
            }
            LinePush::Complete => {
                let Self {
                    state,
                    line,
                    max_image_len,
                } = self;
                let result = match line.as_str() {
                    Some(text) => handle_line(state, text, *max_image_len),
                    None => Ok(None),
                };
                line.clear();
                result
            }
        }
    }

    /// Feed multiple bytes, stopping at the first completed frame or error
    ///
    /// Returns the number of bytes consumed alongside the result.
    pub fn feed_bytes(
        &mut self,
        bytes: &[u8],
    ) -> (usize, Result<Option<ReceivedFrame>, FrameError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => {}
                other => return (i + 1, other),
            }
        }
        (bytes.len(), Ok(None))
    }

    fn feed_body(&mut self, byte: u8) -> Result<(), FrameError> {
        let ParseState::ReadingImage {
            frame_id,
            header,
            image,
            ..
        } = &mut self.state
        else {
            return Ok(());
        };

        // The next frame started inside our body
        if byte == b' ' && image.ends_with(METADATA_TAG.as_bytes()) {
            let abandoned = *frame_id;
            self.reset();
            self.line.extend(METADATA_TAG.as_bytes());
            self.line.push(b' ');
            return Err(FrameError::TruncatedImage {
                frame_id: abandoned,
            });
        }

        image.push(byte);
        if image.len() >= header.len {
            if let ParseState::ReadingImage {
                frame_id,
                metadata,
                header,
                image,
            } = core::mem::take(&mut self.state)
            {
                self.state = ParseState::AwaitingTerminator {
                    frame_id,
                    metadata,
                    header,
                    image,
                };
            }
        }
        Ok(())
    }
}

fn handle_line(
    state: &mut ParseState,
    text: &str,
    max_image_len: usize,
) -> Result<Option<ReceivedFrame>, FrameError> {
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(record) = text
        .strip_prefix(METADATA_TAG)
        .and_then(|rest| rest.strip_prefix(' '))
    {
        let abandoned = state.frame_id();
        *state = ParseState::AwaitingMetadata;
        let record = record.trim();
        let frame_id = extract_frame_id(record).ok_or(FrameError::MissingFrameId)?;
        *state = ParseState::AwaitingImageHeader {
            frame_id,
            metadata: String::from(record),
        };
        return match abandoned {
            Some(abandoned) => Err(FrameError::Resynchronized { abandoned, frame_id }),
            None => Ok(None),
        };
    }

    match core::mem::take(state) {
        // Noise between frames
        ParseState::AwaitingMetadata => Ok(None),
        ParseState::AwaitingImageHeader { frame_id, metadata } => {
            let header = ImageHeader::parse(text).ok_or(FrameError::UnexpectedLine { frame_id })?;
            if header.len > max_image_len {
                return Err(FrameError::ImageTooLarge {
                    frame_id,
                    len: header.len,
                });
            }
            let mut image = Vec::new();
            image
                .try_reserve_exact(header.len)
                .map_err(|_| FrameError::OutOfMemory {
                    frame_id,
                    len: header.len,
                })?;
            *state = if header.len == 0 {
                ParseState::AwaitingTerminator {
                    frame_id,
                    metadata,
                    header,
                    image,
                }
            } else {
                ParseState::ReadingImage {
                    frame_id,
                    metadata,
                    header,
                    image,
                }
            };
            Ok(None)
        }
        ParseState::AwaitingTerminator {
            frame_id,
            metadata,
            header,
            image,
        } => {
            if text != END_LINE {
                return Err(FrameError::UnexpectedLine { frame_id });
            }
            let computed = image_checksum(&image);
            if computed != header.checksum {
                return Err(FrameError::ChecksumMismatch {
                    frame_id,
                    expected: header.checksum,
                    computed,
                });
            }
            Ok(Some(ReceivedFrame {
                frame_id,
                metadata,
                image_text: image,
                checksum: computed,
            }))
        }
        reading @ ParseState::ReadingImage { .. } => {
            *state = reading;
            Ok(None)
        }
    }
}
