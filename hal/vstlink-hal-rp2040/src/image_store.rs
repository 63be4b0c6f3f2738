//! Flash image ring
//!
//! Received stills are written round-robin into fixed-size slots directly
//! below the key-value partition. Each slot starts with a 64-byte header:
//!
//! ```text
//! 0   magic     u32 LE  "VSI1"
//! 4   frame_id  u32 LE
//! 8   len       u32 LE  JPEG byte count
//! 12  name_len  u8
//! 13  reserved  [u8; 3] (0xFF)
//! 16  name      [u8; 48] artifact name, 0xFF padded
//! 256 JPEG bytes, starting on the next program page
//! ```
//!
//! The header is programmed after the image bytes, so a slot interrupted
//! mid-write never carries a valid magic. The index of the next slot to write
//! is kept in the key-value partition under [`StorageKey::ImageCursor`].

use embedded_storage_async::nor_flash::{NorFlash, ReadNorFlash};
use vstlink_hal::FlashStorage;
use vstlink_core::naming::{ArtifactName, MAX_ARTIFACT_NAME_LEN};
use vstlink_core::traits::StoreError;

use crate::flash::{FlashError, Rp2040FlashStorage, StorageKey, CONFIG_PARTITION_START};

/// Slot size, a multiple of the 4KB erase sector
pub const IMAGE_SLOT_SIZE: usize = 76 * 1024;
pub const IMAGE_SLOT_COUNT: u32 = 12;
pub const IMAGE_PARTITION_SIZE: usize = IMAGE_SLOT_SIZE * IMAGE_SLOT_COUNT as usize;
pub const IMAGE_PARTITION_START: usize = CONFIG_PARTITION_START - IMAGE_PARTITION_SIZE;

pub const SLOT_HEADER_SIZE: usize = 64;
const PROGRAM_CHUNK: usize = 256;
const DATA_OFFSET: usize = PROGRAM_CHUNK;
/// Largest JPEG a slot can hold
pub const MAX_IMAGE_BYTES: usize = IMAGE_SLOT_SIZE - DATA_OFFSET;

const SLOT_MAGIC: u32 = u32::from_le_bytes(*b"VSI1");
const NAME_OFFSET: usize = 16;
const ERASED: u8 = 0xFF;

/// Header of an occupied slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHeader {
    pub frame_id: u32,
    pub len: u32,
    pub name: ArtifactName,
}

impl SlotHeader {
    pub fn encode(&self) -> [u8; SLOT_HEADER_SIZE] {
        let mut raw = [ERASED; SLOT_HEADER_SIZE];
        raw[0..4].copy_from_slice(&SLOT_MAGIC.to_le_bytes());
        raw[4..8].copy_from_slice(&self.frame_id.to_le_bytes());
        raw[8..12].copy_from_slice(&self.len.to_le_bytes());
        let name = self.name.as_bytes();
        raw[12] = name.len() as u8;
        raw[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);
        raw
    }

    /// Decode a slot header, `None` for an empty or torn slot
    pub fn decode(raw: &[u8; SLOT_HEADER_SIZE]) -> Option<Self> {
        let word =
            |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        if word(0) != SLOT_MAGIC {
            return None;
        }
        let len = word(8);
        let name_len = raw[12] as usize;
        if len as usize > MAX_IMAGE_BYTES || name_len > MAX_ARTIFACT_NAME_LEN {
            return None;
        }
        let name = core::str::from_utf8(&raw[NAME_OFFSET..NAME_OFFSET + name_len]).ok()?;
        let name = ArtifactName::try_from(name).ok()?;
        Some(Self {
            frame_id: word(4),
            len,
            name,
        })
    }
}

/// Flash offset of a slot
pub fn slot_offset(slot: u32) -> u32 {
    (IMAGE_PARTITION_START + (slot % IMAGE_SLOT_COUNT) as usize * IMAGE_SLOT_SIZE) as u32
}

/// Round-robin image store on top of the RP2040 flash driver
pub struct ImageStore<'d> {
    storage: Rp2040FlashStorage<'d>,
    /// Total images written; the next slot is `cursor % IMAGE_SLOT_COUNT`
    cursor: u32,
}

impl<'d> ImageStore<'d> {
    /// Take over the flash driver and restore the persisted cursor
    pub async fn open(mut storage: Rp2040FlashStorage<'d>) -> Self {
        let cursor = storage.read_u32(StorageKey::ImageCursor).await.unwrap_or(0);
        Self { storage, cursor }
    }

    /// Number of images written since the partition was first used
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Slot the most recent image went to
    pub fn last_slot(&self) -> Option<u32> {
        self.cursor.checked_sub(1).map(|last| last % IMAGE_SLOT_COUNT)
    }

    /// Write one image into the next slot, overwriting the oldest
    ///
    /// Returns the slot index used.
    pub async fn store(
        &mut self,
        frame_id: u32,
        name: &str,
        jpeg: &[u8],
    ) -> Result<u32, StoreError> {
        if jpeg.len() > MAX_IMAGE_BYTES {
            return Err(StoreError::TooLarge);
        }
        let header = SlotHeader {
            frame_id,
            len: jpeg.len() as u32,
            name: ArtifactName::try_from(name).map_err(|_| StoreError::TooLarge)?,
        };

        let slot = self.cursor % IMAGE_SLOT_COUNT;
        let base = slot_offset(slot);
        let flash = self.storage.flash();
        flash
            .erase(base, base + IMAGE_SLOT_SIZE as u32)
            .await
            .map_err(|_| StoreError::Write)?;

        let mut chunk = [ERASED; PROGRAM_CHUNK];
        let mut offset = base + DATA_OFFSET as u32;
        for part in jpeg.chunks(PROGRAM_CHUNK) {
            chunk[..part.len()].copy_from_slice(part);
            chunk[part.len()..].fill(ERASED);
            flash
                .write(offset, &chunk)
                .await
                .map_err(|_| StoreError::Write)?;
            offset += PROGRAM_CHUNK as u32;
        }
        flash
            .write(base, &header.encode())
            .await
            .map_err(|_| StoreError::Write)?;

        self.cursor = self.cursor.wrapping_add(1);
        self.storage
            .write_u32(StorageKey::ImageCursor, self.cursor)
            .await
            .map_err(|_| StoreError::Write)?;
        Ok(slot)
    }

    /// Read back the header of a slot
    pub async fn header(&mut self, slot: u32) -> Result<Option<SlotHeader>, FlashError> {
        let mut raw = [0u8; SLOT_HEADER_SIZE];
        self.storage
            .flash()
            .read(slot_offset(slot), &mut raw)
            .await
            .map_err(|_| FlashError::Flash)?;
        Ok(SlotHeader::decode(&raw))
    }

    /// Give the flash driver back
    pub fn into_storage(self) -> Rp2040FlashStorage<'d> {
        self.storage
    }
}
