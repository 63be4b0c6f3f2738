//! RP2040 flash: key-value partition plus the raw driver
//!
//! ```text
//! 0x000000  firmware (up to 1MB)
//! ...       image slot ring (see image_store)
//! 0x1F0000  key-value partition, 64KB, sequential-storage map
//! 0x200000  end of the 2MB Pico flash
//! ```

use core::ops::Range;

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

pub use vstlink_hal::flash::{FlashError, StorageKey};

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const CONFIG_PARTITION_SIZE: usize = 64 * 1024;
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

const CONFIG_RANGE: Range<u32> = (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest key-value item; an uploaded `link.toml` is the biggest
const MAX_ITEM_SIZE: usize = 2048;

/// Flash driver shared by the key-value map and the image ring
pub type RawFlash<'d> = Flash<'d, FLASH, Async, FLASH_SIZE>;

pub struct Rp2040FlashStorage<'d> {
    flash: RawFlash<'d>,
    scratch: [u8; MAX_ITEM_SIZE],
}

impl<'d> Rp2040FlashStorage<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
            scratch: [0; MAX_ITEM_SIZE],
        }
    }

    /// Raw access outside the key-value partition
    pub fn flash(&mut self) -> &mut RawFlash<'d> {
        &mut self.flash
    }
}

fn map_error<E>(e: sequential_storage::Error<E>) -> FlashError {
    match e {
        sequential_storage::Error::Storage { .. } => FlashError::Flash,
        sequential_storage::Error::FullStorage => FlashError::Full,
        sequential_storage::Error::Corrupted { .. } => FlashError::Corrupted,
        _ => FlashError::Storage,
    }
}

impl vstlink_hal::FlashStorage for Rp2040FlashStorage<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let item = fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut self.scratch,
            &key,
        )
        .await
        .map_err(map_error)?
        .ok_or(FlashError::NotFound)?;

        let dest = buffer
            .get_mut(..item.len())
            .ok_or(FlashError::BufferTooSmall)?;
        dest.copy_from_slice(item);
        Ok(item.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if data.len() > MAX_ITEM_SIZE {
            return Err(FlashError::BufferTooSmall);
        }
        store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut self.scratch,
            &key,
            &data,
        )
        .await
        .map_err(map_error)
    }
}
