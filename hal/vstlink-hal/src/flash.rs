//! Persistent key-value storage
//!
//! The receiver station keeps a handful of small items in flash: its link
//! configuration (binary and TOML) and the image ring cursor. Chip HALs back
//! this with a wear-levelled map.

use core::future::Future;

/// Item keys, one byte on flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// `LinkConfig` as postcard bytes
    LinkConfig = 0,
    /// `link.toml` text uploaded in the field
    LinkConfigToml = 1,
    /// Images written so far (u32 LE)
    ImageCursor = 2,
}

impl TryFrom<u8> for StorageKey {
    type Error = FlashError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::LinkConfig),
            1 => Ok(Self::LinkConfigToml),
            2 => Ok(Self::ImageCursor),
            _ => Err(FlashError::Corrupted),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Raw read, erase or program failed
    Flash,
    /// The map layer failed
    Storage,
    NotFound,
    /// Item does not fit the caller's buffer or the item limit
    BufferTooSmall,
    /// Stored bytes are unreadable or have the wrong shape
    Corrupted,
    Full,
}

/// Wear-levelled key-value storage
pub trait FlashStorage {
    /// Copy the item into `buffer`, returning its length
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize, FlashError>>;

    /// Replace the item
    fn write(&mut self, key: StorageKey, data: &[u8])
        -> impl Future<Output = Result<(), FlashError>>;

    /// Read a little-endian `u32` item
    fn read_u32(&mut self, key: StorageKey) -> impl Future<Output = Result<u32, FlashError>> {
        async move {
            let mut raw = [0u8; 4];
            match self.read(key, &mut raw).await {
                Ok(4) => Ok(u32::from_le_bytes(raw)),
                Ok(_) | Err(FlashError::BufferTooSmall) => Err(FlashError::Corrupted),
                Err(e) => Err(e),
            }
        }
    }

    fn write_u32(
        &mut self,
        key: StorageKey,
        value: u32,
    ) -> impl Future<Output = Result<(), FlashError>> {
        async move { self.write(key, &value.to_le_bytes()).await }
    }
}

#[cfg(feature = "sequential-storage")]
mod map_key {
    use super::StorageKey;
    use sequential_storage::map::{Key, SerializationError};

    impl Key for StorageKey {
        fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
            let slot = buffer
                .first_mut()
                .ok_or(SerializationError::BufferTooSmall)?;
            *slot = *self as u8;
            Ok(1)
        }

        fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError> {
            let byte = *buffer.first().ok_or(SerializationError::BufferTooSmall)?;
            let key = StorageKey::try_from(byte).map_err(|_| SerializationError::InvalidFormat)?;
            Ok((key, 1))
        }
    }
}
