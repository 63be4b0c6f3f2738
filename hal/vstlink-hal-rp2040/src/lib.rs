//! RP2040-specific HAL for the VSTLINK receiver station
//!
//! This crate provides RP2040 implementations of the shared `vstlink-hal`
//! traits:
//!
//! - Monotonic millisecond clock on the embassy time driver
//! - Indicator LED outputs
//! - Flash key-value storage (implements `vstlink_hal::FlashStorage`)
//! - Ring of flash slots for received JPEG stills

#![no_std]

pub mod flash;
pub mod gpio;
pub mod image_store;
pub mod time;

// Re-export shared traits from vstlink-hal for convenience
pub use vstlink_hal::{FlashStorage as FlashStorageTrait, Polarity, StorageKey};
