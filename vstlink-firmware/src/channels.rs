//! Inter-task communication channels
//!
//! Static embassy-sync primitives connecting the link, storage and
//! indicator tasks.

use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use vstlink_protocol::Control;

/// One image is in flight at a time; a second slot absorbs a resend
const IMAGE_CHANNEL_SIZE: usize = 2;

/// Control lines queued for the link TX task
const CONTROL_CHANNEL_SIZE: usize = 4;

/// Detection classes queued for the indicator task
const CLASS_CHANNEL_SIZE: usize = 16;

/// Verified JPEG stills waiting for flash, with their frame id
pub static IMAGE_CHANNEL: Channel<CriticalSectionRawMutex, (u32, Vec<u8>), IMAGE_CHANNEL_SIZE> =
    Channel::new();

/// ACK/NACK lines to send back to the producer
pub static CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, Control, CONTROL_CHANNEL_SIZE> =
    Channel::new();

/// Detection classes from accepted frames
pub static CLASS_CHANNEL: Channel<CriticalSectionRawMutex, u8, CLASS_CHANNEL_SIZE> =
    Channel::new();
