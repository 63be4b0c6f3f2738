//! VSTLINK Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the frame transport runs on. Chip
//! HALs implement them; the protocol and core crates only ever see the traits,
//! so the same link logic runs on the producer board, the receiver station
//! and on the host under test.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  vstlink-core / vstlink-firmware        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  vstlink-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ vstlink-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::SerialTx`], [`uart::SerialRx`] - Serial link with bounded reads
//! - [`gpio::Led`] - Indicator LEDs, wiring polarity hidden
//! - [`time::Clock`] - Monotonic millisecond clock
//! - [`flash::FlashStorage`] - Persistent key-value storage

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod gpio;
pub mod time;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use gpio::{Led, Polarity};
pub use time::Clock;
pub use uart::{SerialRx, SerialTx};
