//! Board-agnostic logic for the VSTLINK frame link
//!
//! This crate contains everything on either end of the link that does not
//! depend on a specific chip:
//!
//! - Collaborator traits (frame source, frame store, actuator, time source)
//! - Acquisition with busy backoff and a deadline
//! - Frame builder and the single-slot frame cache
//! - Sender state machine (one frame in flight, retry, pause)
//! - Receiver session (ACK/NACK, payload checks, storage hand-off)
//! - Indicator bank and artifact naming
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod indicator;
pub mod naming;
pub mod producer;
pub mod receiver;
pub mod sender;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use config::LinkConfig;
pub use producer::{Producer, StepOutcome};
pub use receiver::ReceiverSession;
pub use sender::{SenderSession, SenderState};
