//! Sender side of the link
//!
//! One frame in flight. The transitions live on [`SenderState`]; the
//! session owns the cached frame, writes it to the link and keeps counters.

pub mod session;
pub mod state;

pub use session::{LinkStats, SenderSession};
pub use state::{LinkEvent, SenderAction, SenderState};
