//! Sender state machine
//!
//! ```text
//!            FrameReady                      Ack(id)
//!   Idle ─────────────────> AwaitingAck ─────────────────> Idle
//!    ^                        │    ^  │
//!    │                 Nack(id)    │  │ timeout, retries == max
//!    │              or timeout ────┘  v
//!    └────────── Ack(any) ─────────  Paused  (FrameReady is suppressed)
//! ```

use crate::config::TransportConfig;

/// Sender states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SenderState {
    /// Nothing in flight
    #[default]
    Idle,
    /// The cached frame was sent and is unresolved
    AwaitingAck {
        frame_id: u32,
        sent_at_ms: u32,
        retries: u8,
    },
    /// Retry ceiling reached; nothing is sent until an ACK arrives
    Paused { retries: u8 },
}

/// Inputs to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// A new frame was built and cached
    FrameReady { frame_id: u32, now_ms: u32 },
    /// `ACK <frame_id>` received
    Ack { frame_id: u32 },
    /// `NACK <frame_id>` received
    Nack { frame_id: u32, now_ms: u32 },
    /// Periodic timeout check
    Tick { now_ms: u32 },
}

/// What the caller must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SenderAction {
    /// Send the cached frame for the first time
    Transmit,
    /// Send the cached frame again, unchanged
    Retransmit,
    /// In-flight frame acknowledged
    Acknowledged,
    /// Retry ceiling reached, transmission paused
    Pause,
    /// Frame built while paused, not sent
    Suppress,
    /// ACK while paused, transmission resumes
    Recovered,
    /// Nothing to do
    Ignore,
}

impl SenderState {
    /// A frame is in flight
    pub fn awaiting_ack(&self) -> bool {
        matches!(self, SenderState::AwaitingAck { .. })
    }

    /// Transmission is paused
    pub fn transport_paused(&self) -> bool {
        matches!(self, SenderState::Paused { .. })
    }

    /// Timeouts counted for the current frame
    pub fn retry_count(&self) -> u8 {
        match self {
            SenderState::Idle => 0,
            SenderState::AwaitingAck { retries, .. } | SenderState::Paused { retries } => *retries,
        }
    }

    /// When the in-flight frame was last sent
    pub fn last_send_ms(&self) -> Option<u32> {
        match self {
            SenderState::AwaitingAck { sent_at_ms, .. } => Some(*sent_at_ms),
            _ => None,
        }
    }

    /// Id of the in-flight frame
    pub fn in_flight(&self) -> Option<u32> {
        match self {
            SenderState::AwaitingAck { frame_id, .. } => Some(*frame_id),
            _ => None,
        }
    }

    /// Process an event and return the next state with the action to take
    pub fn on_event(self, event: LinkEvent, transport: &TransportConfig) -> (Self, SenderAction) {
        use LinkEvent::*;
        use SenderAction::*;
        use SenderState::*;

        match (self, event) {
            (Idle, FrameReady { frame_id, now_ms }) => (
                AwaitingAck {
                    frame_id,
                    sent_at_ms: now_ms,
                    retries: 0,
                },
                Transmit,
            ),

            (AwaitingAck { frame_id, .. }, Ack { frame_id: acked }) if acked == frame_id => {
                (Idle, Acknowledged)
            }
            (
                AwaitingAck {
                    frame_id, retries, ..
                },
                Nack {
                    frame_id: nacked,
                    now_ms,
                },
            ) if nacked == frame_id => (
                AwaitingAck {
                    frame_id,
                    sent_at_ms: now_ms,
                    retries,
                },
                Retransmit,
            ),
            (
                AwaitingAck {
                    frame_id,
                    sent_at_ms,
                    retries,
                },
                Tick { now_ms },
            ) if now_ms.wrapping_sub(sent_at_ms) > transport.ack_timeout_ms => {
                let retries = retries.saturating_add(1);
                if retries < transport.max_retries {
                    (
                        AwaitingAck {
                            frame_id,
                            sent_at_ms: now_ms,
                            retries,
                        },
                        Retransmit,
                    )
                } else {
                    (Paused { retries }, Pause)
                }
            }
            // A new frame is never offered while one is in flight
            (state @ AwaitingAck { .. }, _) => (state, Ignore),

            (state @ Paused { .. }, FrameReady { .. }) => (state, Suppress),
            (Paused { .. }, Ack { .. }) => (Idle, Recovered),
            (state @ Paused { .. }, _) => (state, Ignore),

            (Idle, _) => (Idle, Ignore),
        }
    }
}
