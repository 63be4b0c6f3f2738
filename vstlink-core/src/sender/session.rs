//! Sender session
//!
//! Owns the state, the single cached frame and the link counters. Every
//! transmission writes the cached bytes verbatim, so a resend can never
//! differ from the original.

use vstlink_hal::SerialTx;
use vstlink_protocol::Control;

use super::state::{LinkEvent, SenderAction, SenderState};
use crate::config::TransportConfig;
use crate::producer::CachedFrame;

/// Link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub frames_sent: u32,
    pub retransmissions: u32,
    pub acks: u32,
    pub nacks: u32,
    pub timeouts: u32,
    pub pauses: u32,
    pub recoveries: u32,
    pub suppressed: u32,
    pub write_errors: u32,
}

/// Sender bookkeeping for one link
#[derive(Debug)]
pub struct SenderSession {
    state: SenderState,
    transport: TransportConfig,
    cached: Option<CachedFrame>,
    stats: LinkStats,
}

impl SenderSession {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            state: SenderState::Idle,
            transport,
            cached: None,
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn cached(&self) -> Option<&CachedFrame> {
        self.cached.as_ref()
    }

    pub fn awaiting_ack(&self) -> bool {
        self.state.awaiting_ack()
    }

    pub fn transport_paused(&self) -> bool {
        self.state.transport_paused()
    }

    pub fn retry_count(&self) -> u8 {
        self.state.retry_count()
    }

    /// A new frame may be cached
    pub fn ready_for_frame(&self) -> bool {
        !self.state.awaiting_ack()
    }

    /// Cache a newly built frame and send it unless paused
    ///
    /// The previous frame is only replaced once it was acknowledged or the
    /// link paused; offering while a frame is in flight is ignored.
    pub fn offer<T: SerialTx>(
        &mut self,
        frame: CachedFrame,
        now_ms: u32,
        tx: &mut T,
    ) -> SenderAction {
        if !self.ready_for_frame() {
            warn!("frame {} offered while a frame is in flight", frame.frame_id);
            return SenderAction::Ignore;
        }
        let event = LinkEvent::FrameReady {
            frame_id: frame.frame_id,
            now_ms,
        };
        self.cached = Some(frame);
        self.apply(event, tx)
    }

    /// Handle a control line from the receiver
    pub fn on_control<T: SerialTx>(
        &mut self,
        control: Control,
        now_ms: u32,
        tx: &mut T,
    ) -> SenderAction {
        let event = match control {
            Control::Ack(frame_id) => LinkEvent::Ack { frame_id },
            Control::Nack(frame_id) => LinkEvent::Nack { frame_id, now_ms },
        };
        self.apply(event, tx)
    }

    /// Check the ACK timeout
    pub fn poll<T: SerialTx>(&mut self, now_ms: u32, tx: &mut T) -> SenderAction {
        self.apply(LinkEvent::Tick { now_ms }, tx)
    }

    fn apply<T: SerialTx>(&mut self, event: LinkEvent, tx: &mut T) -> SenderAction {
        let (next, action) = self.state.on_event(event, &self.transport);
        let previous = self.state;
        self.state = next;

        match action {
            SenderAction::Transmit => {
                self.stats.frames_sent += 1;
                self.transmit(tx);
            }
            SenderAction::Retransmit => {
                self.stats.retransmissions += 1;
                match event {
                    LinkEvent::Nack { frame_id, .. } => {
                        self.stats.nacks += 1;
                        info!("NACK {}, resending", frame_id);
                    }
                    _ => {
                        self.stats.timeouts += 1;
                        warn!(
                            "ACK timeout for frame {}, resend {}/{}",
                            next.in_flight().unwrap_or_default(),
                            next.retry_count(),
                            self.transport.max_retries
                        );
                    }
                }
                self.transmit(tx);
            }
            SenderAction::Acknowledged => {
                self.stats.acks += 1;
                trace!("frame {} acknowledged", previous.in_flight().unwrap_or_default());
            }
            SenderAction::Pause => {
                self.stats.timeouts += 1;
                self.stats.pauses += 1;
                error!(
                    "no ACK after {} retries, pausing transmission",
                    next.retry_count()
                );
            }
            SenderAction::Suppress => {
                self.stats.suppressed += 1;
                debug!("transport paused, frame not sent");
            }
            SenderAction::Recovered => {
                self.stats.recoveries += 1;
                info!("ACK while paused, link recovered");
            }
            SenderAction::Ignore => {
                if let LinkEvent::Ack { frame_id } | LinkEvent::Nack { frame_id, .. } = event {
                    debug!("ignoring control for frame {} in {:?}", frame_id, previous);
                }
            }
        }
        action
    }

    fn transmit<T: SerialTx>(&mut self, tx: &mut T) {
        let Some(frame) = self.cached.as_ref() else {
            return;
        };
        let result = tx.write_all(&frame.wire).and_then(|_| tx.flush());
        if result.is_err() {
            // The ACK timeout covers a lost write
            self.stats.write_errors += 1;
            warn!("serial write failed for frame {}", frame.frame_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLink, MockSource};
    use crate::producer::FrameBuilder;
    use proptest::prelude::*;

    fn frame(builder: &mut FrameBuilder, source: &mut MockSource) -> CachedFrame {
        builder.build(source, 0, false).unwrap()
    }

    #[test]
    fn test_offer_transmits_wire_bytes() {
        let mut source = MockSource::new();
        source.set_image(b"QUJD");
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        let mut session = SenderSession::new(TransportConfig::default());

        let frame = frame(&mut builder, &mut source);
        let wire = frame.wire.clone();
        assert_eq!(session.offer(frame, 0, &mut link), SenderAction::Transmit);
        assert_eq!(link.written(), &wire[..]);
        assert!(session.awaiting_ack());
        assert_eq!(session.stats().frames_sent, 1);
    }

    #[test]
    fn test_nack_resends_identical_bytes() {
        let mut source = MockSource::new();
        source.set_image(b"QUJDRA==");
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        let mut session = SenderSession::new(TransportConfig::default());

        let frame = frame(&mut builder, &mut source);
        let wire = frame.wire.clone();
        session.offer(frame, 0, &mut link);
        link.clear_written();

        assert_eq!(
            session.on_control(Control::Nack(1), 100, &mut link),
            SenderAction::Retransmit
        );
        assert_eq!(link.written(), &wire[..]);
        assert_eq!(session.stats().nacks, 1);
        assert_eq!(session.retry_count(), 0);
    }

    #[test]
    fn test_offer_while_in_flight_ignored() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        let mut session = SenderSession::new(TransportConfig::default());

        let first = frame(&mut builder, &mut source);
        let second = frame(&mut builder, &mut source);
        session.offer(first, 0, &mut link);
        assert_eq!(session.offer(second, 0, &mut link), SenderAction::Ignore);
        assert_eq!(session.cached().map(|f| f.frame_id), Some(1));
    }

    #[test]
    fn test_timeouts_pause_then_suppress() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        let mut session = SenderSession::new(TransportConfig::default());

        session.offer(frame(&mut builder, &mut source), 0, &mut link);
        let mut now = 0;
        for _ in 0..5 {
            now += 5001;
            session.poll(now, &mut link);
        }
        assert!(session.transport_paused());
        assert_eq!(session.stats().timeouts, 5);
        assert_eq!(session.stats().retransmissions, 4);
        assert_eq!(session.stats().pauses, 1);

        link.clear_written();
        let next = builder.build(&mut source, now, true).unwrap();
        assert_eq!(session.offer(next, now, &mut link), SenderAction::Suppress);
        assert!(link.written().is_empty());
        assert_eq!(session.cached().map(|f| f.frame_id), Some(2));
    }

    #[test]
    fn test_write_error_counted() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        link.fail_writes(true);
        let mut session = SenderSession::new(TransportConfig::default());

        assert_eq!(
            session.offer(frame(&mut builder, &mut source), 0, &mut link),
            SenderAction::Transmit
        );
        assert_eq!(session.stats().write_errors, 1);
        assert!(session.awaiting_ack());
    }

    proptest! {
        #[test]
        fn prop_resends_are_byte_identical(
            image in proptest::collection::vec(b'A'..=b'Z', 0..300),
            nacks in 1usize..8,
        ) {
            let mut source = MockSource::new();
            source.set_image(&image);
            let mut builder = FrameBuilder::new();
            let mut link = MockLink::new();
            let mut session = SenderSession::new(TransportConfig::default());

            let frame = frame(&mut builder, &mut source);
            let wire = frame.wire.clone();
            session.offer(frame, 0, &mut link);
            for i in 0..nacks {
                link.clear_written();
                session.on_control(Control::Nack(1), i as u32, &mut link);
                prop_assert_eq!(link.written(), &wire[..]);
            }
        }
    }
}
