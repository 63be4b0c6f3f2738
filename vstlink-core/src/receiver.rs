//! Receiver session
//!
//! Wraps the byte-level [`FrameParser`] with the decisions the receiver
//! station makes: NACK on checksum mismatch, payload checks, hand-off to
//! storage and ACK. Exactly one control line answers every frame that
//! reached `END`.

use vstlink_protocol::{
    check_jpeg, decode_image, detection_classes, Control, FrameError, FrameParser, ReceivedFrame,
    RxPhase, MAX_DETECTIONS,
};

use crate::config::{PayloadPolicy, ReceiverConfig};
use crate::traits::FrameStore;

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverStats {
    /// Frames whose checksum matched
    pub accepted: u32,
    pub stored: u32,
    /// Verified resends of the last accepted frame
    pub duplicates: u32,
    pub nacks: u32,
    /// Frames abandoned before `END`
    pub resyncs: u32,
    pub payload_failures: u32,
    pub store_failures: u32,
}

/// Receiver side of the link
#[derive(Debug)]
pub struct ReceiverSession {
    parser: FrameParser,
    policy: PayloadPolicy,
    /// `(frame_id, checksum)` of the last frame handed to storage
    last_accepted: Option<(u32, u32)>,
    /// `(frame_id, checksum)` of the last payload NACKed in strict mode
    last_rejected: Option<(u32, u32)>,
    /// Detection classes of the last new frame, until taken
    detections: heapless::Vec<u8, MAX_DETECTIONS>,
    stats: ReceiverStats,
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new(&ReceiverConfig::default())
    }
}

impl ReceiverSession {
    pub fn new(config: &ReceiverConfig) -> Self {
        Self {
            parser: FrameParser::new(config.max_image_len as usize),
            policy: config.payload_policy,
            last_accepted: None,
            last_rejected: None,
            detections: heapless::Vec::new(),
            stats: ReceiverStats::default(),
        }
    }

    pub fn phase(&self) -> RxPhase {
        self.parser.phase()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Detection classes reported by the last newly accepted frame
    ///
    /// Cleared by the call; duplicates of an accepted frame report nothing.
    pub fn take_detections(&mut self) -> heapless::Vec<u8, MAX_DETECTIONS> {
        core::mem::take(&mut self.detections)
    }

    /// Feed one received byte
    ///
    /// Returns the control line to send back, if this byte completed a frame.
    pub fn feed<S: FrameStore>(&mut self, byte: u8, store: &mut S) -> Option<Control> {
        match self.parser.feed(byte) {
            Ok(None) => None,
            Ok(Some(frame)) => Some(self.accept(frame, store)),
            Err(FrameError::ChecksumMismatch {
                frame_id,
                expected,
                computed,
            }) => {
                warn!(
                    "frame {}: checksum mismatch (expected {:x}, computed {:x})",
                    frame_id,
                    expected,
                    computed
                );
                self.stats.nacks += 1;
                Some(Control::Nack(frame_id))
            }
            Err(err) => {
                self.stats.resyncs += 1;
                warn!("frame dropped: {:?}", err);
                None
            }
        }
    }

    fn accept<S: FrameStore>(&mut self, frame: ReceivedFrame, store: &mut S) -> Control {
        self.stats.accepted += 1;
        let frame_id = frame.frame_id;
        info!(
            "frame {}: {} bytes, crc ok, meta {}",
            frame_id,
            frame.image_text.len(),
            frame.metadata.as_str()
        );

        if self.last_accepted == Some((frame_id, frame.checksum)) {
            // Our ACK was lost and the producer resent
            self.stats.duplicates += 1;
            debug!("frame {}: duplicate, re-acknowledging", frame_id);
            return Control::Ack(frame_id);
        }
        self.detections = detection_classes(&frame.metadata);

        let jpeg = match decode_image(&frame.image_text) {
            Ok(jpeg) => check_jpeg(&jpeg).map(|_| jpeg),
            Err(err) => Err(err),
        };
        let jpeg = match jpeg {
            Ok(jpeg) => jpeg,
            Err(err) => {
                self.stats.payload_failures += 1;
                warn!("frame {}: payload rejected: {:?}", frame_id, err);
                // A resend carries the same bytes, so strict mode asks once
                let key = (frame_id, frame.checksum);
                return match self.policy {
                    PayloadPolicy::Strict if self.last_rejected != Some(key) => {
                        self.last_rejected = Some(key);
                        self.stats.nacks += 1;
                        Control::Nack(frame_id)
                    }
                    PayloadPolicy::Strict | PayloadPolicy::AckOnIntegrity => Control::Ack(frame_id),
                };
            }
        };

        self.last_accepted = Some((frame_id, frame.checksum));
        let jpeg_len = jpeg.len();
        match store.save(frame_id, jpeg) {
            Ok(()) => {
                self.stats.stored += 1;
                debug!("frame {}: stored {} bytes", frame_id, jpeg_len);
            }
            Err(err) => {
                self.stats.store_failures += 1;
                error!("frame {}: store failed: {:?}", frame_id, err);
            }
        }
        Control::Ack(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::mock::{jpeg_base64, MockLink, MockSource, MockStore};
    use crate::producer::FrameBuilder;
    use crate::sender::SenderSession;
    use crate::traits::StoreError;
    use alloc::vec::Vec;
    use vstlink_protocol::{encode_frame, image_checksum};

    fn feed_all(
        session: &mut ReceiverSession,
        bytes: &[u8],
        store: &mut MockStore,
    ) -> Vec<Control> {
        bytes
            .iter()
            .filter_map(|&b| session.feed(b, store))
            .collect()
    }

    fn frame_bytes(frame_id: u32, image: &[u8]) -> Vec<u8> {
        encode_frame(&alloc::format!("{{\"frame\":{}}}", frame_id), image)
    }

    #[test]
    fn test_valid_frame_stored_and_acked() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let image = jpeg_base64();

        let controls = feed_all(&mut session, &frame_bytes(7, image.as_bytes()), &mut store);
        assert_eq!(controls, [Control::Ack(7)]);
        assert_eq!(store.saved_ids(), &[7]);
        assert_eq!(session.stats().stored, 1);
        assert_eq!(session.phase(), RxPhase::AwaitingMetadata);
    }

    #[test]
    fn test_checksum_mismatch_nacks_without_store() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();

        let body = alloc::vec![b'A'; 1000];
        let wrong = image_checksum(&body) ^ 1;
        let mut bytes = b"METADATA {\"frame\":12}\n".to_vec();
        bytes.extend(alloc::format!("IMAGE 1000 {:08x}\n", wrong).as_bytes());
        bytes.extend(&body);
        bytes.extend(b"END\n");

        let controls = feed_all(&mut session, &bytes, &mut store);
        assert_eq!(controls, [Control::Nack(12)]);
        assert!(store.saved_ids().is_empty());
        assert_eq!(session.phase(), RxPhase::AwaitingMetadata);
    }

    #[test]
    fn test_corrupted_body_byte_nacks() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let image = jpeg_base64();
        let mut bytes = frame_bytes(12, image.as_bytes());
        let body_start = bytes.len() - image.len() - b"END\n".len();
        bytes[body_start + 10] |= 0x80;

        let controls = feed_all(&mut session, &bytes, &mut store);
        assert_eq!(controls, [Control::Nack(12)]);
        assert_eq!(session.stats().nacks, 1);
        assert_eq!(session.stats().resyncs, 0);
        assert!(store.saved_ids().is_empty());

        // The resend arrives intact
        let controls = feed_all(&mut session, &frame_bytes(12, image.as_bytes()), &mut store);
        assert_eq!(controls, [Control::Ack(12)]);
        assert_eq!(store.saved_ids(), &[12]);
    }

    #[test]
    fn test_bad_payload_acked_by_default() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();

        let controls = feed_all(&mut session, &frame_bytes(3, b"QUJDRA=="), &mut store);
        assert_eq!(controls, [Control::Ack(3)]);
        assert!(store.saved_ids().is_empty());
        assert_eq!(session.stats().payload_failures, 1);
    }

    #[test]
    fn test_bad_payload_nacked_when_strict() {
        let mut session = ReceiverSession::new(&ReceiverConfig {
            payload_policy: PayloadPolicy::Strict,
            ..ReceiverConfig::default()
        });
        let mut store = MockStore::new();

        let controls = feed_all(&mut session, &frame_bytes(3, b"QUJDRA=="), &mut store);
        assert_eq!(controls, [Control::Nack(3)]);

        // Same bytes again: the resend cannot fix them
        let controls = feed_all(&mut session, &frame_bytes(3, b"QUJDRA=="), &mut store);
        assert_eq!(controls, [Control::Ack(3)]);
        assert!(store.saved_ids().is_empty());
        assert_eq!(session.stats().payload_failures, 2);
    }

    #[test]
    fn test_strict_receiver_settles_sender() {
        let mut receiver = ReceiverSession::new(&ReceiverConfig {
            payload_policy: PayloadPolicy::Strict,
            ..ReceiverConfig::default()
        });
        let mut store = MockStore::new();
        let mut source = MockSource::new();
        source.set_image(b"QUJDRA==");
        let mut builder = FrameBuilder::new();
        let mut link = MockLink::new();
        let mut sender = SenderSession::new(TransportConfig::default());
        sender.offer(builder.build(&mut source, 0, false).unwrap(), 0, &mut link);

        let mut replies = Vec::new();
        for now in 1..10 {
            let wire = link.written().to_vec();
            link.clear_written();
            let controls = feed_all(&mut receiver, &wire, &mut store);
            if controls.is_empty() {
                break;
            }
            for control in controls {
                replies.push(control);
                sender.on_control(control, now, &mut link);
            }
        }
        assert_eq!(replies, [Control::Nack(1), Control::Ack(1)]);
        assert!(!sender.awaiting_ack());
        assert_eq!(sender.stats().acks, 1);
    }

    #[test]
    fn test_empty_image_follows_policy() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let controls = feed_all(&mut session, &frame_bytes(4, b""), &mut store);
        assert_eq!(controls, [Control::Ack(4)]);
        assert!(store.saved_ids().is_empty());
    }

    #[test]
    fn test_duplicate_reacked_not_restored() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let bytes = frame_bytes(5, jpeg_base64().as_bytes());

        feed_all(&mut session, &bytes, &mut store);
        let controls = feed_all(&mut session, &bytes, &mut store);
        assert_eq!(controls, [Control::Ack(5)]);
        assert_eq!(store.saved_ids(), &[5]);
        assert_eq!(session.stats().duplicates, 1);
    }

    #[test]
    fn test_store_failure_still_acks() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        store.fail_with(StoreError::Unavailable);

        let controls = feed_all(&mut session, &frame_bytes(6, jpeg_base64().as_bytes()), &mut store);
        assert_eq!(controls, [Control::Ack(6)]);
        assert_eq!(session.stats().store_failures, 1);
    }

    #[test]
    fn test_metadata_mid_image_resyncs() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();

        let mut bytes = b"METADATA {\"frame\":7}\nIMAGE 5000 00000000\n".to_vec();
        bytes.extend(b"/9j/4AAQSkZJRg");
        bytes.extend(frame_bytes(8, jpeg_base64().as_bytes()));

        let controls = feed_all(&mut session, &bytes, &mut store);
        assert_eq!(controls, [Control::Ack(8)]);
        assert_eq!(store.saved_ids(), &[8]);
        assert_eq!(session.stats().resyncs, 1);
    }

    #[test]
    fn test_ids_increase_across_retransmission() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let image = jpeg_base64();

        let mut acked = Vec::new();
        for id in [1, 1, 2, 3, 3, 4] {
            acked.extend(feed_all(&mut session, &frame_bytes(id, image.as_bytes()), &mut store));
        }
        let ids: Vec<u32> = acked.iter().map(Control::frame_id).collect();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(store.saved_ids(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_detections_reported_once() {
        let mut session = ReceiverSession::default();
        let mut store = MockStore::new();
        let meta = r#"{"frame":9,"boxes":[{"target":2,"score":80},{"target":3,"score":70}]}"#;
        let bytes = encode_frame(meta, jpeg_base64().as_bytes());

        feed_all(&mut session, &bytes, &mut store);
        assert_eq!(session.take_detections().as_slice(), &[2, 3]);
        assert!(session.take_detections().is_empty());

        feed_all(&mut session, &bytes, &mut store);
        assert!(session.take_detections().is_empty());
    }
}
