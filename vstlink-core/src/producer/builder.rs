//! Frame builder
//!
//! Turns one acquisition into the cached frame: the metadata record, the
//! image text and its checksum, encoded once into the exact bytes that go on
//! the wire. Retransmissions reuse those bytes.

use alloc::string::String;
use alloc::vec::Vec;

use vstlink_protocol::{
    encode_frame, image_checksum, Detection, MetadataRecord, RecordError, MAX_DETECTIONS,
};

use crate::traits::FrameSource;

/// The single frame held for (re)transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFrame {
    pub frame_id: u32,
    /// JSON metadata record
    pub metadata: String,
    pub detections: heapless::Vec<Detection, MAX_DETECTIONS>,
    /// Length of the base64 image text
    pub image_len: usize,
    pub checksum: u32,
    /// Encoded frame, byte-identical on every send
    pub wire: Vec<u8>,
}

/// Frame id counter and inter-frame timing
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    frame_id: u32,
    last_frame_ms: Option<u32>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the most recently built frame (0 before the first)
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Build the next frame from the source's last result
    ///
    /// While the transport is paused the image accessor is not called and
    /// the frame carries an empty image.
    pub fn build<S: FrameSource>(
        &mut self,
        source: &mut S,
        now_ms: u32,
        transport_paused: bool,
    ) -> Result<CachedFrame, RecordError> {
        let frame_id = self.frame_id.wrapping_add(1);
        let dt_ms = self
            .last_frame_ms
            .map_or(0, |last| now_ms.wrapping_sub(last));

        let all = source.detections();
        if all.len() > MAX_DETECTIONS {
            debug!(
                "frame {}: keeping {} of {} detections",
                frame_id,
                MAX_DETECTIONS,
                all.len()
            );
        }
        let mut detections = heapless::Vec::new();
        for detection in all.iter().take(MAX_DETECTIONS) {
            let _ = detections.push(*detection);
        }

        let metadata =
            MetadataRecord::new(frame_id, dt_ms, source.performance(), &detections).to_json()?;

        let image: &[u8] = if transport_paused {
            &[]
        } else {
            source.last_image_text()
        };
        let checksum = image_checksum(image);
        let wire = encode_frame(&metadata, image);

        self.frame_id = frame_id;
        self.last_frame_ms = Some(now_ms);

        debug!(
            "frame {}: {} boxes, image {} bytes crc={:x}",
            frame_id,
            detections.len(),
            image.len(),
            checksum
        );

        Ok(CachedFrame {
            frame_id,
            metadata,
            detections,
            image_len: image.len(),
            checksum,
            wire,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use vstlink_protocol::PerfCounters;

    #[test]
    fn test_ids_start_at_one() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder::new();
        assert_eq!(builder.frame_id(), 0);

        let ids: Vec<u32> = (0..3)
            .map(|i| builder.build(&mut source, i * 100, false).unwrap().frame_id)
            .collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn test_dt_ms() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder::new();
        let first = builder.build(&mut source, 1000, false).unwrap();
        let second = builder.build(&mut source, 1412, false).unwrap();
        assert!(first.metadata.contains(r#""dt_ms":0"#));
        assert!(second.metadata.contains(r#""dt_ms":412"#));
    }

    #[test]
    fn test_record_and_wire() {
        let mut source = MockSource::new();
        source.set_perf(PerfCounters {
            preprocess: 8,
            inference: 61,
            postprocess: 1,
        });
        source.set_detections(&[Detection {
            class_id: 3,
            score: 87,
            x: 120,
            y: 96,
            width: 40,
            height: 52,
        }]);
        source.set_image(b"QUJD");

        let frame = FrameBuilder::new().build(&mut source, 0, false).unwrap();
        assert_eq!(
            frame.metadata,
            r#"{"frame":1,"dt_ms":0,"perf":{"preprocess":8,"inference":61,"postprocess":1},"boxes":[{"target":3,"score":87,"x":120,"y":96,"w":40,"h":52}]}"#
        );
        assert_eq!(frame.image_len, 4);
        assert_eq!(frame.checksum, image_checksum(b"QUJD"));
        assert_eq!(frame.wire, encode_frame(&frame.metadata, b"QUJD"));
    }

    #[test]
    fn test_zero_detections() {
        let mut source = MockSource::new();
        let frame = FrameBuilder::new().build(&mut source, 0, false).unwrap();
        assert!(frame.metadata.ends_with(r#""boxes":[]}"#));
        assert!(frame.detections.is_empty());
    }

    #[test]
    fn test_detections_capped() {
        let mut source = MockSource::new();
        source.set_detections(&[Detection::default(); 20]);
        let frame = FrameBuilder::new().build(&mut source, 0, false).unwrap();
        assert_eq!(frame.detections.len(), MAX_DETECTIONS);
    }

    #[test]
    fn test_paused_skips_image() {
        let mut source = MockSource::new();
        source.set_image(b"QUJDRA==");
        let frame = FrameBuilder::new().build(&mut source, 0, true).unwrap();

        assert_eq!(frame.image_len, 0);
        assert_eq!(frame.checksum, 0);
        assert_eq!(source.image_reads(), 0);
        let text = core::str::from_utf8(&frame.wire).unwrap();
        assert!(text.contains("\nIMAGE 0 00000000\n"));
    }

    #[test]
    fn test_frame_id_wraps() {
        let mut source = MockSource::new();
        let mut builder = FrameBuilder {
            frame_id: u32::MAX,
            last_frame_ms: None,
        };
        assert_eq!(builder.build(&mut source, 0, false).unwrap().frame_id, 0);
    }
}
