//! Test doubles for the collaborator and HAL traits

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

use embedded_hal::delay::DelayNs;
use vstlink_hal::{Clock, Led, SerialRx, SerialTx};
use vstlink_protocol::{Control, Detection, FrameParser, PerfCounters};

use crate::traits::{FrameSource, FrameStore, SourceStatus, StoreError};

/// Base64 of a minimal well-formed JPEG
pub fn jpeg_base64() -> String {
    String::from("/9j/4AAESkb/2gACEv8ANP/Z")
}

/// Manually advanced clock
#[derive(Debug, Default)]
pub struct MockClock {
    now: Cell<u32>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// Delay that records each sleep and advances the clock
pub struct MockDelay<'a> {
    clock: &'a MockClock,
    sleeps: Vec<u32>,
}

impl<'a> MockDelay<'a> {
    pub fn new(clock: &'a MockClock) -> Self {
        Self {
            clock,
            sleeps: Vec::new(),
        }
    }

    /// Millisecond sleeps in call order
    pub fn sleeps(&self) -> &[u32] {
        &self.sleeps
    }
}

impl DelayNs for MockDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ms(us / 1000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleeps.push(ms);
        self.clock.advance(ms);
    }
}

/// Scripted frame source
#[derive(Debug, Default)]
pub struct MockSource {
    script: VecDeque<SourceStatus>,
    always: Option<SourceStatus>,
    detections: Vec<Detection>,
    perf: PerfCounters,
    image: Vec<u8>,
    invocations: u32,
    image_reads: u32,
    reinits: u32,
    last_capture: Option<bool>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses returned before falling back to `Ok`
    pub fn script(&mut self, statuses: &[SourceStatus]) {
        self.script.extend(statuses.iter().copied());
    }

    /// Status returned once the script is exhausted
    pub fn always(&mut self, status: SourceStatus) {
        self.always = Some(status);
    }

    pub fn set_detections(&mut self, detections: &[Detection]) {
        self.detections = detections.to_vec();
    }

    pub fn set_perf(&mut self, perf: PerfCounters) {
        self.perf = perf;
    }

    pub fn set_image(&mut self, image: &[u8]) {
        self.image = image.to_vec();
    }

    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    pub fn image_reads(&self) -> u32 {
        self.image_reads
    }

    pub fn reinits(&self) -> u32 {
        self.reinits
    }

    pub fn last_capture_flag(&self) -> Option<bool> {
        self.last_capture
    }
}

impl FrameSource for MockSource {
    fn invoke(&mut self, capture_image: bool) -> SourceStatus {
        self.invocations += 1;
        self.last_capture = Some(capture_image);
        self.script
            .pop_front()
            .or(self.always)
            .unwrap_or(SourceStatus::Ok)
    }

    fn detections(&self) -> &[Detection] {
        &self.detections
    }

    fn performance(&self) -> PerfCounters {
        self.perf
    }

    fn last_image_text(&mut self) -> &[u8] {
        self.image_reads += 1;
        &self.image
    }

    fn reinit(&mut self) -> bool {
        self.reinits += 1;
        true
    }
}

/// In-memory serial link
///
/// Outgoing bytes are recorded and run through a receiver parser so tests
/// can see which frames the peer would have accepted.
#[derive(Debug, Default)]
pub struct MockLink {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    peer: FrameParser,
    received: Vec<u32>,
    auto_ack: bool,
    fail_writes: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link whose peer ACKs every intact frame
    pub fn auto_ack() -> Self {
        Self {
            auto_ack: true,
            ..Self::default()
        }
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Ids of intact frames seen by the peer, in order
    pub fn received_ids(&self) -> &[u32] {
        &self.received
    }
}

impl SerialTx for MockLink {
    type Error = ();

    fn write_all(&mut self, data: &[u8]) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.written.extend_from_slice(data);
        for &byte in data {
            if let Ok(Some(frame)) = self.peer.feed(byte) {
                self.received.push(frame.frame_id);
                if self.auto_ack {
                    let ack = Control::Ack(frame.frame_id).encode();
                    self.rx.extend(ack.iter().copied());
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

impl SerialRx for MockLink {
    type Error = ();

    fn read_timeout(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// Recording image store
#[derive(Debug, Default)]
pub struct MockStore {
    saved: Vec<(u32, Vec<u8>)>,
    fail: Option<StoreError>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&mut self, err: StoreError) {
        self.fail = Some(err);
    }

    pub fn saved_ids(&self) -> Vec<u32> {
        self.saved.iter().map(|(id, _)| *id).collect()
    }
}

impl FrameStore for MockStore {
    fn save(&mut self, frame_id: u32, jpeg: Vec<u8>) -> Result<(), StoreError> {
        if let Some(err) = self.fail {
            return Err(err);
        }
        self.saved.push((frame_id, jpeg));
        Ok(())
    }
}

/// LED that remembers its state
#[derive(Debug, Default)]
pub struct MockPin {
    lit: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Led for MockPin {
    fn set_lit(&mut self, lit: bool) {
        self.lit = lit;
    }

    fn is_lit(&self) -> bool {
        self.lit
    }
}
