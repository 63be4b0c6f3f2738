//! Producer side of the link
//!
//! [`Producer::step`] runs one cooperative iteration: drain control lines,
//! check the ACK timeout, and when nothing is in flight acquire, build and
//! offer the next frame. Acquisition keeps running while the link is paused.

pub mod acquire;
pub mod backoff;
pub mod builder;

pub use acquire::{AcquireError, Acquirer};
pub use backoff::Backoff;
pub use builder::{CachedFrame, FrameBuilder};

use embedded_hal::delay::DelayNs;
use vstlink_hal::{Clock, SerialRx, SerialTx};
use vstlink_protocol::{Control, LineBuffer, LinePush};

use crate::config::{LinkConfig, RecoveryConfig};
use crate::sender::{SenderAction, SenderSession};
use crate::traits::{Actuator, FrameSource};

/// Longest line accepted on the control channel
const CONTROL_LINE_CAPACITY: usize = 32;

/// Bytes read per serial poll
const RX_CHUNK: usize = 64;

/// Result of one [`Producer::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// A frame is in flight; only the link was serviced
    Waiting,
    /// A frame was built and offered to the sender
    Frame { frame_id: u32, action: SenderAction },
    /// Acquisition hit its deadline and the source was reinitialized
    SourceReset { reinit_ok: bool },
    /// The metadata record could not be built
    BuildFailed,
}

/// Producer driver owning the source, the link and the sender session
pub struct Producer<S, L, C, D, A> {
    source: S,
    link: L,
    clock: C,
    delay: D,
    actuator: A,
    acquirer: Acquirer,
    builder: FrameBuilder,
    session: SenderSession,
    control_line: LineBuffer<CONTROL_LINE_CAPACITY>,
    recovery: RecoveryConfig,
    rx_poll_ms: u32,
}

impl<S, L, C, D, A> Producer<S, L, C, D, A>
where
    S: FrameSource,
    L: SerialTx + SerialRx,
    C: Clock,
    D: DelayNs,
    A: Actuator,
{
    pub fn new(config: &LinkConfig, source: S, link: L, clock: C, delay: D, actuator: A) -> Self {
        Self {
            source,
            link,
            clock,
            delay,
            actuator,
            acquirer: Acquirer::new(config.backoff, config.recovery),
            builder: FrameBuilder::new(),
            session: SenderSession::new(config.transport),
            control_line: LineBuffer::new(),
            recovery: config.recovery,
            rx_poll_ms: config.transport.rx_poll_ms,
        }
    }

    pub fn session(&self) -> &SenderSession {
        &self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Id of the most recently built frame
    pub fn frame_id(&self) -> u32 {
        self.builder.frame_id()
    }

    /// Run one loop iteration
    pub fn step(&mut self) -> StepOutcome {
        self.actuator.service();
        self.service_control();

        let now = self.clock.now_ms();
        self.session.poll(now, &mut self.link);
        if !self.session.ready_for_frame() {
            return StepOutcome::Waiting;
        }

        let paused = self.session.transport_paused();
        if let Err(err) =
            self.acquirer
                .acquire(&mut self.source, &self.clock, &mut self.delay, !paused)
        {
            warn!("acquisition failed: {:?}", err);
            let reinit_ok = self.reinit_source();
            self.delay.delay_ms(self.recovery.failure_idle_ms);
            return StepOutcome::SourceReset { reinit_ok };
        }

        let now = self.clock.now_ms();
        let frame = match self.builder.build(&mut self.source, now, paused) {
            Ok(frame) => frame,
            Err(err) => {
                error!("frame build failed: {:?}", err);
                self.delay.delay_ms(self.recovery.failure_idle_ms);
                return StepOutcome::BuildFailed;
            }
        };

        for detection in frame.detections.iter() {
            self.actuator.pulse(detection.class_id);
        }

        let frame_id = frame.frame_id;
        let action = self.session.offer(frame, now, &mut self.link);
        self.delay.delay_ms(self.recovery.success_idle_ms);
        StepOutcome::Frame { frame_id, action }
    }

    /// Cool down, then bring the source back
    fn reinit_source(&mut self) -> bool {
        info!(
            "reinitializing source after {}ms cooldown",
            self.recovery.reinit_cooldown_ms
        );
        self.delay.delay_ms(self.recovery.reinit_cooldown_ms);
        let ok = self.source.reinit();
        if ok {
            self.acquirer.reset_backoff();
        } else {
            error!("source reinit failed");
        }
        ok
    }

    /// Read one poll window of control bytes and apply complete lines
    fn service_control(&mut self) {
        let mut buf = [0u8; RX_CHUNK];
        let n = match self.link.read_timeout(&mut buf, self.rx_poll_ms) {
            Ok(n) => n,
            Err(_) => {
                warn!("serial read failed");
                return;
            }
        };

        for &byte in &buf[..n] {
            match self.control_line.push(byte) {
                LinePush::Pending => {}
                LinePush::Overflow => debug!("control line too long, dropped"),
                LinePush::Complete => {
                    let control = self.control_line.as_str().and_then(Control::parse);
                    self.control_line.clear();
                    match control {
                        Some(control) => {
                            let now = self.clock.now_ms();
                            self.session.on_control(control, now, &mut self.link);
                        }
                        None => trace!("non-control line ignored"),
                    }
                }
            }
        }
    }
}
