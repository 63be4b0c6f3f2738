//! Link UART receive task
//!
//! Feeds every received byte to the receiver session and queues the
//! resulting ACK/NACK lines, verified images and detection classes.

use alloc::vec::Vec;

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embassy_time::{with_timeout, Duration, Instant};
use embedded_io_async::Read;

use vstlink_core::config::ReceiverConfig;
use vstlink_core::traits::{FrameStore, StoreError};
use vstlink_core::ReceiverSession;
use vstlink_protocol::{Control, RxPhase};

use crate::channels::{CLASS_CHANNEL, CONTROL_CHANNEL, IMAGE_CHANNEL};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 256;

/// Idle time after which a partial frame is reported
const STALL_REPORT_MS: u64 = 2000;

/// Hands verified images to the storage task without blocking the link
struct ChannelStore;

impl FrameStore for ChannelStore {
    fn save(&mut self, frame_id: u32, jpeg: Vec<u8>) -> Result<(), StoreError> {
        IMAGE_CHANNEL
            .try_send((frame_id, jpeg))
            .map_err(|_| StoreError::Busy)
    }
}

/// Link RX task - reassembles frames from the producer
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: BufferedUartRx, config: ReceiverConfig, rx_poll_ms: u32) {
    info!("Link RX task started");

    let mut session = ReceiverSession::new(&config);
    let mut store = ChannelStore;
    let mut buf = [0u8; RX_BUF_SIZE];
    let poll = Duration::from_millis(rx_poll_ms as u64);
    let mut last_byte = Instant::now();
    let mut stall_reported = false;

    loop {
        match with_timeout(poll, rx.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                trace!("RX: {} bytes", n);
                last_byte = Instant::now();
                stall_reported = false;

                for &byte in &buf[..n] {
                    if let Some(control) = session.feed(byte, &mut store) {
                        dispatch(control, &mut session).await;
                    }
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!("UART read error: {:?}", e);
            }
            Err(_) => {
                // Poll window elapsed without data
                if !stall_reported
                    && session.phase() != RxPhase::AwaitingMetadata
                    && last_byte.elapsed().as_millis() >= STALL_REPORT_MS
                {
                    stall_reported = true;
                    warn!(
                        "Link idle mid-frame ({:?}), stats {:?}",
                        session.phase(),
                        session.stats()
                    );
                }
            }
        }
    }
}

/// Queue the control line and, for an ACK, the frame's detection classes
async fn dispatch(control: Control, session: &mut ReceiverSession) {
    debug!("Sending {:?}", control);
    CONTROL_CHANNEL.send(control).await;

    if let Control::Ack(_) = control {
        for class_id in session.take_detections() {
            if CLASS_CHANNEL.try_send(class_id).is_err() {
                warn!("Indicator channel full, dropping class {}", class_id);
            }
        }
    }
}
