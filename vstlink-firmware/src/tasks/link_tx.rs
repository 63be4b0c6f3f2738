//! Link UART transmit task
//!
//! Writes ACK/NACK control lines back to the producer.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::CONTROL_CHANNEL;

/// Link TX task - sends control lines queued by the RX task
#[embassy_executor::task]
pub async fn link_tx_task(mut tx: BufferedUartTx) {
    info!("Link TX task started");

    loop {
        let control = CONTROL_CHANNEL.receive().await;
        let line = control.encode();

        if let Err(e) = tx.write_all(&line).await {
            warn!("Failed to send {:?}: {:?}", control, e);
            continue;
        }
        if let Err(e) = tx.flush().await {
            warn!("Failed to flush {:?}: {:?}", control, e);
        } else {
            trace!("{:?} sent", control);
        }
    }
}
