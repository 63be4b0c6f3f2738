//! Image storage task
//!
//! Drains verified JPEG stills into the flash image ring. Flash programming
//! stalls the link briefly; the producer's ACK timeout covers it.

use defmt::*;

use vstlink_core::naming::{artifact_name, UptimeTimestamp};
use vstlink_core::traits::TimeSource;
use vstlink_hal_rp2040::image_store::ImageStore;
use vstlink_hal_rp2040::time::EmbassyClock;

use crate::channels::IMAGE_CHANNEL;

/// Storage task - writes each received image to the next flash slot
#[embassy_executor::task]
pub async fn storage_task(mut store: ImageStore<'static>) {
    info!("Storage task started, {} images written so far", store.cursor());

    if let Some(slot) = store.last_slot() {
        match store.header(slot).await {
            Ok(Some(header)) => info!(
                "Last stored image: {} (frame {}, {} bytes)",
                header.name.as_str(),
                header.frame_id,
                header.len
            ),
            Ok(None) => warn!("Slot {} holds no complete image", slot),
            Err(e) => warn!("Failed to read slot {}: {:?}", slot, e),
        }
    }

    // No RTC on the station; names carry seconds since boot
    let mut time = UptimeTimestamp::new(EmbassyClock);

    loop {
        let (frame_id, jpeg) = IMAGE_CHANNEL.receive().await;
        let timestamp = time.timestamp();
        let name = artifact_name(timestamp.as_deref(), frame_id);

        match store.store(frame_id, &name, &jpeg).await {
            Ok(slot) => info!("Stored {} ({} bytes) in slot {}", name.as_str(), jpeg.len(), slot),
            Err(e) => error!("Failed to store {}: {:?}", name.as_str(), e),
        }
    }
}
