//! Detection indicator task
//!
//! Pulses one LED per configured detection class.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::Timer;

use vstlink_core::config::MAX_INDICATORS;
use vstlink_core::indicator::IndicatorBank;
use vstlink_core::traits::Actuator;
use vstlink_hal_rp2040::gpio::LedOutput;
use vstlink_hal_rp2040::time::EmbassyClock;

use crate::channels::CLASS_CHANNEL;

/// LED bank driven by the indicator task
pub type Indicators = IndicatorBank<LedOutput<'static>, EmbassyClock, MAX_INDICATORS>;

/// Resolution of the LED off timers
const SERVICE_INTERVAL_MS: u64 = 10;

/// Indicator task - turns LEDs on per detection and off after the pulse
#[embassy_executor::task]
pub async fn indicator_task(mut bank: Indicators) {
    info!("Indicator task started");

    loop {
        match select(CLASS_CHANNEL.receive(), Timer::after_millis(SERVICE_INTERVAL_MS)).await {
            Either::First(class_id) => {
                trace!("Pulse for class {}", class_id);
                bank.pulse(class_id);
            }
            Either::Second(()) => {}
        }
        bank.service();
    }
}
