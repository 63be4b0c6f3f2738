//! Indicator LED outputs

use embassy_rp::gpio::{Level, Output, Pin};
use embassy_rp::Peri;
use vstlink_hal::{Led, Polarity};

/// LED on a push-pull GPIO
pub struct LedOutput<'d> {
    pin: Output<'d>,
    polarity: Polarity,
}

impl<'d> LedOutput<'d> {
    /// Configure `pin` as an output with the LED dark
    pub fn new(pin: Peri<'d, impl Pin>, polarity: Polarity) -> Self {
        let dark = if polarity.level(false) {
            Level::High
        } else {
            Level::Low
        };
        Self {
            pin: Output::new(pin, dark),
            polarity,
        }
    }
}

impl Led for LedOutput<'_> {
    fn set_lit(&mut self, lit: bool) {
        self.pin.set_level(Level::from(self.polarity.level(lit)));
    }

    fn is_lit(&self) -> bool {
        self.polarity.level(self.pin.is_set_high())
    }
}
