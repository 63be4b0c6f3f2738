//! Detection indicator outputs
//!
//! Each output is bound to one class id. A pulse turns the output on and
//! records when; [`Actuator::service`] turns it off once the pulse time has
//! passed, so a slow acquisition cycle only ever lengthens a pulse.

use vstlink_hal::{Clock, Led};

use crate::config::{IndicatorConfig, MAX_INDICATORS};
use crate::traits::Actuator;

/// Bank of `N` class-bound indicator outputs
pub struct IndicatorBank<P, C, const N: usize> {
    pins: [P; N],
    classes: [u8; N],
    started_at: [Option<u32>; N],
    pulse_ms: u32,
    clock: C,
}

impl<P: Led, C: Clock, const N: usize> IndicatorBank<P, C, N> {
    /// Create a bank; all outputs start dark
    pub fn new(mut pins: [P; N], classes: [u8; N], pulse_ms: u32, clock: C) -> Self {
        for pin in pins.iter_mut() {
            pin.turn_off();
        }
        Self {
            pins,
            classes,
            started_at: [None; N],
            pulse_ms,
            clock,
        }
    }

    /// Output `index` is currently on
    pub fn is_on(&self, index: usize) -> bool {
        self.pins.get(index).is_some_and(|pin| pin.is_lit())
    }

    /// Turn everything off
    pub fn clear(&mut self) {
        for (pin, started) in self.pins.iter_mut().zip(self.started_at.iter_mut()) {
            pin.turn_off();
            *started = None;
        }
    }
}

impl<P: Led, C: Clock> IndicatorBank<P, C, MAX_INDICATORS> {
    /// Create the default three-output bank from configuration
    pub fn from_config(pins: [P; MAX_INDICATORS], config: &IndicatorConfig, clock: C) -> Self {
        Self::new(pins, config.led_classes, config.pulse_ms, clock)
    }
}

impl<P: Led, C: Clock, const N: usize> Actuator for IndicatorBank<P, C, N> {
    fn pulse(&mut self, class_id: u8) {
        let now = self.clock.now_ms();
        for i in 0..N {
            if self.classes[i] == class_id {
                self.pins[i].turn_on();
                self.started_at[i] = Some(now);
            }
        }
    }

    fn service(&mut self) {
        for i in 0..N {
            if let Some(started) = self.started_at[i] {
                if self.clock.elapsed_ms(started) >= self.pulse_ms {
                    self.pins[i].turn_off();
                    self.started_at[i] = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, MockPin};

    fn bank(clock: &MockClock) -> IndicatorBank<MockPin, &MockClock, 3> {
        IndicatorBank::from_config(
            [MockPin::new(), MockPin::new(), MockPin::new()],
            &IndicatorConfig::default(),
            clock,
        )
    }

    #[test]
    fn test_default_class_mapping() {
        let clock = MockClock::new();
        let mut bank = bank(&clock);

        bank.pulse(3);
        assert!(bank.is_on(0));
        bank.pulse(1);
        assert!(bank.is_on(2));
        assert!(!bank.is_on(1));
    }

    #[test]
    fn test_unknown_class_ignored() {
        let clock = MockClock::new();
        let mut bank = bank(&clock);
        bank.pulse(0);
        bank.pulse(42);
        assert!((0..3).all(|i| !bank.is_on(i)));
    }

    #[test]
    fn test_pulse_expires() {
        let clock = MockClock::new();
        let mut bank = bank(&clock);

        bank.pulse(2);
        clock.advance(249);
        bank.service();
        assert!(bank.is_on(1));

        clock.advance(1);
        bank.service();
        assert!(!bank.is_on(1));
    }

    #[test]
    fn test_repeat_pulse_extends() {
        let clock = MockClock::new();
        let mut bank = bank(&clock);

        bank.pulse(2);
        clock.advance(200);
        bank.pulse(2);
        clock.advance(200);
        bank.service();
        assert!(bank.is_on(1));
    }

    #[test]
    fn test_clear() {
        let clock = MockClock::new();
        let mut bank = bank(&clock);
        bank.pulse(3);
        bank.clear();
        assert!(!bank.is_on(0));
    }
}
