//! Indicator outputs

/// How an LED is wired to its pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pin high lights the LED
    #[default]
    ActiveHigh,
    /// Pin low lights the LED (LED tied to the supply rail)
    ActiveLow,
}

impl Polarity {
    /// Pin level that produces `lit`
    pub fn level(self, lit: bool) -> bool {
        match self {
            Polarity::ActiveHigh => lit,
            Polarity::ActiveLow => !lit,
        }
    }
}

/// A single indicator LED
///
/// Implementations translate lit/dark into a pin level, so callers never
/// deal with the wiring.
pub trait Led {
    fn set_lit(&mut self, lit: bool);

    fn is_lit(&self) -> bool;

    fn turn_on(&mut self) {
        self.set_lit(true);
    }

    fn turn_off(&mut self) {
        self.set_lit(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_level() {
        assert!(Polarity::ActiveHigh.level(true));
        assert!(!Polarity::ActiveHigh.level(false));
        assert!(!Polarity::ActiveLow.level(true));
        assert!(Polarity::ActiveLow.level(false));
        assert_eq!(Polarity::default(), Polarity::ActiveHigh);
    }
}
