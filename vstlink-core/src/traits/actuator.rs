//! Actuator trait

/// Fire-and-forget output driven by detection results
pub trait Actuator {
    /// Signal that an object of `class_id` was detected
    fn pulse(&mut self, class_id: u8);

    /// Called on every loop iteration to end expired pulses
    ///
    /// Implementations backed by hardware one-shot timers need not override.
    fn service(&mut self) {}
}

/// No indicator outputs
impl Actuator for () {
    fn pulse(&mut self, _class_id: u8) {}
}
