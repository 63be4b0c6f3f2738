//! Configuration type definitions
//!
//! Both ends of the link must agree on the transport parameters; the
//! defaults here are the values the producer module ships with.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of indicator outputs
pub const MAX_INDICATORS: usize = 3;

/// Largest postcard encoding of [`LinkConfig`]
pub const MAX_CONFIG_SIZE: usize = 96;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A field failed validation
    Invalid(&'static str),
    /// Binary encoding failed
    Serialize,
    /// Binary decoding failed
    Deserialize,
}

/// What the receiver does when the checksum matched but the payload is
/// not a usable image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PayloadPolicy {
    /// ACK on transport integrity alone; the payload is discarded
    #[default]
    AckOnIntegrity,
    /// NACK so the producer resends
    Strict,
}

/// Link layer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransportConfig {
    /// UART baud rate
    pub baud_rate: u32,
    /// Time to wait for ACK/NACK before retransmitting
    pub ack_timeout_ms: u32,
    /// Timeouts tolerated before transmission pauses
    pub max_retries: u8,
    /// Bounded wait for each serial read
    pub rx_poll_ms: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: 921_600,
            ack_timeout_ms: 5000,
            max_retries: 5,
            rx_poll_ms: 20,
        }
    }
}

/// Acquisition backoff, grown by `growth_num / growth_den` per busy poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackoffConfig {
    pub floor_ms: u32,
    pub max_ms: u32,
    pub growth_num: u32,
    pub growth_den: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_ms: 30,
            max_ms: 1200,
            growth_num: 3,
            growth_den: 2,
        }
    }
}

/// Acquisition deadline and recovery timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoveryConfig {
    /// Give up on one acquisition after this long
    pub acquire_deadline_ms: u32,
    /// Minimum spacing between busy log lines
    pub busy_log_interval_ms: u32,
    /// Pause before reinitializing a stalled source
    pub reinit_cooldown_ms: u32,
    /// Idle after a failed acquisition
    pub failure_idle_ms: u32,
    /// Idle after a successful frame
    pub success_idle_ms: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            acquire_deadline_ms: 25_000,
            busy_log_interval_ms: 2000,
            reinit_cooldown_ms: 1500,
            failure_idle_ms: 250,
            success_idle_ms: 10,
        }
    }
}

/// Receiver station parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReceiverConfig {
    /// Largest image body accepted, in base64 bytes
    pub max_image_len: u32,
    pub payload_policy: PayloadPolicy,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_image_len: 96 * 1024,
            payload_policy: PayloadPolicy::AckOnIntegrity,
        }
    }
}

/// Detection indicator outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndicatorConfig {
    /// How long an output stays on after a pulse
    pub pulse_ms: u32,
    /// Class id driving each output, by output index
    pub led_classes: [u8; MAX_INDICATORS],
    /// LEDs are wired to the supply rail and lit by driving the pin low
    pub active_low: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            pulse_ms: 250,
            led_classes: [3, 2, 1],
            active_low: false,
        }
    }
}

/// Complete link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    pub transport: TransportConfig,
    pub backoff: BackoffConfig,
    pub recovery: RecoveryConfig,
    pub receiver: ReceiverConfig,
    pub indicator: IndicatorConfig,
}

impl LinkConfig {
    /// Reject values that would stall or spin the link
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.baud_rate == 0 {
            return Err(ConfigError::Invalid("transport.baud_rate"));
        }
        if self.transport.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid("transport.ack_timeout_ms"));
        }
        if self.transport.max_retries == 0 {
            return Err(ConfigError::Invalid("transport.max_retries"));
        }
        if self.backoff.floor_ms == 0 || self.backoff.floor_ms > self.backoff.max_ms {
            return Err(ConfigError::Invalid("backoff.floor_ms"));
        }
        if self.backoff.growth_den == 0 || self.backoff.growth_num <= self.backoff.growth_den {
            return Err(ConfigError::Invalid("backoff.growth"));
        }
        if self.recovery.acquire_deadline_ms == 0 {
            return Err(ConfigError::Invalid("recovery.acquire_deadline_ms"));
        }
        if self.receiver.max_image_len == 0 {
            return Err(ConfigError::Invalid("receiver.max_image_len"));
        }
        Ok(())
    }

    /// Serialize to postcard binary
    #[cfg(feature = "serde")]
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Deserialize from postcard binary and validate
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LinkConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.transport.baud_rate, 921_600);
        assert_eq!(config.transport.ack_timeout_ms, 5000);
        assert_eq!(config.transport.max_retries, 5);
        assert_eq!(config.backoff.floor_ms, 30);
        assert_eq!(config.backoff.max_ms, 1200);
        assert_eq!(config.recovery.acquire_deadline_ms, 25_000);
        assert_eq!(config.receiver.payload_policy, PayloadPolicy::AckOnIntegrity);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = LinkConfig::default();
        config.transport.ack_timeout_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Invalid("transport.ack_timeout_ms"))
        );
    }

    #[test]
    fn test_rejects_zero_retries() {
        let mut config = LinkConfig::default();
        config.transport.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_floor_above_max() {
        let mut config = LinkConfig::default();
        config.backoff.floor_ms = 2000;
        assert_eq!(config.validate(), Err(ConfigError::Invalid("backoff.floor_ms")));
    }

    #[test]
    fn test_rejects_non_growing_backoff() {
        let mut config = LinkConfig::default();
        config.backoff.growth_num = 2;
        config.backoff.growth_den = 2;
        assert_eq!(config.validate(), Err(ConfigError::Invalid("backoff.growth")));
    }

    #[test]
    fn test_rejects_zero_image_limit() {
        let mut config = LinkConfig::default();
        config.receiver.max_image_len = 0;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_roundtrip() {
        let mut config = LinkConfig::default();
        config.transport.max_retries = 3;
        config.receiver.payload_policy = PayloadPolicy::Strict;

        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let bytes = config.to_bytes(&mut buf).unwrap();
        assert_eq!(LinkConfig::from_bytes(bytes), Ok(config));
    }
}
