//! Link configuration sources
//!
//! A station looks, in order, for: an uploaded `link.toml` in flash, a
//! binary `LinkConfig` in flash, the `link.toml` compiled into the image.
//! If all of those fail it runs on `LinkConfig::default()`.

use defmt::*;

use vstlink_core::config::{ConfigError, LinkConfig, MAX_CONFIG_SIZE};
use vstlink_hal_rp2040::flash::{FlashError, Rp2040FlashStorage, StorageKey};
use vstlink_hal_rp2040::FlashStorageTrait;

use super::toml::{parse_config, ParseError};

/// Uploaded TOML is stored as one flash item
const MAX_TOML_SIZE: usize = 2048;

/// Where the active configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum ConfigSource {
    FlashToml,
    FlashBinary,
    Embedded,
    Defaults,
}

/// Why a stored configuration was not used
#[derive(Debug, Clone, Copy, Format)]
pub enum LoadError {
    Flash(FlashError),
    NotUtf8,
    Toml(ParseError),
    Binary(ConfigError),
}

impl From<FlashError> for LoadError {
    fn from(e: FlashError) -> Self {
        LoadError::Flash(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Binary(e)
    }
}

/// Owns the flash driver while the configuration is resolved
pub struct ConfigPersistence<'d> {
    storage: Rp2040FlashStorage<'d>,
}

impl<'d> ConfigPersistence<'d> {
    pub fn new(storage: Rp2040FlashStorage<'d>) -> Self {
        Self { storage }
    }

    /// Release the flash driver for the image store
    pub fn into_storage(self) -> Rp2040FlashStorage<'d> {
        self.storage
    }

    /// Walk the source chain; never fails
    pub async fn resolve(&mut self, embedded: &str) -> (LinkConfig, ConfigSource) {
        match self.stored_toml().await {
            Ok(config) => return (config, ConfigSource::FlashToml),
            Err(LoadError::Flash(FlashError::NotFound)) => {}
            Err(e) => warn!("Stored link.toml unusable: {:?}", e),
        }

        match self.stored_binary().await {
            Ok(config) => return (config, ConfigSource::FlashBinary),
            Err(LoadError::Flash(FlashError::NotFound)) => {}
            Err(e) => warn!("Stored binary config unusable: {:?}", e),
        }

        match parse_config(embedded) {
            Ok(config) => (config, ConfigSource::Embedded),
            Err(e) => {
                error!("Embedded link.toml rejected: {:?}", e);
                (LinkConfig::default(), ConfigSource::Defaults)
            }
        }
    }

    async fn stored_toml(&mut self) -> Result<LinkConfig, LoadError> {
        let mut text = [0u8; MAX_TOML_SIZE];
        let len = self
            .storage
            .read(StorageKey::LinkConfigToml, &mut text)
            .await?;
        let text = core::str::from_utf8(&text[..len]).map_err(|_| LoadError::NotUtf8)?;
        parse_config(text).map_err(LoadError::Toml)
    }

    async fn stored_binary(&mut self) -> Result<LinkConfig, LoadError> {
        let mut raw = [0u8; MAX_CONFIG_SIZE];
        let len = self.storage.read(StorageKey::LinkConfig, &mut raw).await?;
        Ok(LinkConfig::from_bytes(&raw[..len])?)
    }
}

/// Log the settings that matter when debugging a link
pub fn log_config_summary(config: &LinkConfig, source: ConfigSource) {
    info!("Link configuration from {:?}", source);
    info!(
        "  {} baud, ack timeout {} ms, {} retries",
        config.transport.baud_rate, config.transport.ack_timeout_ms, config.transport.max_retries
    );
    debug!(
        "  max image {} bytes, policy {:?}",
        config.receiver.max_image_len, config.receiver.payload_policy
    );
    debug!(
        "  indicator classes {:?}, pulse {} ms, active low {}",
        config.indicator.led_classes, config.indicator.pulse_ms, config.indicator.active_low
    );
}
