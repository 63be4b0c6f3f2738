//! Configuration loading and parsing
//!
//! Resolves the link configuration from flash or the embedded `link.toml`.

pub mod loader;
pub mod toml;

pub use loader::{log_config_summary, ConfigPersistence};
