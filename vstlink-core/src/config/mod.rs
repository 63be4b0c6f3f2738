//! Configuration types
//!
//! Transport parameters shared by both ends of the link. The firmware keeps
//! them as TOML text or postcard binary data in flash.

pub mod types;

pub use types::*;
