//! Minimal TOML reader for the link configuration
//!
//! Handles only the subset `link.toml` uses:
//! - `[section]` headers (no dotted sections)
//! - `key = value` with integer, boolean, quoted string and integer array
//!   values
//! - `#` comments, whole-line or trailing
//!
//! Keys that are absent keep their `LinkConfig::default()` value.

use vstlink_core::config::{
    BackoffConfig, ConfigError, IndicatorConfig, LinkConfig, PayloadPolicy, ReceiverConfig,
    RecoveryConfig, TransportConfig, MAX_INDICATORS,
};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Line is not `key = value`
    InvalidLine,
    /// Key not known in its section
    UnknownKey,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// Parsed configuration failed validation
    Rejected(ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Transport,
    Backoff,
    Recovery,
    Receiver,
    Indicator,
}

/// Parse TOML text into a validated [`LinkConfig`]
pub fn parse_config(input: &str) -> Result<LinkConfig, ParseError> {
    let mut config = LinkConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        let (key, value) = line.split_once('=').ok_or(ParseError::InvalidLine)?;
        let (key, value) = (key.trim(), value.trim());

        match section {
            Section::Root => return Err(ParseError::UnknownKey),
            Section::Transport => apply_transport(&mut config.transport, key, value)?,
            Section::Backoff => apply_backoff(&mut config.backoff, key, value)?,
            Section::Recovery => apply_recovery(&mut config.recovery, key, value)?,
            Section::Receiver => apply_receiver(&mut config.receiver, key, value)?,
            Section::Indicator => apply_indicator(&mut config.indicator, key, value)?,
        }
    }

    config.validate().map_err(ParseError::Rejected)?;
    Ok(config)
}

/// Drop a trailing `# comment` that is not inside a quoted string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "transport" => Ok(Section::Transport),
        "backoff" => Ok(Section::Backoff),
        "recovery" => Ok(Section::Recovery),
        "receiver" => Ok(Section::Receiver),
        "indicator" => Ok(Section::Indicator),
        _ => Err(ParseError::InvalidSection),
    }
}

fn apply_transport(t: &mut TransportConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "baud_rate" => t.baud_rate = parse_int(value)?,
        "ack_timeout_ms" => t.ack_timeout_ms = parse_int(value)?,
        "max_retries" => t.max_retries = parse_int(value)?,
        "rx_poll_ms" => t.rx_poll_ms = parse_int(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_backoff(b: &mut BackoffConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "floor_ms" => b.floor_ms = parse_int(value)?,
        "max_ms" => b.max_ms = parse_int(value)?,
        "growth_num" => b.growth_num = parse_int(value)?,
        "growth_den" => b.growth_den = parse_int(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_recovery(r: &mut RecoveryConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "acquire_deadline_ms" => r.acquire_deadline_ms = parse_int(value)?,
        "busy_log_interval_ms" => r.busy_log_interval_ms = parse_int(value)?,
        "reinit_cooldown_ms" => r.reinit_cooldown_ms = parse_int(value)?,
        "failure_idle_ms" => r.failure_idle_ms = parse_int(value)?,
        "success_idle_ms" => r.success_idle_ms = parse_int(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_receiver(r: &mut ReceiverConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "max_image_len" => r.max_image_len = parse_int(value)?,
        "payload_policy" => {
            r.payload_policy = match parse_string(value)? {
                "ack_on_integrity" => PayloadPolicy::AckOnIntegrity,
                "strict" => PayloadPolicy::Strict,
                _ => return Err(ParseError::InvalidValue),
            }
        }
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_indicator(i: &mut IndicatorConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "pulse_ms" => i.pulse_ms = parse_int(value)?,
        "led_classes" => i.led_classes = parse_classes(value)?,
        "active_low" => i.active_low = parse_bool(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Parse a quoted string value
fn parse_string(value: &str) -> Result<&str, ParseError> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Ok(&value[1..value.len() - 1])
    } else {
        Err(ParseError::InvalidValue)
    }
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse an integer value, `_` separators allowed
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    let mut digits = heapless::String::<16>::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse `[a, b, c]` into exactly one class id per indicator
fn parse_classes(value: &str) -> Result<[u8; MAX_INDICATORS], ParseError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ParseError::InvalidValue)?;

    let mut classes = [0u8; MAX_INDICATORS];
    let mut count = 0;
    for item in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let slot = classes.get_mut(count).ok_or(ParseError::InvalidValue)?;
        *slot = parse_int(item)?;
        count += 1;
    }
    if count != MAX_INDICATORS {
        return Err(ParseError::InvalidValue);
    }
    Ok(classes)
}
