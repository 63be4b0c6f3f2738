//! Build script for vstlink-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates link.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate link.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=link.toml");

    let config_path = Path::new("link.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: link.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds link.toml as its default configuration.     ║\n\
            ║  Please create one in the vstlink-firmware directory.            ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read link.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in link.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    validate_required_sections(&config);
    validate_transport(&config);
    validate_backoff(&config);
    validate_receiver(&config);
    validate_indicator(&config);

    println!("cargo:warning=link.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abort the build with a boxed list of problems
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Integer field of a section, checked against an inclusive range
fn check_range(
    errors: &mut Vec<String>,
    section: &toml::value::Table,
    name: &str,
    key: &str,
    min: i64,
    max: i64,
) {
    match section.get(key) {
        Some(toml::Value::Integer(v)) if *v < min || *v > max => {
            errors.push(format!("[{}] {} must be {}-{}", name, key, min, max));
        }
        Some(toml::Value::Integer(_)) | None => {}
        Some(_) => errors.push(format!("[{}] {} must be an integer", name, key)),
    }
}

fn section<'a>(config: &'a toml::Value, name: &str) -> Option<&'a toml::value::Table> {
    config.get(name).and_then(|s| s.as_table())
}

/// [transport] and [receiver] must be present
fn validate_required_sections(config: &toml::Value) {
    let mut errors = Vec::new();

    for name in ["transport", "receiver"] {
        match config.get(name) {
            None => errors.push(format!("Missing [{}] section", name)),
            Some(toml::Value::Table(_)) => {}
            Some(_) => errors.push(format!("[{}] must be a table", name)),
        }
    }

    report("Missing required sections in link.toml", &errors);
}

fn validate_transport(config: &toml::Value) {
    let Some(transport) = section(config, "transport") else {
        return;
    };
    let mut errors = Vec::new();

    check_range(&mut errors, transport, "transport", "baud_rate", 1200, 4_000_000);
    check_range(&mut errors, transport, "transport", "ack_timeout_ms", 1, 600_000);
    check_range(&mut errors, transport, "transport", "max_retries", 1, 255);
    check_range(&mut errors, transport, "transport", "rx_poll_ms", 1, 1000);

    report("Invalid transport configuration", &errors);
}

fn validate_backoff(config: &toml::Value) {
    let Some(backoff) = section(config, "backoff") else {
        return;
    };
    let mut errors = Vec::new();

    check_range(&mut errors, backoff, "backoff", "floor_ms", 1, 60_000);
    check_range(&mut errors, backoff, "backoff", "max_ms", 1, 60_000);
    check_range(&mut errors, backoff, "backoff", "growth_num", 1, 100);
    check_range(&mut errors, backoff, "backoff", "growth_den", 1, 100);

    let int = |key: &str| backoff.get(key).and_then(|v| v.as_integer());
    if let (Some(floor), Some(max)) = (int("floor_ms"), int("max_ms")) {
        if floor > max {
            errors.push("[backoff] floor_ms must not exceed max_ms".to_string());
        }
    }
    if let (Some(num), Some(den)) = (int("growth_num"), int("growth_den")) {
        if num <= den {
            errors.push("[backoff] growth_num must exceed growth_den".to_string());
        }
    }

    report("Invalid backoff configuration", &errors);
}

fn validate_receiver(config: &toml::Value) {
    let Some(receiver) = section(config, "receiver") else {
        return;
    };
    let mut errors = Vec::new();

    // Decoded images must still fit a flash image slot
    check_range(&mut errors, receiver, "receiver", "max_image_len", 1, 100_000);

    match receiver.get("payload_policy") {
        Some(toml::Value::String(policy)) => {
            if !["ack_on_integrity", "strict"].contains(&policy.as_str()) {
                errors.push(
                    "[receiver] payload_policy must be 'ack_on_integrity' or 'strict'"
                        .to_string(),
                );
            }
        }
        Some(_) => errors.push("[receiver] payload_policy must be a string".to_string()),
        None => {}
    }

    report("Invalid receiver configuration", &errors);
}

fn validate_indicator(config: &toml::Value) {
    let Some(indicator) = section(config, "indicator") else {
        return;
    };
    let mut errors = Vec::new();

    check_range(&mut errors, indicator, "indicator", "pulse_ms", 1, 10_000);

    match indicator.get("led_classes") {
        Some(toml::Value::Array(classes)) => {
            if classes.len() != 3 {
                errors.push("[indicator] led_classes must list 3 class ids".to_string());
            }
            for class in classes {
                match class.as_integer() {
                    Some(id) if (0..=255).contains(&id) => {}
                    _ => errors.push(format!("[indicator] bad class id {}", class)),
                }
            }
        }
        Some(_) => errors.push("[indicator] led_classes must be an array".to_string()),
        None => {}
    }

    if let Some(value) = indicator.get("active_low") {
        if !value.is_bool() {
            errors.push("[indicator] active_low must be true or false".to_string());
        }
    }

    report("Invalid indicator configuration", &errors);
}
