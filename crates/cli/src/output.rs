//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use racing_wheel_g29::{LedPattern, WheelEvent};
use racing_wheel_hid_g29_protocol::{SignalKind, is_g29_product};
use racing_wheel_hid_transport::HidDeviceInfo;
use serde_json::{Value, json};

use crate::error::CliError;

fn print_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &Error) -> &'static str {
    match error.downcast_ref::<CliError>() {
        Some(CliError::DeviceNotFound(_)) => "device_not_found",
        Some(CliError::PermissionDenied(_)) => "permission_denied",
        Some(CliError::InvalidArgument(_)) => "invalid_argument",
        Some(CliError::NoBackend) => "no_backend",
        Some(CliError::Session(_)) => "session",
        None => "unknown",
    }
}

pub fn print_device_list(devices: &[HidDeviceInfo], json: bool) {
    if json {
        let entries: Vec<Value> = devices
            .iter()
            .map(|d| {
                json!({
                    "vendor_id": format!("0x{:04X}", d.vendor_id),
                    "product_id": format!("0x{:04X}", d.product_id),
                    "path": d.path,
                    "name": d.display_name(),
                    "serial_number": d.serial_number,
                    "g29": is_g29_product(d.product_id),
                })
            })
            .collect();
        print_json(&json!({ "success": true, "devices": entries }));
        return;
    }

    if devices.is_empty() {
        println!("{}", "No devices found".yellow());
        return;
    }

    println!("{}", "Connected Devices:".bold());
    for device in devices {
        let marker = if is_g29_product(device.product_id) {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!(
            "  {} {} {:04x}:{:04x} ({})",
            marker,
            device.display_name().bold(),
            device.vendor_id,
            device.product_id,
            device.path.dimmed()
        );
    }
}

/// One line per dispatched event.
pub fn print_event(event: WheelEvent, value: f64, json: bool) {
    if json {
        print_json(&json!({ "event": event.as_str(), "value": value }));
        return;
    }

    let rendered = match event.kind() {
        SignalKind::Axis => format!("{value:.3}"),
        SignalKind::Button => {
            if value > 0.0 {
                "pressed".green().to_string()
            } else {
                "released".dimmed().to_string()
            }
        }
        SignalKind::Dpad | SignalKind::Gear | SignalKind::Spinner => format!("{value}"),
    };
    println!("{:<26} {}", event.as_str().cyan(), rendered);
}

pub fn print_leds(pattern: LedPattern, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "leds": pattern.to_string(),
            "lit": pattern.lit_count(),
        }));
    } else {
        println!("{} LEDs set to {}", "✓".green(), pattern.to_string().bold());
    }
}

pub fn print_frames(action: &str, frames: &[Vec<u8>], json: bool) {
    if json {
        let hex: Vec<String> = frames.iter().map(|f| hex_string(f)).collect();
        print_json(&json!({ "success": true, "action": action, "frames": hex }));
        return;
    }

    println!("{} {}", "✓".green(), action);
    for frame in frames {
        println!("  {}", hex_string(frame).dimmed());
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_string_is_lowercase_and_spaced() {
        assert_eq!(hex_string(&[0xF8, 0x12, 0x1F, 0x00]), "f8 12 1f 00");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn error_type_names_follow_cli_errors() {
        let err = anyhow::Error::new(CliError::NoBackend);
        assert_eq!(error_type_name(&err), "no_backend");
        let err = anyhow::anyhow!("plain");
        assert_eq!(error_type_name(&err), "unknown");
    }
}
