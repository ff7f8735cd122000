//! Fuzzes the G29 command encoders and relay framing.
//! Must never panic on arbitrary input.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_g29_output
#![no_main]
use libfuzzer_sys::fuzz_target;
use racing_wheel_hid_g29_protocol::{
    Autocenter, COMMAND_LEN, ForceCommand, LedInput, LedPattern, Platform, RelayTransform,
    encode_autocenter, encode_force, encode_leds, encode_range, encode_relay, encode_relay_os,
};

fn level(bytes: &[u8]) -> Option<f64> {
    let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(f64::from_le_bytes(raw))
}

fuzz_target!(|data: &[u8]| {
    // Levels come straight from the bytes, NaN and infinities included.
    if let Some(l) = level(data) {
        for command in [ForceCommand::Constant(l), ForceCommand::Friction(l)] {
            assert_eq!(encode_force(command).len(), COMMAND_LEN);
        }
        let _ = LedPattern::from_input(&LedInput::Percent(l));
        if let Some(rate) = data.get(8..).and_then(level) {
            let _ = encode_autocenter(Autocenter::Custom { strength: l, rate });
        }
    }

    if let Ok(bits) = std::str::from_utf8(data) {
        if let Ok(pattern) = LedPattern::from_input(&LedInput::from(bits)) {
            let _ = encode_leds(&pattern);
        }
    }

    if let Some(raw) = data.get(..2) {
        let frame = encode_range(u16::from_le_bytes([raw[0], raw[1]]));
        let degrees = u16::from_le_bytes([frame[2], frame[3]]);
        assert!((40..=900).contains(&degrees));
    }

    let _ = encode_relay(data);
    for platform in [Platform::Windows, Platform::Linux] {
        if let Ok(report) = encode_relay_os(data, RelayTransform::for_platform(platform)) {
            assert!(report.len() >= data.len());
        }
    }
});
