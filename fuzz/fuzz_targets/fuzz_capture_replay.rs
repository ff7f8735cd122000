//! Fuzzes capture file parsing used by the replay port.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_capture_replay
#![no_main]
use libfuzzer_sys::fuzz_target;
use racing_wheel_hid_transport::replay::{ReplayPort, parse_hex_bytes};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = parse_hex_bytes(text);
    let _ = ReplayPort::from_json(text, "fuzz");
});
