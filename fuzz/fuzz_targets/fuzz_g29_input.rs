//! Fuzzes the G29 input report decoder and the change diff.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_g29_input
#![no_main]
use libfuzzer_sys::fuzz_target;
use racing_wheel_hid_g29_protocol::{InputDecoder, SignalSnapshot, WheelEvent};

fuzz_target!(|data: &[u8]| {
    // First two bytes pick a range; the rest is split into reports.
    let (range, reports) = match data.split_first_chunk::<2>() {
        Some((head, rest)) => (Some(u16::from_le_bytes(*head)), rest),
        None => (None, data),
    };
    let decoder = InputDecoder::new(Default::default(), range);

    let mut previous: Option<SignalSnapshot> = None;
    for raw in reports.chunks(12) {
        let base = previous.unwrap_or_default();
        let Ok(current) = decoder.decode(raw, &base) else {
            continue;
        };
        for event in WheelEvent::ALL {
            let value = current.get(event);
            assert!(value.is_finite(), "{event} decoded to {value}");
        }
        assert!(current.changes_since(Some(&current)).is_empty());
        previous = Some(current);
    }
});
