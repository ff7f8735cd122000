//! Logitech G29 HID protocol: input decoding, change detection and output
//! command encoding.
//!
//! This crate is I/O-free. It provides pure functions and types that can be
//! tested without hardware; the session crate wires them to a transport.

#![deny(static_mut_refs)]

pub mod ids;
pub mod input;
pub mod output;
pub mod signals;

pub use ids::{LOGITECH_VENDOR_ID, is_g29_product, product_ids};
pub use input::{
    AxisCalibration, BitField, ButtonBinding, DecodeError, InputDecoder, LayoutError,
    MAX_REPORT_LEN, MIN_RANGE_DEGREES, ReportLayout, decode_report, g29_layout,
};
pub use output::{
    Autocenter, COMMAND_LEN, CommandFrame, EncodeError, ForceCommand, LED_COUNT, LedInput,
    LedPattern, MAX_FRAME_LEN, NEUTRAL_FORCE, OutputReport, Platform, RelayTransform,
    encode_autocenter, encode_force, encode_leds, encode_native_mode, encode_range, encode_relay,
    encode_relay_os,
};
pub use signals::{SignalKind, SignalSnapshot, UnknownEvent, WheelEvent};
