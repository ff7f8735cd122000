//! G29 input report decoding.
//!
//! Offsets and masks live in a [`ReportLayout`] calibration table rather than
//! in the decoding code, so a layout validated against hardware captures can
//! be swapped in from configuration without touching the decoder.

#![deny(static_mut_refs)]

use serde::{Deserialize, Serialize};

use crate::signals::{SignalKind, SignalSnapshot, WheelEvent};

/// Largest input report any HID full-speed device can deliver.
pub const MAX_REPORT_LEN: usize = 64;

/// Smallest rotation range the wheel firmware accepts, in degrees.
pub const MIN_RANGE_DEGREES: u16 = 40;

/// Default G29 calibration table (12-byte native-mode report).
pub mod g29_layout {
    pub const REPORT_LEN: usize = 12;

    /// Low nibble: hat (0 = N .. 7 = NW, 8 = centre). High nibble: symbol buttons.
    pub const DPAD_BYTE: usize = 0;
    pub const BUTTON_X: u8 = 0x10;
    pub const BUTTON_SQUARE: u8 = 0x20;
    pub const BUTTON_CIRCLE: u8 = 0x40;
    pub const BUTTON_TRIANGLE: u8 = 0x80;

    pub const SHOULDER_BYTE: usize = 1;
    pub const SHIFT_RIGHT: u8 = 0x01;
    pub const SHIFT_LEFT: u8 = 0x02;
    pub const BUTTON_R2: u8 = 0x04;
    pub const BUTTON_L2: u8 = 0x08;
    pub const BUTTON_SHARE: u8 = 0x10;
    pub const BUTTON_OPTION: u8 = 0x20;
    pub const BUTTON_R3: u8 = 0x40;
    pub const BUTTON_L3: u8 = 0x80;

    /// One bit per H-shifter slot, gears 1 to 6, then reverse.
    pub const GEAR_BYTE: usize = 2;
    pub const GEAR_MASKS: [u8; 6] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20];
    pub const GEAR_REVERSE: u8 = 0x80;

    pub const CONSOLE_BYTE: usize = 3;
    pub const BUTTON_PLUS: u8 = 0x01;
    pub const BUTTON_MINUS: u8 = 0x02;
    pub const SPINNER_CW: u8 = 0x04;
    pub const SPINNER_CCW: u8 = 0x08;
    pub const BUTTON_SPINNER: u8 = 0x10;
    pub const BUTTON_PLAYSTATION: u8 = 0x20;

    /// Wheel position, u16 little-endian across this byte and the next.
    pub const WHEEL_LSB: usize = 4;

    /// Pedals report 0xFF when released.
    pub const GAS: usize = 6;
    pub const BRAKE: usize = 7;
    pub const CLUTCH: usize = 8;

    pub const HARDWARE_DEGREES: u16 = 900;
}

/// A single bit (or group of bits) at a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BitField {
    pub byte: usize,
    pub mask: u8,
}

impl BitField {
    pub const fn new(byte: usize, mask: u8) -> Self {
        Self { byte, mask }
    }

    fn read(self, raw: &[u8]) -> Option<bool> {
        raw.get(self.byte).map(|b| b & self.mask != 0)
    }
}

/// Binds a button event to the bit that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonBinding {
    pub event: WheelEvent,
    pub byte: usize,
    pub mask: u8,
}

impl ButtonBinding {
    pub const fn new(event: WheelEvent, byte: usize, mask: u8) -> Self {
        Self { event, byte, mask }
    }

    pub fn bit(&self) -> BitField {
        BitField::new(self.byte, self.mask)
    }
}

/// Byte offsets and masks for every signal in an input report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportLayout {
    pub report_len: usize,
    pub dpad_byte: usize,
    pub buttons: Vec<ButtonBinding>,
    pub spinner_cw: BitField,
    pub spinner_ccw: BitField,
    pub gear_byte: usize,
    pub gear_masks: [u8; 6],
    pub reverse_mask: u8,
    pub wheel_lsb: usize,
    pub gas: usize,
    pub brake: usize,
    pub clutch: usize,
    /// Pedal bytes read 0xFF when released.
    pub pedals_inverted: bool,
    /// Full mechanical rotation the wheel axis spans.
    pub hardware_degrees: u16,
}

/// Rejected calibration tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("report length {0} is outside 1..={max}", max = MAX_REPORT_LEN)]
    BadReportLength(usize),
    #[error("{field} offset {offset} lies outside a {report_len}-byte report")]
    OffsetOutOfRange {
        field: String,
        offset: usize,
        report_len: usize,
    },
    #[error("{0} is not a button and cannot be bound to a bit")]
    NotAButton(WheelEvent),
    #[error("hardware rotation of {0} degrees is below the {min} degree minimum", min = MIN_RANGE_DEGREES)]
    BadHardwareDegrees(u16),
}

impl ReportLayout {
    /// Calibration table for a G29 in native mode.
    pub fn g29() -> Self {
        use g29_layout as l;
        let button = ButtonBinding::new;
        Self {
            report_len: l::REPORT_LEN,
            dpad_byte: l::DPAD_BYTE,
            buttons: vec![
                button(WheelEvent::ShiftLeft, l::SHOULDER_BYTE, l::SHIFT_LEFT),
                button(WheelEvent::ShiftRight, l::SHOULDER_BYTE, l::SHIFT_RIGHT),
                button(WheelEvent::ButtonX, l::DPAD_BYTE, l::BUTTON_X),
                button(WheelEvent::ButtonSquare, l::DPAD_BYTE, l::BUTTON_SQUARE),
                button(WheelEvent::ButtonTriangle, l::DPAD_BYTE, l::BUTTON_TRIANGLE),
                button(WheelEvent::ButtonCircle, l::DPAD_BYTE, l::BUTTON_CIRCLE),
                button(WheelEvent::ButtonL2, l::SHOULDER_BYTE, l::BUTTON_L2),
                button(WheelEvent::ButtonR2, l::SHOULDER_BYTE, l::BUTTON_R2),
                button(WheelEvent::ButtonL3, l::SHOULDER_BYTE, l::BUTTON_L3),
                button(WheelEvent::ButtonR3, l::SHOULDER_BYTE, l::BUTTON_R3),
                button(WheelEvent::ButtonPlus, l::CONSOLE_BYTE, l::BUTTON_PLUS),
                button(WheelEvent::ButtonMinus, l::CONSOLE_BYTE, l::BUTTON_MINUS),
                button(WheelEvent::ButtonSpinner, l::CONSOLE_BYTE, l::BUTTON_SPINNER),
                button(WheelEvent::ButtonShare, l::SHOULDER_BYTE, l::BUTTON_SHARE),
                button(WheelEvent::ButtonOption, l::SHOULDER_BYTE, l::BUTTON_OPTION),
                button(
                    WheelEvent::ButtonPlaystation,
                    l::CONSOLE_BYTE,
                    l::BUTTON_PLAYSTATION,
                ),
            ],
            spinner_cw: BitField::new(l::CONSOLE_BYTE, l::SPINNER_CW),
            spinner_ccw: BitField::new(l::CONSOLE_BYTE, l::SPINNER_CCW),
            gear_byte: l::GEAR_BYTE,
            gear_masks: l::GEAR_MASKS,
            reverse_mask: l::GEAR_REVERSE,
            wheel_lsb: l::WHEEL_LSB,
            gas: l::GAS,
            brake: l::BRAKE,
            clutch: l::CLUTCH,
            pedals_inverted: true,
            hardware_degrees: l::HARDWARE_DEGREES,
        }
    }

    /// Check that every offset fits inside the report and bindings target buttons.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.report_len == 0 || self.report_len > MAX_REPORT_LEN {
            return Err(LayoutError::BadReportLength(self.report_len));
        }
        if self.hardware_degrees < MIN_RANGE_DEGREES {
            return Err(LayoutError::BadHardwareDegrees(self.hardware_degrees));
        }

        let check = |field: &str, offset: usize| {
            if offset < self.report_len {
                Ok(())
            } else {
                Err(LayoutError::OffsetOutOfRange {
                    field: field.to_string(),
                    offset,
                    report_len: self.report_len,
                })
            }
        };

        check("dpad", self.dpad_byte)?;
        check("spinner_cw", self.spinner_cw.byte)?;
        check("spinner_ccw", self.spinner_ccw.byte)?;
        check("gear", self.gear_byte)?;
        check("wheel", self.wheel_lsb.saturating_add(1))?;
        check("gas", self.gas)?;
        check("brake", self.brake)?;
        check("clutch", self.clutch)?;
        for binding in &self.buttons {
            if binding.event.kind() != SignalKind::Button {
                return Err(LayoutError::NotAButton(binding.event));
            }
            check(binding.event.as_str(), binding.byte)?;
        }
        Ok(())
    }
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self::g29()
    }
}

/// Malformed input reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("bad report length: got {actual} bytes, expected 1..={max}")]
    BadLength { actual: usize, max: usize },
}

/// Maps the raw wheel position onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCalibration {
    hardware_degrees: u16,
    range_degrees: Option<u16>,
}

impl AxisCalibration {
    /// `range` narrows the logical rotation; it is clamped to
    /// `MIN_RANGE_DEGREES..=hardware_degrees`.
    pub fn new(hardware_degrees: u16, range: Option<u16>) -> Self {
        let hardware_degrees = hardware_degrees.max(MIN_RANGE_DEGREES);
        Self {
            hardware_degrees,
            range_degrees: range.map(|r| r.clamp(MIN_RANGE_DEGREES, hardware_degrees)),
        }
    }

    /// Effective rotation range in degrees.
    pub fn range_degrees(&self) -> u16 {
        self.range_degrees.unwrap_or(self.hardware_degrees)
    }

    pub fn normalize(&self, raw: u16) -> f64 {
        let unit = f64::from(raw) / f64::from(u16::MAX);
        let Some(range) = self.range_degrees else {
            return unit;
        };
        let centred = unit * 2.0 - 1.0;
        let scale = f64::from(self.hardware_degrees) / f64::from(range);
        ((centred * scale).clamp(-1.0, 1.0) + 1.0) / 2.0
    }
}

/// Turns raw input reports into [`SignalSnapshot`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDecoder {
    layout: ReportLayout,
    axis: AxisCalibration,
}

impl InputDecoder {
    pub fn new(layout: ReportLayout, range: Option<u16>) -> Self {
        let axis = AxisCalibration::new(layout.hardware_degrees, range);
        Self { layout, axis }
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    pub fn axis(&self) -> &AxisCalibration {
        &self.axis
    }

    /// Decode `raw` on top of `previous`.
    ///
    /// Signals whose bytes are missing from a short report keep their value
    /// from `previous`. Empty reports and reports longer than the layout are
    /// rejected.
    pub fn decode(
        &self,
        raw: &[u8],
        previous: &SignalSnapshot,
    ) -> Result<SignalSnapshot, DecodeError> {
        let layout = &self.layout;
        if raw.is_empty() || raw.len() > layout.report_len {
            return Err(DecodeError::BadLength {
                actual: raw.len(),
                max: layout.report_len,
            });
        }

        let mut snapshot = *previous;

        if let Some(b) = raw.get(layout.dpad_byte) {
            snapshot.set(WheelEvent::Dpad, dpad_code(b & 0x0F));
        }

        for binding in &layout.buttons {
            if let Some(pressed) = binding.bit().read(raw) {
                snapshot.set(binding.event, flag(pressed));
            }
        }

        if let (Some(cw), Some(ccw)) = (layout.spinner_cw.read(raw), layout.spinner_ccw.read(raw))
        {
            let value = match (cw, ccw) {
                (true, false) => 1.0,
                (false, true) => -1.0,
                _ => 0.0,
            };
            snapshot.set(WheelEvent::Spinner, value);
        }

        if let Some(b) = raw.get(layout.gear_byte) {
            snapshot.set(
                WheelEvent::ShifterGear,
                gear_code(*b, &layout.gear_masks, layout.reverse_mask),
            );
        }

        let msb = layout
            .wheel_lsb
            .checked_add(1)
            .and_then(|i| raw.get(i))
            .copied();
        if let (Some(lsb), Some(msb)) = (raw.get(layout.wheel_lsb).copied(), msb) {
            let position = u16::from_le_bytes([lsb, msb]);
            snapshot.set(WheelEvent::WheelTurn, self.axis.normalize(position));
        }

        let pedals = [
            (WheelEvent::PedalsGas, layout.gas),
            (WheelEvent::PedalsBrake, layout.brake),
            (WheelEvent::PedalsClutch, layout.clutch),
        ];
        for (event, offset) in pedals {
            if let Some(b) = raw.get(offset) {
                snapshot.set(event, pedal_value(*b, layout.pedals_inverted));
            }
        }

        Ok(snapshot)
    }
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(ReportLayout::g29(), None)
    }
}

/// Decode a report with the default G29 layout on top of a resting snapshot.
pub fn decode_report(raw: &[u8]) -> Result<SignalSnapshot, DecodeError> {
    InputDecoder::default().decode(raw, &SignalSnapshot::resting())
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}

/// Hat nibble to compass code: 0 = centre, 1 = N, 2 = NE, .. 8 = NW.
fn dpad_code(nibble: u8) -> f64 {
    match nibble {
        0..=7 => f64::from(nibble + 1),
        _ => 0.0,
    }
}

fn gear_code(b: u8, gear_masks: &[u8; 6], reverse_mask: u8) -> f64 {
    if reverse_mask != 0 && b & reverse_mask != 0 {
        return -1.0;
    }
    (1u8..)
        .zip(gear_masks.iter())
        .find(|&(_, mask)| *mask != 0 && b & mask != 0)
        .map_or(0.0, |(gear, _)| f64::from(gear))
}

fn pedal_value(b: u8, inverted: bool) -> f64 {
    let pressed = if inverted { u8::MAX - b } else { b };
    f64::from(pressed) / f64::from(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use g29_layout as l;

    fn idle_report() -> [u8; l::REPORT_LEN] {
        let mut r = [0u8; l::REPORT_LEN];
        r[l::DPAD_BYTE] = 0x08;
        r[l::WHEEL_LSB] = 0xFF;
        r[l::WHEEL_LSB + 1] = 0x7F;
        r[l::GAS] = 0xFF;
        r[l::BRAKE] = 0xFF;
        r[l::CLUTCH] = 0xFF;
        r
    }

    #[test]
    fn test_idle_report_decodes_to_rest() -> Result<(), Box<dyn std::error::Error>> {
        let s = decode_report(&idle_report())?;
        assert!((s.get(WheelEvent::WheelTurn) - 0.5).abs() < 0.001);
        assert!(s.get(WheelEvent::PedalsGas).abs() < f64::EPSILON);
        assert!(s.get(WheelEvent::Dpad).abs() < f64::EPSILON);
        assert!(s.get(WheelEvent::ShifterGear).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_wheel_extremes() -> Result<(), Box<dyn std::error::Error>> {
        let mut r = idle_report();
        r[l::WHEEL_LSB] = 0x00;
        r[l::WHEEL_LSB + 1] = 0x00;
        assert!(decode_report(&r)?.get(WheelEvent::WheelTurn).abs() < f64::EPSILON);
        r[l::WHEEL_LSB] = 0xFF;
        r[l::WHEEL_LSB + 1] = 0xFF;
        assert!((decode_report(&r)?.get(WheelEvent::WheelTurn) - 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_pedal_polarity_is_corrected() -> Result<(), Box<dyn std::error::Error>> {
        let mut r = idle_report();
        r[l::GAS] = 0x00;
        r[l::BRAKE] = 0x80;
        let s = decode_report(&r)?;
        assert!((s.get(WheelEvent::PedalsGas) - 1.0).abs() < f64::EPSILON);
        assert!((s.get(WheelEvent::PedalsBrake) - 127.0 / 255.0).abs() < 1e-9);
        assert!(s.get(WheelEvent::PedalsClutch).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_dpad_compass_codes() -> Result<(), Box<dyn std::error::Error>> {
        let mut r = idle_report();
        for (nibble, code) in [(0u8, 1.0), (2, 3.0), (7, 8.0), (8, 0.0), (0x0F, 0.0)] {
            r[l::DPAD_BYTE] = nibble;
            let s = decode_report(&r)?;
            assert!(
                (s.get(WheelEvent::Dpad) - code).abs() < f64::EPSILON,
                "nibble {nibble} should map to {code}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_symbol_buttons_share_the_dpad_byte() -> Result<(), Box<dyn std::error::Error>> {
        let mut r = idle_report();
        r[l::DPAD_BYTE] = 0x08 | l::BUTTON_X | l::BUTTON_TRIANGLE;
        let s = decode_report(&r)?;
        assert!((s.get(WheelEvent::ButtonX) - 1.0).abs() < f64::EPSILON);
        assert!((s.get(WheelEvent::ButtonTriangle) - 1.0).abs() < f64::EPSILON);
        assert!(s.get(WheelEvent::ButtonSquare).abs() < f64::EPSILON);
        assert!(s.get(WheelEvent::Dpad).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_spinner_and_gear() -> Result<(), Box<dyn std::error::Error>> {
        let mut r = idle_report();
        r[l::CONSOLE_BYTE] = l::SPINNER_CCW | l::BUTTON_SPINNER;
        r[l::GEAR_BYTE] = 0x08;
        let s = decode_report(&r)?;
        assert!((s.get(WheelEvent::Spinner) + 1.0).abs() < f64::EPSILON);
        assert!((s.get(WheelEvent::ButtonSpinner) - 1.0).abs() < f64::EPSILON);
        assert!((s.get(WheelEvent::ShifterGear) - 4.0).abs() < f64::EPSILON);

        r[l::GEAR_BYTE] = l::GEAR_REVERSE;
        let s = decode_report(&r)?;
        assert!((s.get(WheelEvent::ShifterGear) + 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_range_override_scales_around_centre() -> Result<(), Box<dyn std::error::Error>> {
        let axis = AxisCalibration::new(900, Some(450));
        assert!((axis.normalize(0x7FFF) - 0.5).abs() < 1e-4);
        // A quarter turn of the hardware span is half of the logical span.
        let quarter = axis.normalize(0xBFFF);
        assert!((quarter - 1.0).abs() < 1e-3, "got {quarter}");
        assert!(axis.normalize(0x0000).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_range_is_clamped() {
        assert_eq!(AxisCalibration::new(900, Some(10)).range_degrees(), 40);
        assert_eq!(AxisCalibration::new(900, Some(1080)).range_degrees(), 900);
        assert_eq!(AxisCalibration::new(900, None).range_degrees(), 900);
    }

    #[test]
    fn test_partial_report_keeps_previous_values() -> Result<(), Box<dyn std::error::Error>> {
        let decoder = InputDecoder::default();
        let mut full = idle_report();
        full[l::BRAKE] = 0x00;
        let previous = decoder.decode(&full, &SignalSnapshot::resting())?;

        let mut partial = full;
        partial[l::SHOULDER_BYTE] = l::SHIFT_LEFT;
        let s = decoder.decode(&partial[..5], &previous)?;
        assert!((s.get(WheelEvent::ShiftLeft) - 1.0).abs() < f64::EPSILON);
        // Brake and wheel bytes were not in the short report.
        assert!((s.get(WheelEvent::PedalsBrake) - 1.0).abs() < f64::EPSILON);
        assert!(
            (s.get(WheelEvent::WheelTurn) - previous.get(WheelEvent::WheelTurn)).abs()
                < f64::EPSILON
        );
        Ok(())
    }

    #[test]
    fn test_empty_and_oversized_reports_are_rejected() {
        assert_eq!(
            decode_report(&[]),
            Err(DecodeError::BadLength {
                actual: 0,
                max: l::REPORT_LEN
            })
        );
        assert_eq!(
            decode_report(&[0u8; 13]),
            Err(DecodeError::BadLength {
                actual: 13,
                max: l::REPORT_LEN
            })
        );
    }

    #[test]
    fn test_default_layout_is_valid() -> Result<(), Box<dyn std::error::Error>> {
        ReportLayout::g29().validate()?;
        Ok(())
    }

    #[test]
    fn test_layout_validation_rejects_bad_offsets() {
        let mut layout = ReportLayout::g29();
        layout.clutch = 12;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::OffsetOutOfRange { .. })
        ));

        let mut layout = ReportLayout::g29();
        layout.wheel_lsb = 11;
        assert!(layout.validate().is_err(), "wheel MSB would be byte 12");

        let mut layout = ReportLayout::g29();
        layout
            .buttons
            .push(ButtonBinding::new(WheelEvent::PedalsGas, 0, 1));
        assert_eq!(
            layout.validate(),
            Err(LayoutError::NotAButton(WheelEvent::PedalsGas))
        );
    }

    #[test]
    fn test_layout_deserializes_from_json() -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(&ReportLayout::g29())?;
        assert!(json.contains("\"event\":\"wheel-button_x\""));
        let back: ReportLayout = serde_json::from_str(&json)?;
        assert_eq!(back, ReportLayout::g29());
        Ok(())
    }
}
