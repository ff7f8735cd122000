//! G29 output report encoding.
//!
//! All encoders are pure. Command frames are 7 bytes; the per-platform relay
//! transform decides whether a report-ID byte goes in front before the frame
//! reaches the transport.
//!
//! # Protocol notes
//!
//! Force effects use the classic Logitech slot protocol:
//!
//! ```text
//! Byte 0: (slot_mask << 4) | operation   0x11 = slot 1, download and play
//! Byte 1: effect type                    0x08 = variable, 0x02 = damper
//! Bytes 2-6: effect parameters
//! ```
//!
//! Every force command targets slot 1, so a new command replaces whatever
//! effect was playing. The variable force byte is unsigned with 0x80 as the
//! no-force centre; higher values push left, lower values push right.
//!
//! Extended commands start with 0xF8: `0x0A` / `0x09` switch the wheel out of
//! compatibility mode, `0x12` drives the five rev-light LEDs and `0x81` sets
//! the rotation range.

#![deny(static_mut_refs)]

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{G29_MODE_ID, commands, effects, extended};
use crate::input::{MIN_RANGE_DEGREES, g29_layout};

/// Wire size of every command frame.
pub const COMMAND_LEN: usize = 7;

/// Largest frame the relay path accepts, report-ID byte included.
pub const MAX_FRAME_LEN: usize = 64;

/// Variable force byte that applies no force.
pub const NEUTRAL_FORCE: u8 = 0x80;

/// Number of rev-light LEDs.
pub const LED_COUNT: usize = 5;

/// Largest damper coefficient the wheel accepts.
pub const MAX_FRICTION_COEFFICIENT: u8 = 7;

/// Percentage thresholds for lighting LEDs from a numeric level: a rounded
/// percentage strictly above `threshold` lights `count` LEDs.
pub const LED_THRESHOLDS: [(u8, usize); 5] = [(84, 5), (69, 4), (39, 3), (19, 2), (4, 1)];

/// A 7-byte command frame.
pub type CommandFrame = [u8; COMMAND_LEN];

/// Invalid output requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("output frame is empty")]
    EmptyFrame,
    #[error("output frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLong { len: usize, max: usize },
    #[error("LED pattern may only contain '0' and '1', found {0:?}")]
    InvalidLedCell(char),
    #[error("LED pattern has {0} cells, the wheel has {max}", max = LED_COUNT)]
    TooManyLedCells(usize),
}

/// A complete output report, ready for a single transport write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputReport(Vec<u8>);

impl OutputReport {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for OutputReport {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for OutputReport {
    fn from(frame: [u8; N]) -> Self {
        Self(frame.to_vec())
    }
}

// ── Force ───────────────────────────────────────────────────────────────────

/// The force profile a session is playing. Only one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceCommand {
    /// 0.0 = full left, 0.5 = none, 1.0 = full right.
    Constant(f64),
    /// 0.0 = none, 1.0 = strongest resistance.
    Friction(f64),
    /// No effect; autocenter keeps running.
    #[default]
    Off,
}

impl ForceCommand {
    /// Constant force with the argument defaulting to no force.
    pub fn constant(level: Option<f64>) -> Self {
        Self::Constant(level.unwrap_or(0.5))
    }

    /// Friction with the argument defaulting to no effect.
    pub fn friction(level: Option<f64>) -> Self {
        Self::Friction(level.unwrap_or(0.0))
    }

    /// Whether this command leaves the wheel without any effect force.
    pub fn is_neutral(&self) -> bool {
        match *self {
            Self::Off => true,
            Self::Constant(level) => constant_level(level) == NEUTRAL_FORCE,
            Self::Friction(level) => friction_coefficient(level) == 0,
        }
    }
}

/// Encode a force command into a slot-1 effect frame.
///
/// `Off` produces the neutral variable-force frame, byte-identical to
/// `Constant(0.5)`.
pub fn encode_force(command: ForceCommand) -> CommandFrame {
    match command {
        ForceCommand::Constant(level) => variable_force_frame(constant_level(level)),
        ForceCommand::Friction(level) => {
            let k = friction_coefficient(level);
            [commands::SLOT1_PLAY, effects::DAMPER, k, 0x00, k, 0x00, 0x00]
        }
        ForceCommand::Off => variable_force_frame(NEUTRAL_FORCE),
    }
}

fn variable_force_frame(force: u8) -> CommandFrame {
    [
        commands::SLOT1_PLAY,
        effects::VARIABLE,
        force,
        NEUTRAL_FORCE,
        0x00,
        0x00,
        0x00,
    ]
}

fn constant_level(level: f64) -> u8 {
    scale_unit(1.0 - clamp_unit(level, 0.5), u8::MAX)
}

fn friction_coefficient(level: f64) -> u8 {
    scale_unit(clamp_unit(level, 0.0), MAX_FRICTION_COEFFICIENT)
}

fn clamp_unit(value: f64, nan_default: f64) -> f64 {
    if value.is_nan() {
        nan_default
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Round `unit * max`; `unit` must already be in [0, 1].
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "operand is clamped to 0..=max before the cast"
)]
fn scale_unit(unit: f64, max: u8) -> u8 {
    (unit * f64::from(max)).round().clamp(0.0, f64::from(max)) as u8
}

// ── Autocenter ──────────────────────────────────────────────────────────────

/// Autocenter spring configuration.
///
/// Serialized as `false`, `true`, or `[strength, rate]` with both values in
/// [0, 1]: `strength` caps the centering force, `rate` sets how quickly it
/// builds as the wheel leaves centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "AutocenterRepr", into = "AutocenterRepr")]
pub enum Autocenter {
    Off,
    #[default]
    Default,
    Custom { strength: f64, rate: f64 },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AutocenterRepr {
    Toggle(bool),
    Custom([f64; 2]),
}

impl From<AutocenterRepr> for Autocenter {
    fn from(repr: AutocenterRepr) -> Self {
        match repr {
            AutocenterRepr::Toggle(false) => Self::Off,
            AutocenterRepr::Toggle(true) => Self::Default,
            AutocenterRepr::Custom([strength, rate]) => Self::Custom { strength, rate },
        }
    }
}

impl From<Autocenter> for AutocenterRepr {
    fn from(autocenter: Autocenter) -> Self {
        match autocenter {
            Autocenter::Off => Self::Toggle(false),
            Autocenter::Default => Self::Toggle(true),
            Autocenter::Custom { strength, rate } => Self::Custom([strength, rate]),
        }
    }
}

const DEFAULT_AUTOCENTER_SLOPE: u8 = 0x07;
const DEFAULT_AUTOCENTER_CLIP: u8 = 0xFF;
const MAX_AUTOCENTER_SLOPE: u8 = 0x0F;

/// Frames that apply an autocenter setting, in send order.
pub fn encode_autocenter(autocenter: Autocenter) -> Vec<CommandFrame> {
    let (slope, clip) = match autocenter {
        Autocenter::Off => return vec![[commands::AUTOCENTER_OFF, 0, 0, 0, 0, 0, 0]],
        Autocenter::Default => (DEFAULT_AUTOCENTER_SLOPE, DEFAULT_AUTOCENTER_CLIP),
        Autocenter::Custom { strength, rate } => (
            scale_unit(clamp_unit(rate, 0.0), MAX_AUTOCENTER_SLOPE),
            scale_unit(clamp_unit(strength, 0.0), u8::MAX),
        ),
    };
    vec![
        [
            commands::AUTOCENTER_CONFIG,
            effects::AUTOCENTER_SPRING,
            slope,
            slope,
            clip,
            0x00,
            0x00,
        ],
        [commands::AUTOCENTER_ON, 0, 0, 0, 0, 0, 0],
    ]
}

/// Two-step switch from compatibility mode into G29 native mode.
pub fn encode_native_mode() -> [CommandFrame; 2] {
    [
        [
            commands::EXTENDED,
            extended::REVERT_MODE,
            0x00,
            0x00,
            0x00,
            0x00,
            0x00,
        ],
        [
            commands::EXTENDED,
            extended::SWITCH_MODE,
            G29_MODE_ID,
            0x01,
            0x01,
            0x00,
            0x00,
        ],
    ]
}

/// Set the firmware rotation range. `degrees` is clamped to 40..=900.
pub fn encode_range(degrees: u16) -> CommandFrame {
    let [lsb, msb] = degrees
        .clamp(MIN_RANGE_DEGREES, g29_layout::HARDWARE_DEGREES)
        .to_le_bytes();
    [
        commands::EXTENDED,
        extended::SET_RANGE,
        lsb,
        msb,
        0x00,
        0x00,
        0x00,
    ]
}

// ── LEDs ────────────────────────────────────────────────────────────────────

/// The forms an LED request can take before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum LedInput {
    /// All LEDs off.
    Off,
    /// A level in [0, 1], bucketed by [`LED_THRESHOLDS`].
    Percent(f64),
    /// Up to five `'0'`/`'1'` characters, leftmost LED first.
    Bits(String),
    /// Up to five cells, leftmost LED first.
    Cells(Vec<bool>),
}

impl From<f64> for LedInput {
    fn from(level: f64) -> Self {
        Self::Percent(level)
    }
}

impl From<&str> for LedInput {
    fn from(bits: &str) -> Self {
        Self::Bits(bits.to_string())
    }
}

impl From<String> for LedInput {
    fn from(bits: String) -> Self {
        Self::Bits(bits)
    }
}

impl From<Vec<bool>> for LedInput {
    fn from(cells: Vec<bool>) -> Self {
        Self::Cells(cells)
    }
}

impl From<&[bool]> for LedInput {
    fn from(cells: &[bool]) -> Self {
        Self::Cells(cells.to_vec())
    }
}

impl<const N: usize> From<[bool; N]> for LedInput {
    fn from(cells: [bool; N]) -> Self {
        Self::Cells(cells.to_vec())
    }
}

/// Zero is off, anything else is on.
impl From<&[u8]> for LedInput {
    fn from(cells: &[u8]) -> Self {
        Self::Cells(cells.iter().map(|&c| c != 0).collect())
    }
}

impl<const N: usize> From<[u8; N]> for LedInput {
    fn from(cells: [u8; N]) -> Self {
        Self::from(&cells[..])
    }
}

impl<T: Into<LedInput>> From<Option<T>> for LedInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Off, Into::into)
    }
}

/// Canonical LED state: green, green, orange, orange, red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LedPattern {
    cells: [bool; LED_COUNT],
}

impl LedPattern {
    pub const ALL_OFF: Self = Self {
        cells: [false; LED_COUNT],
    };

    pub const ALL_ON: Self = Self {
        cells: [true; LED_COUNT],
    };

    pub fn from_input(input: &LedInput) -> Result<Self, EncodeError> {
        match input {
            LedInput::Off => Ok(Self::ALL_OFF),
            LedInput::Percent(level) => Ok(Self::from_level(*level)),
            LedInput::Bits(bits) => Self::from_bits(bits),
            LedInput::Cells(cells) => Self::from_cells(cells),
        }
    }

    /// Light the first `count` LEDs.
    pub fn lit(count: usize) -> Self {
        let mut cells = [false; LED_COUNT];
        for cell in cells.iter_mut().take(count) {
            *cell = true;
        }
        Self { cells }
    }

    /// Bucket a [0, 1] level into a lit count.
    pub fn from_level(level: f64) -> Self {
        let percent = (level * 100.0).round();
        let count = LED_THRESHOLDS
            .iter()
            .find(|&&(threshold, _)| percent > f64::from(threshold))
            .map_or(0, |&(_, count)| count);
        Self::lit(count)
    }

    pub fn from_bits(bits: &str) -> Result<Self, EncodeError> {
        let cells = bits
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(EncodeError::InvalidLedCell(other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_cells(&cells)
    }

    /// Missing trailing cells are off.
    pub fn from_cells(cells: &[bool]) -> Result<Self, EncodeError> {
        if cells.len() > LED_COUNT {
            return Err(EncodeError::TooManyLedCells(cells.len()));
        }
        let mut pattern = Self::ALL_OFF;
        for (slot, &cell) in pattern.cells.iter_mut().zip(cells) {
            *slot = cell;
        }
        Ok(pattern)
    }

    pub fn cells(&self) -> [bool; LED_COUNT] {
        self.cells
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Bit `i` set when LED `i` (counting from the left) is lit.
    pub fn mask(&self) -> u8 {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &lit)| lit)
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }
}

impl fmt::Display for LedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &cell in &self.cells {
            f.write_str(if cell { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Encode an LED pattern into the extended set-LEDs frame.
pub fn encode_leds(pattern: &LedPattern) -> CommandFrame {
    [
        commands::EXTENDED,
        extended::SET_LEDS,
        pattern.mask(),
        0x00,
        0x00,
        0x00,
        0x01,
    ]
}

// ── Relay ───────────────────────────────────────────────────────────────────

/// Host platform, used to pick the relay framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
    Other,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Other
        }
    }
}

/// Byte transform applied to frames on their way to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTransform {
    prefix: &'static [u8],
}

/// Windows HID writes must start with the report ID, 0x00 for this device.
const RELAY_TABLE: [(Platform, RelayTransform); 4] = [
    (Platform::Windows, RelayTransform { prefix: &[0x00] }),
    (Platform::Linux, RelayTransform::IDENTITY),
    (Platform::Macos, RelayTransform::IDENTITY),
    (Platform::Other, RelayTransform::IDENTITY),
];

impl RelayTransform {
    pub const IDENTITY: Self = Self { prefix: &[] };

    pub fn for_platform(platform: Platform) -> Self {
        RELAY_TABLE
            .iter()
            .find(|(p, _)| *p == platform)
            .map_or(Self::IDENTITY, |(_, transform)| *transform)
    }

    pub fn prefix(&self) -> &'static [u8] {
        self.prefix
    }

    /// Prefix `frame` and check the result against the relay bounds.
    pub fn apply(&self, frame: &[u8]) -> Result<OutputReport, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }
        let mut bytes = Vec::with_capacity(self.prefix.len().saturating_add(frame.len()));
        bytes.extend_from_slice(self.prefix);
        bytes.extend_from_slice(frame);
        check_frame_len(bytes.len())?;
        Ok(OutputReport(bytes))
    }
}

impl Default for RelayTransform {
    fn default() -> Self {
        Self::for_platform(Platform::current())
    }
}

fn check_frame_len(len: usize) -> Result<(), EncodeError> {
    match len {
        0 => Err(EncodeError::EmptyFrame),
        len if len > MAX_FRAME_LEN => Err(EncodeError::FrameTooLong {
            len,
            max: MAX_FRAME_LEN,
        }),
        _ => Ok(()),
    }
}

/// Pass `data` through untouched as a complete frame.
pub fn encode_relay(data: &[u8]) -> Result<OutputReport, EncodeError> {
    check_frame_len(data.len())?;
    Ok(OutputReport(data.to_vec()))
}

/// Like [`encode_relay`], after applying the platform transform.
pub fn encode_relay_os(data: &[u8], transform: RelayTransform) -> Result<OutputReport, EncodeError> {
    transform.apply(data)
}
