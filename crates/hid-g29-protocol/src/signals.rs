//! Event catalog and signal snapshots.
//!
//! Every decoded report becomes a [`SignalSnapshot`] holding one value per
//! [`WheelEvent`]. Snapshots are compared key by key to find what changed
//! between two reports.

#![deny(static_mut_refs)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed catalog of the events a G29 produces.
///
/// Variant order is the dispatch order: discrete signals first, in their
/// declared order, then the continuous axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WheelEvent {
    #[serde(rename = "wheel-shift_left")]
    ShiftLeft,
    #[serde(rename = "wheel-shift_right")]
    ShiftRight,
    #[serde(rename = "wheel-dpad")]
    Dpad,
    #[serde(rename = "wheel-button_x")]
    ButtonX,
    #[serde(rename = "wheel-button_square")]
    ButtonSquare,
    #[serde(rename = "wheel-button_triangle")]
    ButtonTriangle,
    #[serde(rename = "wheel-button_circle")]
    ButtonCircle,
    #[serde(rename = "wheel-button_l2")]
    ButtonL2,
    #[serde(rename = "wheel-button_r2")]
    ButtonR2,
    #[serde(rename = "wheel-button_l3")]
    ButtonL3,
    #[serde(rename = "wheel-button_r3")]
    ButtonR3,
    #[serde(rename = "wheel-button_plus")]
    ButtonPlus,
    #[serde(rename = "wheel-button_minus")]
    ButtonMinus,
    #[serde(rename = "wheel-spinner")]
    Spinner,
    #[serde(rename = "wheel-button_spinner")]
    ButtonSpinner,
    #[serde(rename = "wheel-button_share")]
    ButtonShare,
    #[serde(rename = "wheel-button_option")]
    ButtonOption,
    #[serde(rename = "wheel-button_playstation")]
    ButtonPlaystation,
    #[serde(rename = "shifter-gear")]
    ShifterGear,
    #[serde(rename = "wheel-turn")]
    WheelTurn,
    #[serde(rename = "pedals-gas")]
    PedalsGas,
    #[serde(rename = "pedals-brake")]
    PedalsBrake,
    #[serde(rename = "pedals-clutch")]
    PedalsClutch,
}

/// How a signal's value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// 0 or 1.
    Button,
    /// 0 = centre, 1..=8 = compass direction clockwise from north.
    Dpad,
    /// -1 = reverse, 0 = neutral, 1..=6.
    Gear,
    /// -1, 0 or 1 per report.
    Spinner,
    /// Continuous in [0, 1].
    Axis,
}

impl WheelEvent {
    /// Number of events in the catalog.
    pub const COUNT: usize = 23;

    /// All events in dispatch order.
    pub const ALL: [WheelEvent; Self::COUNT] = [
        Self::ShiftLeft,
        Self::ShiftRight,
        Self::Dpad,
        Self::ButtonX,
        Self::ButtonSquare,
        Self::ButtonTriangle,
        Self::ButtonCircle,
        Self::ButtonL2,
        Self::ButtonR2,
        Self::ButtonL3,
        Self::ButtonR3,
        Self::ButtonPlus,
        Self::ButtonMinus,
        Self::Spinner,
        Self::ButtonSpinner,
        Self::ButtonShare,
        Self::ButtonOption,
        Self::ButtonPlaystation,
        Self::ShifterGear,
        Self::WheelTurn,
        Self::PedalsGas,
        Self::PedalsBrake,
        Self::PedalsClutch,
    ];

    /// Position of this event in [`WheelEvent::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name, e.g. `"pedals-gas"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShiftLeft => "wheel-shift_left",
            Self::ShiftRight => "wheel-shift_right",
            Self::Dpad => "wheel-dpad",
            Self::ButtonX => "wheel-button_x",
            Self::ButtonSquare => "wheel-button_square",
            Self::ButtonTriangle => "wheel-button_triangle",
            Self::ButtonCircle => "wheel-button_circle",
            Self::ButtonL2 => "wheel-button_l2",
            Self::ButtonR2 => "wheel-button_r2",
            Self::ButtonL3 => "wheel-button_l3",
            Self::ButtonR3 => "wheel-button_r3",
            Self::ButtonPlus => "wheel-button_plus",
            Self::ButtonMinus => "wheel-button_minus",
            Self::Spinner => "wheel-spinner",
            Self::ButtonSpinner => "wheel-button_spinner",
            Self::ButtonShare => "wheel-button_share",
            Self::ButtonOption => "wheel-button_option",
            Self::ButtonPlaystation => "wheel-button_playstation",
            Self::ShifterGear => "shifter-gear",
            Self::WheelTurn => "wheel-turn",
            Self::PedalsGas => "pedals-gas",
            Self::PedalsBrake => "pedals-brake",
            Self::PedalsClutch => "pedals-clutch",
        }
    }

    pub fn kind(self) -> SignalKind {
        match self {
            Self::Dpad => SignalKind::Dpad,
            Self::ShifterGear => SignalKind::Gear,
            Self::Spinner => SignalKind::Spinner,
            Self::WheelTurn | Self::PedalsGas | Self::PedalsBrake | Self::PedalsClutch => {
                SignalKind::Axis
            }
            _ => SignalKind::Button,
        }
    }
}

impl fmt::Display for WheelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown wheel event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for WheelEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// One value per catalog event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSnapshot {
    values: [f64; WheelEvent::COUNT],
}

impl SignalSnapshot {
    /// Wheel centred, pedals released, nothing pressed.
    pub fn resting() -> Self {
        let mut snapshot = Self {
            values: [0.0; WheelEvent::COUNT],
        };
        snapshot.set(WheelEvent::WheelTurn, 0.5);
        snapshot
    }

    pub fn get(&self, event: WheelEvent) -> f64 {
        self.values.get(event.index()).copied().unwrap_or_default()
    }

    pub fn set(&mut self, event: WheelEvent, value: f64) {
        if let Some(slot) = self.values.get_mut(event.index()) {
            *slot = value;
        }
    }

    /// Iterate `(event, value)` pairs in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (WheelEvent, f64)> + '_ {
        WheelEvent::ALL
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Signals whose value differs from `previous`, in dispatch order.
    ///
    /// With no previous snapshot every signal is reported, so a fresh
    /// listener learns the full current state once.
    pub fn changes_since(&self, previous: Option<&SignalSnapshot>) -> Vec<(WheelEvent, f64)> {
        match previous {
            None => self.iter().collect(),
            Some(previous) => self
                .iter()
                // Exact comparison: values are fixed rescalings of integer fields.
                .filter(|&(event, value)| value.to_bits() != previous.get(event).to_bits())
                .collect(),
        }
    }
}

impl Default for SignalSnapshot {
    fn default() -> Self {
        Self::resting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_index() -> Result<(), Box<dyn std::error::Error>> {
        for (i, event) in WheelEvent::ALL.iter().enumerate() {
            assert_eq!(event.index(), i, "{event} out of place");
        }
        Ok(())
    }

    #[test]
    fn test_names_round_trip_through_from_str() -> Result<(), Box<dyn std::error::Error>> {
        for event in WheelEvent::ALL {
            let parsed: WheelEvent = event.as_str().parse()?;
            assert_eq!(parsed, event);
        }
        assert!("wheel-button_start".parse::<WheelEvent>().is_err());
        Ok(())
    }

    #[test]
    fn test_serde_uses_wire_names() -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(&WheelEvent::PedalsGas)?;
        assert_eq!(json, "\"pedals-gas\"");
        let back: WheelEvent = serde_json::from_str("\"shifter-gear\"")?;
        assert_eq!(back, WheelEvent::ShifterGear);
        Ok(())
    }

    #[test]
    fn test_axes_come_last() -> Result<(), Box<dyn std::error::Error>> {
        let first_axis = WheelEvent::ALL
            .iter()
            .position(|e| e.kind() == SignalKind::Axis)
            .ok_or("no axis")?;
        assert!(
            WheelEvent::ALL
                .iter()
                .skip(first_axis)
                .all(|e| e.kind() == SignalKind::Axis)
        );
        Ok(())
    }

    #[test]
    fn test_resting_snapshot() {
        let s = SignalSnapshot::resting();
        assert!((s.get(WheelEvent::WheelTurn) - 0.5).abs() < f64::EPSILON);
        assert!(s.get(WheelEvent::PedalsGas).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_change_is_empty() {
        let s = SignalSnapshot::resting();
        assert!(s.changes_since(Some(&s)).is_empty());
    }

    #[test]
    fn test_first_change_set_is_complete() {
        let s = SignalSnapshot::resting();
        let changes = s.changes_since(None);
        assert_eq!(changes.len(), WheelEvent::COUNT);
        let order: Vec<WheelEvent> = changes.iter().map(|(e, _)| *e).collect();
        assert_eq!(order, WheelEvent::ALL.to_vec());
    }

    #[test]
    fn test_changes_are_in_dispatch_order() {
        let previous = SignalSnapshot::resting();
        let mut current = previous;
        current.set(WheelEvent::PedalsBrake, 0.25);
        current.set(WheelEvent::ButtonX, 1.0);
        current.set(WheelEvent::WheelTurn, 0.75);
        let changes = current.changes_since(Some(&previous));
        let order: Vec<WheelEvent> = changes.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            order,
            vec![
                WheelEvent::ButtonX,
                WheelEvent::WheelTurn,
                WheelEvent::PedalsBrake
            ]
        );
    }
}
