//! Logitech G29 USB identifiers and output command bytes.

#![deny(static_mut_refs)]

/// Logitech USB vendor ID.
pub const LOGITECH_VENDOR_ID: u16 = 0x046D;

/// Product IDs the G29 enumerates under.
pub mod product_ids {
    /// G29 racing wheel (PlayStation/PC) in native mode.
    pub const G29_PS: u16 = 0xC24F;
    /// G29 before the native-mode switch (Driving Force compatibility PID).
    pub const G29_COMPAT: u16 = 0xC294;
}

/// First byte of each 7-byte command frame.
pub mod commands {
    /// Slot 1, download and play.
    pub const SLOT1_PLAY: u8 = 0x11;
    /// Extended vendor command prefix (mode switch, LEDs, range).
    pub const EXTENDED: u8 = 0xF8;
    /// Configure the autocenter spring.
    pub const AUTOCENTER_CONFIG: u8 = 0xFE;
    /// Activate the autocenter spring.
    pub const AUTOCENTER_ON: u8 = 0x14;
    /// Deactivate the autocenter spring.
    pub const AUTOCENTER_OFF: u8 = 0xF5;
}

/// Second byte of extended (0xF8) command frames.
pub mod extended {
    /// Revert mode upon USB reset (first half of the native-mode switch).
    pub const REVERT_MODE: u8 = 0x0A;
    /// Switch to the given mode (second half of the native-mode switch).
    pub const SWITCH_MODE: u8 = 0x09;
    /// Set rev-light LEDs.
    pub const SET_LEDS: u8 = 0x12;
    /// Set the rotation range (degrees, u16 little-endian in bytes 2-3).
    pub const SET_RANGE: u8 = 0x81;
}

/// Effect type byte carried after a slot command.
pub mod effects {
    /// Variable (constant) force.
    pub const VARIABLE: u8 = 0x08;
    /// Damper, used for friction.
    pub const DAMPER: u8 = 0x02;
    /// Autocenter spring parameter block.
    pub const AUTOCENTER_SPRING: u8 = 0x0D;
}

/// Mode id of the G29 in the extended mode-switch command.
pub const G29_MODE_ID: u8 = 0x05;

/// Return `true` if the product ID belongs to a G29.
pub fn is_g29_product(product_id: u16) -> bool {
    matches!(product_id, product_ids::G29_PS | product_ids::G29_COMPAT)
}
