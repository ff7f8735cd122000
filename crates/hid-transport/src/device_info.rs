//! Device information and selection types for HID devices

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub path: String,
}

impl HidDeviceInfo {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            serial_number: None,
            manufacturer: None,
            product_name: None,
            path: path.into(),
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> String {
        self.product_name
            .clone()
            .or_else(|| self.manufacturer.clone())
            .unwrap_or_else(|| format!("{:04x}:{:04x}", self.vendor_id, self.product_id))
    }
}

/// Picks which device a port should open.
///
/// A device matches when its vendor ID is equal, its product ID is one of
/// `product_ids` (any product when empty), and the optional path and serial
/// number agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelector {
    pub vendor_id: u16,
    #[serde(default)]
    pub product_ids: Vec<u16>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

impl DeviceSelector {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self::any_of(vendor_id, &[product_id])
    }

    pub fn any_of(vendor_id: u16, product_ids: &[u16]) -> Self {
        Self {
            vendor_id,
            product_ids: product_ids.to_vec(),
            path: None,
            serial_number: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn matches(&self, info: &HidDeviceInfo) -> bool {
        info.vendor_id == self.vendor_id
            && (self.product_ids.is_empty() || self.product_ids.contains(&info.product_id))
            && self.path.as_ref().is_none_or(|p| *p == info.path)
            && self
                .serial_number
                .as_ref()
                .is_none_or(|s| info.serial_number.as_ref() == Some(s))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:", self.vendor_id)?;
        match self.product_ids.as_slice() {
            [] => f.write_str("*")?,
            [pid] => write!(f, "{pid:04x}")?,
            pids => {
                let list = pids
                    .iter()
                    .map(|pid| format!("{pid:04x}"))
                    .collect::<Vec<_>>()
                    .join("|");
                write!(f, "{{{list}}}")?;
            }
        }
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        if let Some(serial) = &self.serial_number {
            write!(f, " serial {serial}")?;
        }
        Ok(())
    }
}
