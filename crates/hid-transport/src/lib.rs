//! HID transport capability for racing wheel sessions.
//!
//! Sessions talk to hardware only through [`HidPort`] and [`HidDevice`].
//! This crate provides those traits plus three backends: an in-memory mock
//! for tests, a replay port for `hid-capture` recordings, and (behind the
//! `hidapi` feature) the system HID stack.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod device_info;
pub mod hid_traits;
#[cfg(feature = "hidapi")]
pub mod hidapi_backend;
pub mod replay;

pub use device_info::{DeviceSelector, HidDeviceInfo};
pub use hid_traits::{HidDevice, HidPort, mock};
#[cfg(feature = "hidapi")]
pub use hidapi_backend::HidApiPort;
pub use replay::ReplayPort;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HidCommonError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied opening {0}")]
    PermissionDenied(String),

    #[error("Device already open: {0}")]
    AlreadyOpen(String),

    #[error("Failed to open device: {0}")]
    OpenError(String),

    #[error("Failed to read from device: {0}")]
    ReadError(String),

    #[error("Failed to write to device: {0}")]
    WriteError(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Invalid capture file: {0}")]
    InvalidCapture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HidCommonResult<T> = Result<T, HidCommonError>;
