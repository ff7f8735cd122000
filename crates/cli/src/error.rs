//! Error types for g29ctl

use racing_wheel_g29::SessionError;
use racing_wheel_hid_transport::HidCommonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No HID backend available: pass --replay or build with the `hidapi` feature")]
    NoBackend,

    #[error("Session error: {0}")]
    Session(SessionError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::DeviceNotFound(_) => 2,
            Self::InvalidArgument(_) => 4,
            Self::NoBackend => 5,
            Self::PermissionDenied(_) => 6,
            Self::Session(SessionError::Config(_) | SessionError::Encode(_)) => 4,
            Self::Session(_) => 1,
        }
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Transport(HidCommonError::DeviceNotFound(what)) => {
                Self::DeviceNotFound(what)
            }
            SessionError::Transport(HidCommonError::PermissionDenied(what)) => {
                Self::PermissionDenied(what)
            }
            other => Self::Session(other),
        }
    }
}

impl From<HidCommonError> for CliError {
    fn from(err: HidCommonError) -> Self {
        Self::from(SessionError::Transport(err))
    }
}
