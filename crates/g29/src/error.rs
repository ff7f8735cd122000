//! Error types for wheel sessions.

use racing_wheel_hid_g29_protocol::{EncodeError, LayoutError};
use racing_wheel_hid_transport::HidCommonError;
use thiserror::Error;

/// Errors returned by [`crate::WheelSession`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A command or poll was issued while no device is open.
    #[error("Wheel is not connected")]
    NotConnected,

    /// `connect` while connecting or connected, or the device is claimed elsewhere.
    #[error("Wheel is already connected")]
    AlreadyConnected,

    /// `disconnect` ran while the connection was being set up.
    #[error("Connection cancelled")]
    Cancelled,

    /// The device failed to open, read or write.
    #[error("Transport error: {0}")]
    Transport(#[from] HidCommonError),

    /// The requested output could not be encoded. Nothing was written.
    #[error("Invalid output request: {0}")]
    Encode(#[from] EncodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the session is disconnected as a result of this error.
    ///
    /// There is no automatic reconnect; callers decide whether to `connect`
    /// again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }
}

impl From<LayoutError> for SessionError {
    fn from(err: LayoutError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
