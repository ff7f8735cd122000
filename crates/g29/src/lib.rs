//! Logitech G29 wheel sessions.
//!
//! A [`WheelSession`] owns one wheel connection. Input reports are decoded,
//! diffed against the previous report and delivered to handlers registered
//! per [`WheelEvent`]; force, LED and raw relay commands are encoded and
//! written to the device.
//!
//! ```no_run
//! use std::sync::Arc;
//! use racing_wheel_g29::{SessionOptions, WheelEvent, WheelSession};
//! use racing_wheel_hid_transport::replay::ReplayPort;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = Arc::new(ReplayPort::from_path("capture.json")?);
//! let session = Arc::new(WheelSession::new(port));
//! let s = Arc::clone(&session);
//! session.on(WheelEvent::PedalsGas, move |level| {
//!     let _ = s.leds(level);
//! });
//! session.connect(SessionOptions::default())?;
//! session.run(10)?;
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]

pub mod dispatch;
pub mod error;
pub mod options;
pub mod session;

pub use dispatch::{EventEmitter, HandlerId, dispatch};
pub use error::{SessionError, SessionResult};
pub use options::SessionOptions;
pub use session::{PollOutcome, SessionState, WheelSession, g29_selector};

pub use racing_wheel_hid_g29_protocol::{
    Autocenter, ForceCommand, LedInput, LedPattern, Platform, SignalSnapshot, WheelEvent,
};
