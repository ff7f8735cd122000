//! Replay of recorded input reports.
//!
//! Reads the JSON files written by the `hid-capture` tool:
//!
//! ```json
//! {
//!   "vendor_id": "0x046D",
//!   "product_id": "0xC24F",
//!   "captures": [
//!     { "timestamp_us": 1700000000000, "report_id": 8, "data": "0x08 0x00 ..." }
//!   ]
//! }
//! ```
//!
//! The replayed device reports itself disconnected once every capture has
//! been delivered. Writes are accepted and recorded.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DeviceSelector, HidCommonError, HidCommonResult, HidDevice, HidDeviceInfo, HidPort};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub timestamp_us: u64,
    pub report_id: u8,
    /// Space-separated hex bytes, e.g. `"0x08 0x00 0xFF"`.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFile {
    pub vendor_id: String,
    pub product_id: String,
    pub captures: Vec<CaptureReport>,
}

impl CaptureFile {
    pub fn vendor_id(&self) -> HidCommonResult<u16> {
        parse_hex_u16(&self.vendor_id)
    }

    pub fn product_id(&self) -> HidCommonResult<u16> {
        parse_hex_u16(&self.product_id)
    }
}

/// A capture decoded into raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFrame {
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

pub fn parse_hex_u16(s: &str) -> HidCommonResult<u16> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16)
        .map_err(|e| HidCommonError::InvalidCapture(format!("invalid hex value '{s}': {e}")))
}

/// Parse `"0x08 0xFF"` (the `0x` prefix is optional) into bytes.
pub fn parse_hex_bytes(s: &str) -> HidCommonResult<Vec<u8>> {
    s.split_whitespace()
        .map(|token| {
            let digits = token.trim_start_matches("0x").trim_start_matches("0X");
            u8::from_str_radix(digits, 16).map_err(|e| {
                HidCommonError::InvalidCapture(format!("invalid byte '{token}': {e}"))
            })
        })
        .collect()
}

struct ReplayState {
    frames: Mutex<Vec<ReplayFrame>>,
    cursor: Mutex<usize>,
    written: Mutex<Vec<Vec<u8>>>,
    claimed: AtomicBool,
}

/// A port exposing one device that plays back a capture.
pub struct ReplayPort {
    info: HidDeviceInfo,
    realtime: bool,
    state: Arc<ReplayState>,
}

impl ReplayPort {
    pub fn new(info: HidDeviceInfo, frames: Vec<ReplayFrame>) -> Self {
        Self {
            info,
            realtime: false,
            state: Arc::new(ReplayState {
                frames: Mutex::new(frames),
                cursor: Mutex::new(0),
                written: Mutex::new(Vec::new()),
                claimed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_capture(capture: &CaptureFile, path: impl Into<String>) -> HidCommonResult<Self> {
        let info = HidDeviceInfo::new(capture.vendor_id()?, capture.product_id()?, path)
            .with_product_name("capture replay");
        let frames = capture
            .captures
            .iter()
            .map(|c| {
                Ok(ReplayFrame {
                    timestamp_us: c.timestamp_us,
                    data: parse_hex_bytes(&c.data)?,
                })
            })
            .collect::<HidCommonResult<Vec<_>>>()?;
        Ok(Self::new(info, frames))
    }

    pub fn from_json(json: &str, path: impl Into<String>) -> HidCommonResult<Self> {
        let capture: CaptureFile = serde_json::from_str(json)
            .map_err(|e| HidCommonError::InvalidCapture(e.to_string()))?;
        Self::from_capture(&capture, path)
    }

    pub fn from_path(path: impl AsRef<Path>) -> HidCommonResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, format!("replay:{}", path.display()))
    }

    /// Sleep between reports according to their recorded timestamps.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.state.frames.lock().len()
    }

    /// Frames written to the replayed device so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.written.lock().clone()
    }
}

impl HidPort for ReplayPort {
    fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>> {
        Ok(vec![self.info.clone()])
    }

    fn open_device(&self, selector: &DeviceSelector) -> HidCommonResult<Box<dyn HidDevice>> {
        if !selector.matches(&self.info) {
            return Err(HidCommonError::DeviceNotFound(selector.to_string()));
        }
        if self.state.claimed.swap(true, Ordering::SeqCst) {
            return Err(HidCommonError::AlreadyOpen(self.info.path.clone()));
        }
        debug!(path = %self.info.path, frames = self.frame_count(), "Opened replay device");
        Ok(Box::new(ReplayDevice {
            info: self.info.clone(),
            realtime: self.realtime,
            state: Arc::clone(&self.state),
            last_timestamp_us: None,
            open: true,
        }))
    }
}

struct ReplayDevice {
    info: HidDeviceInfo,
    realtime: bool,
    state: Arc<ReplayState>,
    last_timestamp_us: Option<u64>,
    open: bool,
}

impl ReplayDevice {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.state.claimed.store(false, Ordering::SeqCst);
        }
    }

    fn exhausted(&self) -> bool {
        *self.state.cursor.lock() >= self.state.frames.lock().len()
    }
}

impl HidDevice for ReplayDevice {
    fn write_report(&mut self, data: &[u8]) -> HidCommonResult<usize> {
        if !self.open {
            return Err(HidCommonError::Disconnected);
        }
        self.state.written.lock().push(data.to_vec());
        Ok(data.len())
    }

    fn read_report(&mut self, _timeout_ms: u32) -> HidCommonResult<Option<Vec<u8>>> {
        if !self.open {
            return Err(HidCommonError::Disconnected);
        }
        let frame = {
            let mut cursor = self.state.cursor.lock();
            let frame = self.state.frames.lock().get(*cursor).cloned();
            if frame.is_some() {
                *cursor = cursor.saturating_add(1);
            }
            frame
        };
        let Some(frame) = frame else {
            debug!(path = %self.info.path, "Replay finished");
            return Err(HidCommonError::Disconnected);
        };

        if let (true, Some(last)) = (self.realtime, self.last_timestamp_us) {
            let gap = frame.timestamp_us.saturating_sub(last);
            std::thread::sleep(Duration::from_micros(gap));
        }
        self.last_timestamp_us = Some(frame.timestamp_us);
        Ok(Some(frame.data))
    }

    fn device_info(&self) -> &HidDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.open && !self.exhausted()
    }

    fn close(&mut self) -> HidCommonResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for ReplayDevice {
    fn drop(&mut self) {
        self.release();
    }
}
