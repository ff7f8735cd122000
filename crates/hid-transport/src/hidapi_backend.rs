//! `hidapi`-backed port for real hardware.

use std::collections::HashSet;
use std::sync::Arc;

use hidapi::{DeviceInfo, HidApi};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{DeviceSelector, HidCommonError, HidCommonResult, HidDevice, HidDeviceInfo, HidPort};

/// Largest input report a full-speed HID device delivers.
const READ_BUFFER_LEN: usize = 64;

fn to_device_info(info: &DeviceInfo) -> HidDeviceInfo {
    let mut out = HidDeviceInfo::new(
        info.vendor_id(),
        info.product_id(),
        info.path().to_string_lossy().into_owned(),
    );
    out.serial_number = info.serial_number().map(str::to_string);
    out.manufacturer = info.manufacturer_string().map(str::to_string);
    out.product_name = info.product_string().map(str::to_string);
    out
}

fn open_error(path: &str, err: &hidapi::HidError) -> HidCommonError {
    let message = err.to_string();
    if message.to_ascii_lowercase().contains("permission denied") {
        HidCommonError::PermissionDenied(path.to_string())
    } else {
        HidCommonError::OpenError(format!("{path}: {message}"))
    }
}

/// Opens devices through the system HID stack.
///
/// Claims are tracked per device path so one process never holds two
/// handles to the same wheel.
#[derive(Default)]
pub struct HidApiPort {
    claims: Arc<Mutex<HashSet<String>>>,
}

impl HidApiPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn api() -> HidCommonResult<HidApi> {
        HidApi::new().map_err(|e| HidCommonError::OpenError(format!("hidapi init: {e}")))
    }
}

impl HidPort for HidApiPort {
    fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>> {
        let api = Self::api()?;
        Ok(api.device_list().map(to_device_info).collect())
    }

    fn open_device(&self, selector: &DeviceSelector) -> HidCommonResult<Box<dyn HidDevice>> {
        let api = Self::api()?;
        let (raw_info, info) = api
            .device_list()
            .map(|raw| (raw, to_device_info(raw)))
            .find(|(_, info)| selector.matches(info))
            .ok_or_else(|| HidCommonError::DeviceNotFound(selector.to_string()))?;

        if !self.claims.lock().insert(info.path.clone()) {
            return Err(HidCommonError::AlreadyOpen(info.path));
        }

        match raw_info.open_device(&api) {
            Ok(device) => {
                debug!(path = %info.path, name = %info.display_name(), "Opened HID device");
                Ok(Box::new(HidApiDevice {
                    device: Some(device),
                    info,
                    claims: Arc::clone(&self.claims),
                }))
            }
            Err(e) => {
                self.claims.lock().remove(&info.path);
                Err(open_error(&info.path, &e))
            }
        }
    }
}

struct HidApiDevice {
    device: Option<hidapi::HidDevice>,
    info: HidDeviceInfo,
    claims: Arc<Mutex<HashSet<String>>>,
}

impl HidApiDevice {
    fn handle(&self) -> HidCommonResult<&hidapi::HidDevice> {
        self.device.as_ref().ok_or(HidCommonError::Disconnected)
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            self.claims.lock().remove(&self.info.path);
        }
    }
}

impl HidDevice for HidApiDevice {
    fn write_report(&mut self, data: &[u8]) -> HidCommonResult<usize> {
        self.handle()?
            .write(data)
            .map_err(|e| HidCommonError::WriteError(e.to_string()))
    }

    fn read_report(&mut self, timeout_ms: u32) -> HidCommonResult<Option<Vec<u8>>> {
        let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
        let mut buf = [0u8; READ_BUFFER_LEN];
        match self.handle()?.read_timeout(&mut buf, timeout) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(buf.get(..n).map(<[u8]>::to_vec)),
            Err(e) => {
                warn!(path = %self.info.path, error = %e, "HID read failed");
                Err(HidCommonError::ReadError(e.to_string()))
            }
        }
    }

    fn device_info(&self) -> &HidDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn close(&mut self) -> HidCommonResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for HidApiDevice {
    fn drop(&mut self) {
        self.release();
    }
}
