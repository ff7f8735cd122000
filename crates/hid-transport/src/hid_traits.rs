//! HID device traits

use crate::{DeviceSelector, HidCommonResult, HidDeviceInfo};

/// An open device handle.
///
/// Dropping or closing a handle releases the port's claim on the device.
pub trait HidDevice: Send {
    /// Write one complete output report, returning the number of bytes taken.
    fn write_report(&mut self, data: &[u8]) -> HidCommonResult<usize>;

    /// Wait up to `timeout_ms` for one input report. `Ok(None)` on timeout.
    fn read_report(&mut self, timeout_ms: u32) -> HidCommonResult<Option<Vec<u8>>>;

    fn device_info(&self) -> &HidDeviceInfo;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> HidCommonResult<()>;
}

/// Enumerates devices and hands out exclusive handles.
pub trait HidPort: Send + Sync {
    fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>>;

    /// Open the first device matching `selector`.
    ///
    /// Fails with `AlreadyOpen` while another handle to the same device is live.
    fn open_device(&self, selector: &DeviceSelector) -> HidCommonResult<Box<dyn HidDevice>>;
}

pub mod mock {
    use super::*;
    use crate::HidCommonError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// How the next write should misbehave.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WriteFault {
        Error,
        /// Accept one byte fewer than offered.
        Short,
    }

    type WriteHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

    enum QueuedRead {
        Report(Vec<u8>),
        Error(String),
    }

    struct MockState {
        read_queue: Mutex<VecDeque<QueuedRead>>,
        write_history: Mutex<Vec<Vec<u8>>>,
        write_fault: Mutex<Option<WriteFault>>,
        write_hook: Mutex<Option<WriteHook>>,
        connected: AtomicBool,
        claimed: AtomicBool,
    }

    /// A simulated device. Clones share state, so a test can keep one clone
    /// to feed reports and inspect writes while the port hands out handles.
    #[derive(Clone)]
    pub struct MockHidDevice {
        info: HidDeviceInfo,
        state: Arc<MockState>,
    }

    impl MockHidDevice {
        pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
            Self {
                info: HidDeviceInfo::new(vendor_id, product_id, path),
                state: Arc::new(MockState {
                    read_queue: Mutex::new(VecDeque::new()),
                    write_history: Mutex::new(Vec::new()),
                    write_fault: Mutex::new(None),
                    write_hook: Mutex::new(None),
                    connected: AtomicBool::new(true),
                    claimed: AtomicBool::new(false),
                }),
            }
        }

        pub fn info(&self) -> &HidDeviceInfo {
            &self.info
        }

        pub fn queue_read(&self, data: Vec<u8>) {
            self.state
                .read_queue
                .lock()
                .push_back(QueuedRead::Report(data));
        }

        pub fn queue_read_error(&self, message: impl Into<String>) {
            self.state
                .read_queue
                .lock()
                .push_back(QueuedRead::Error(message.into()));
        }

        pub fn pending_reads(&self) -> usize {
            self.state.read_queue.lock().len()
        }

        pub fn get_write_history(&self) -> Vec<Vec<u8>> {
            self.state.write_history.lock().clone()
        }

        pub fn clear_write_history(&self) {
            self.state.write_history.lock().clear();
        }

        pub fn fail_next_write(&self, fault: WriteFault) {
            *self.state.write_fault.lock() = Some(fault);
        }

        /// Run `hook` after every accepted write, outside any mock lock.
        pub fn set_write_hook(&self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
            *self.state.write_hook.lock() = Some(Arc::new(hook));
        }

        /// Simulate unplugging the device.
        pub fn disconnect(&self) {
            self.state.connected.store(false, Ordering::SeqCst);
        }

        pub fn reconnect(&self) {
            self.state.connected.store(true, Ordering::SeqCst);
        }

        pub fn is_claimed(&self) -> bool {
            self.state.claimed.load(Ordering::SeqCst)
        }

        fn open_handle(&self) -> HidCommonResult<MockHidHandle> {
            if !self.state.connected.load(Ordering::SeqCst) {
                return Err(HidCommonError::DeviceNotFound(self.info.path.clone()));
            }
            if self.state.claimed.swap(true, Ordering::SeqCst) {
                return Err(HidCommonError::AlreadyOpen(self.info.path.clone()));
            }
            Ok(MockHidHandle {
                device: self.clone(),
                open: true,
            })
        }
    }

    /// Handle returned by [`MockHidPort::open_device`].
    pub struct MockHidHandle {
        device: MockHidDevice,
        open: bool,
    }

    impl MockHidHandle {
        fn check_live(&self) -> HidCommonResult<()> {
            if self.open && self.device.state.connected.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(HidCommonError::Disconnected)
            }
        }

        fn release(&mut self) {
            if self.open {
                self.open = false;
                self.device.state.claimed.store(false, Ordering::SeqCst);
            }
        }
    }

    impl HidDevice for MockHidHandle {
        fn write_report(&mut self, data: &[u8]) -> HidCommonResult<usize> {
            self.check_live()?;
            let state = &self.device.state;

            let written = match state.write_fault.lock().take() {
                Some(WriteFault::Error) => {
                    return Err(HidCommonError::WriteError("injected fault".to_string()));
                }
                Some(WriteFault::Short) => data.len().saturating_sub(1),
                None => data.len(),
            };
            state
                .write_history
                .lock()
                .push(data.get(..written).unwrap_or(data).to_vec());

            let hook = state.write_hook.lock().clone();
            if let Some(hook) = hook {
                hook(data);
            }
            Ok(written)
        }

        fn read_report(&mut self, _timeout_ms: u32) -> HidCommonResult<Option<Vec<u8>>> {
            self.check_live()?;
            match self.device.state.read_queue.lock().pop_front() {
                Some(QueuedRead::Report(data)) => Ok(Some(data)),
                Some(QueuedRead::Error(message)) => Err(HidCommonError::ReadError(message)),
                None => Ok(None),
            }
        }

        fn device_info(&self) -> &HidDeviceInfo {
            &self.device.info
        }

        fn is_connected(&self) -> bool {
            self.check_live().is_ok()
        }

        fn close(&mut self) -> HidCommonResult<()> {
            self.release();
            Ok(())
        }
    }

    impl Drop for MockHidHandle {
        fn drop(&mut self) {
            self.release();
        }
    }

    #[derive(Default)]
    pub struct MockHidPort {
        devices: Vec<MockHidDevice>,
    }

    impl MockHidPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_device(&mut self, device: MockHidDevice) {
            self.devices.push(device);
        }

        pub fn device_count(&self) -> usize {
            self.devices.len()
        }
    }

    impl HidPort for MockHidPort {
        fn list_devices(&self) -> HidCommonResult<Vec<HidDeviceInfo>> {
            Ok(self
                .devices
                .iter()
                .filter(|d| d.state.connected.load(Ordering::SeqCst))
                .map(|d| d.info.clone())
                .collect())
        }

        fn open_device(&self, selector: &DeviceSelector) -> HidCommonResult<Box<dyn HidDevice>> {
            let device = self
                .devices
                .iter()
                .find(|d| selector.matches(&d.info))
                .ok_or_else(|| HidCommonError::DeviceNotFound(selector.to_string()))?;
            Ok(Box::new(device.open_handle()?))
        }
    }
}
