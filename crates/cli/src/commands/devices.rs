//! Device enumeration

use anyhow::Result;
use racing_wheel_hid_g29_protocol::LOGITECH_VENDOR_ID;
use tracing::debug;

use crate::commands::SessionArgs;
use crate::error::CliError;
use crate::output;

/// List HID devices, Logitech only unless `all` is set.
pub fn execute(args: &SessionArgs, all: bool, json: bool) -> Result<()> {
    let port = args.port()?;
    let devices = port.list_devices().map_err(CliError::from)?;
    debug!(count = devices.len(), "Enumerated HID devices");

    let shown: Vec<_> = devices
        .into_iter()
        .filter(|d| all || d.vendor_id == LOGITECH_VENDOR_ID)
        .collect();
    output::print_device_list(&shown, json);
    Ok(())
}
