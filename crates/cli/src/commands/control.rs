//! One-shot output commands: force, LEDs and raw relay

use std::thread;
use std::time::Duration;

use anyhow::Result;
use racing_wheel_g29::{ForceCommand, LedInput, LedPattern, WheelSession};
use racing_wheel_hid_g29_protocol::{encode_force, encode_relay, encode_relay_os};
use tracing::info;

use crate::commands::{ForceCommands, SessionArgs};
use crate::error::CliError;
use crate::output;

/// Light the rev LEDs from a level or a bit string.
pub fn leds(args: &SessionArgs, level: Option<f64>, bits: Option<&str>, json: bool) -> Result<()> {
    let input = match (level, bits) {
        (Some(level), _) => LedInput::from(level),
        (None, Some(bits)) => LedInput::from(bits),
        (None, None) => LedInput::Off,
    };
    let pattern = LedPattern::from_input(&input)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    with_session(args, |session| session.leds(pattern.cells()))?;
    output::print_leds(pattern, json);
    Ok(())
}

/// Play a force effect, optionally holding it before releasing.
pub fn force(args: &SessionArgs, command: ForceCommands, hold_ms: u64, json: bool) -> Result<()> {
    let command = match command {
        ForceCommands::Constant { level } => ForceCommand::constant(level),
        ForceCommands::Friction { level } => ForceCommand::friction(level),
        ForceCommands::Off => ForceCommand::Off,
    };

    let transform = args.options()?.relay_transform();
    let frame = transform
        .apply(&encode_force(command))
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    with_session(args, |session| {
        match command {
            ForceCommand::Constant(level) => session.force_constant(Some(level))?,
            ForceCommand::Friction(level) => session.force_friction(Some(level))?,
            ForceCommand::Off => session.force_off()?,
        }
        if hold_ms > 0 && !command.is_neutral() {
            info!(hold_ms, "Holding force");
            thread::sleep(Duration::from_millis(hold_ms));
            session.force_off()?;
        }
        Ok(())
    })?;

    output::print_frames(&format!("force {command:?}"), &[frame.into_vec()], json);
    Ok(())
}

/// Write raw bytes, as-is or with the platform framing applied.
pub fn relay(args: &SessionArgs, bytes: &[u8], os: bool, json: bool) -> Result<()> {
    let frame = if os {
        encode_relay_os(bytes, args.options()?.relay_transform())
    } else {
        encode_relay(bytes)
    }
    .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    with_session(args, |session| {
        if os {
            session.relay_os(bytes)
        } else {
            session.relay(bytes)
        }
    })?;

    let action = if os { "relay (os framing)" } else { "relay" };
    output::print_frames(action, &[frame.into_vec()], json);
    Ok(())
}

/// Connect, run `f`, then disconnect whatever `f` returned.
fn with_session(
    args: &SessionArgs,
    f: impl FnOnce(&WheelSession) -> Result<(), racing_wheel_g29::SessionError>,
) -> Result<(), CliError> {
    let session = args.open_session()?;
    let result = f(&session);
    session.disconnect();
    result.map_err(CliError::from)
}
