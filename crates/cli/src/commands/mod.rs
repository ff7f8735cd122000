//! Command implementations for g29ctl

pub mod control;
pub mod devices;
pub mod monitor;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand, ValueEnum};
use racing_wheel_g29::{Autocenter, Platform, SessionOptions, WheelEvent, WheelSession};
use racing_wheel_hid_transport::{HidCommonError, HidPort, ReplayPort};
use tracing::{debug, info};

use crate::error::CliError;

/// Options shared by every command that talks to a wheel.
#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Session options file (.yaml, .yml or .json)
    #[arg(long, global = true, env = "G29CTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Play back a hid-capture JSON file instead of opening hardware
    #[arg(long, global = true, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Honour capture timestamps during replay
    #[arg(long, global = true)]
    pub realtime: bool,

    /// Rotation range in degrees (40-900)
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(40..=900))]
    pub range: Option<u16>,

    /// Autocenter spring: on, off or STRENGTH,RATE
    #[arg(long, global = true, value_parser = parse_autocenter)]
    pub autocenter: Option<Autocenter>,

    /// Output framing to use instead of the host platform's
    #[arg(long, global = true, value_enum)]
    pub platform: Option<PlatformArg>,

    /// Log every frame at info level
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    Windows,
    Linux,
    Macos,
    Other,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Windows => Platform::Windows,
            PlatformArg::Linux => Platform::Linux,
            PlatformArg::Macos => Platform::Macos,
            PlatformArg::Other => Platform::Other,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
pub enum ForceCommands {
    /// Constant force: 0.0 pulls full left, 0.5 is neutral, 1.0 full right
    Constant { level: Option<f64> },
    /// Friction: 0.0 none, 1.0 strongest
    Friction { level: Option<f64> },
    /// Stop every force effect
    Off,
}

pub fn parse_autocenter(s: &str) -> Result<Autocenter, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "default" => return Ok(Autocenter::Default),
        "off" | "false" => return Ok(Autocenter::Off),
        _ => {}
    }
    let (strength, rate) = s
        .split_once(',')
        .ok_or_else(|| format!("expected on, off or STRENGTH,RATE, got '{s}'"))?;
    let strength: f64 = strength
        .trim()
        .parse()
        .map_err(|e| format!("invalid strength '{strength}': {e}"))?;
    let rate: f64 = rate
        .trim()
        .parse()
        .map_err(|e| format!("invalid rate '{rate}': {e}"))?;
    if !(0.0..=1.0).contains(&strength) || !(0.0..=1.0).contains(&rate) {
        return Err("strength and rate must be within 0.0..=1.0".to_string());
    }
    Ok(Autocenter::Custom { strength, rate })
}

pub fn parse_event(s: &str) -> Result<WheelEvent, String> {
    s.parse::<WheelEvent>().map_err(|e| e.to_string())
}

pub fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid byte '{s}': {e}"))
}

impl SessionArgs {
    /// Options file contents with command-line overrides applied.
    pub fn options(&self) -> Result<SessionOptions, CliError> {
        let mut options = match &self.config {
            Some(path) => SessionOptions::load(path)?,
            None => SessionOptions::default(),
        };
        if let Some(range) = self.range {
            options = options.with_range(range);
        }
        if let Some(autocenter) = self.autocenter {
            options = options.with_autocenter(autocenter);
        }
        if let Some(platform) = self.platform {
            options = options.with_platform(platform.into());
        }
        if self.debug {
            options = options.with_debug(true);
        }
        options.validate()?;
        Ok(options)
    }

    /// `--debug`, or `debug: true` in a readable options file.
    pub fn debug_requested(&self) -> bool {
        self.debug
            || self
                .config
                .as_ref()
                .is_some_and(|path| SessionOptions::load(path).is_ok_and(|o| o.debug))
    }

    pub fn is_replay(&self) -> bool {
        self.replay.is_some()
    }

    pub fn port(&self) -> Result<Arc<dyn HidPort>, CliError> {
        if let Some(path) = &self.replay {
            let port = ReplayPort::from_path(path)?.with_realtime(self.realtime);
            info!(path = %path.display(), frames = port.frame_count(), "Replaying capture");
            return Ok(Arc::new(port));
        }
        hardware_port()
    }

    /// Build a session and connect it.
    pub fn open_session(&self) -> Result<WheelSession, CliError> {
        let options = self.options()?;
        let session = WheelSession::new(self.port()?);
        debug!(selector = %session.selector(), "Connecting");
        session.connect(options)?;
        Ok(session)
    }
}

#[cfg(feature = "hidapi")]
fn hardware_port() -> Result<Arc<dyn HidPort>, CliError> {
    Ok(Arc::new(racing_wheel_hid_transport::HidApiPort::new()))
}

#[cfg(not(feature = "hidapi"))]
fn hardware_port() -> Result<Arc<dyn HidPort>, CliError> {
    Err(CliError::NoBackend)
}

/// End of a replayed capture reads as a disconnect; that is a clean finish.
pub fn is_replay_end(args: &SessionArgs, err: &racing_wheel_g29::SessionError) -> bool {
    args.is_replay()
        && matches!(
            err,
            racing_wheel_g29::SessionError::Transport(HidCommonError::Disconnected)
        )
}
