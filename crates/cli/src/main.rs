//! g29ctl - Logitech G29 control CLI
//!
//! Monitors wheel, pedal and shifter events, drives force feedback and the
//! rev LEDs, and writes raw frames. Hardware access needs the `hidapi`
//! feature; `--replay` plays back a hid-capture file instead.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod completion;
mod error;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use racing_wheel_g29::WheelEvent;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::monitor::MonitorArgs;
use crate::commands::{ForceCommands, SessionArgs, parse_event, parse_hex_byte};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "g29ctl")]
#[command(about = "Logitech G29 control CLI - monitor inputs, drive force feedback and LEDs")]
#[command(version)]
#[command(long_about = "
g29ctl talks to a Logitech G29 racing wheel. It switches the wheel to native
mode, prints input events as they change, and sends force, LED and raw
output frames.

Use --replay FILE to run any command against a recorded hid-capture file.
Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List HID devices
    Devices {
        /// Include non-Logitech devices
        #[arg(long)]
        all: bool,
    },

    /// Print input events as they change
    Monitor {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Only print these events (e.g. pedals-gas,wheel-turn)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_event)]
        events: Vec<WheelEvent>,

        /// Drive the rev LEDs from the gas pedal
        #[arg(long)]
        leds_follow_gas: bool,
    },

    /// Set the rev LEDs; no value turns them off
    Leds {
        /// Fill level from 0.0 to 1.0
        #[arg(long, conflicts_with = "bits")]
        level: Option<f64>,

        /// Explicit pattern, e.g. 11100
        #[arg(long)]
        bits: Option<String>,
    },

    /// Play a force feedback effect
    Force {
        #[command(subcommand)]
        command: ForceCommands,

        /// Release the effect after this many milliseconds
        #[arg(long, global = true, default_value_t = 0)]
        hold_ms: u64,
    },

    /// Write raw bytes to the wheel
    Relay {
        /// Hex bytes, e.g. f8 12 1f 00 00 00 01
        #[arg(required = true, value_parser = parse_hex_byte)]
        bytes: Vec<u8>,

        /// Apply the platform's output framing first
        #[arg(long)]
        os: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&cli).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

/// Directives used when `RUST_LOG` is unset. Debug sessions log each frame
/// at info, so the session crate is raised to at least info for them.
fn default_log_filter(cli: &Cli) -> String {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let session_level = if cli.verbose == 0 && cli.session.debug_requested() {
        "info"
    } else {
        log_level
    };
    format!("g29ctl={log_level},racing_wheel_g29={session_level}")
}

fn execute_command(cli: &Cli) -> Result<()> {
    let session = &cli.session;
    match &cli.command {
        Commands::Devices { all } => commands::devices::execute(session, *all, cli.json),
        Commands::Monitor {
            duration,
            events,
            leds_follow_gas,
        } => {
            let monitor = MonitorArgs {
                duration: *duration,
                events,
                leds_follow_gas: *leds_follow_gas,
            };
            commands::monitor::execute(session, &monitor, cli.json)
        }
        Commands::Leds { level, bits } => {
            commands::control::leds(session, *level, bits.as_deref(), cli.json)
        }
        Commands::Force { command, hold_ms } => {
            commands::control::force(session, *command, *hold_ms, cli.json)
        }
        Commands::Relay { bytes, os } => commands::control::relay(session, bytes, *os, cli.json),
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}
