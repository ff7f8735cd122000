//! Live event monitoring

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use colored::*;
use racing_wheel_g29::{SessionError, WheelEvent};
use tracing::{info, warn};

use crate::commands::{SessionArgs, is_replay_end};
use crate::error::CliError;
use crate::output;

const POLL_TIMEOUT_MS: u32 = 50;

pub struct MonitorArgs<'a> {
    pub duration: Option<u64>,
    pub events: &'a [WheelEvent],
    pub leds_follow_gas: bool,
}

/// Print events until the duration elapses or the wheel goes away.
pub fn execute(args: &SessionArgs, monitor: &MonitorArgs<'_>, json: bool) -> Result<()> {
    let session = Arc::new(args.open_session()?);

    let watched: Vec<WheelEvent> = if monitor.events.is_empty() {
        WheelEvent::ALL.to_vec()
    } else {
        monitor.events.to_vec()
    };
    for event in watched {
        session.on(event, move |value| output::print_event(event, value, json));
    }

    if monitor.leds_follow_gas {
        let weak = Arc::downgrade(&session);
        session.on(WheelEvent::PedalsGas, move |level| {
            if let Some(session) = weak.upgrade() {
                if let Err(e) = session.leds(level) {
                    warn!(error = %e, "Failed to update LEDs");
                }
            }
        });
    }

    if !json {
        println!(
            "{} {} (Ctrl+C to stop)",
            "Monitoring".bold(),
            session.selector()
        );
    }

    let deadline = monitor
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let result = loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break Ok(());
        }
        match session.poll(POLL_TIMEOUT_MS) {
            Ok(_) => {}
            Err(SessionError::NotConnected) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    session.disconnect();

    match result {
        Err(e) if is_replay_end(args, &e) => {
            info!("Replay finished");
            Ok(())
        }
        other => other.map_err(|e| CliError::from(e).into()),
    }
}
