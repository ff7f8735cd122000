//! Connection lifecycle, input polling and output commands.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──init ok──▶ Connected
//!      ▲                          │                       │
//!      └──── error / disconnect ──┴──── disconnect / ─────┘
//!                                       transport error
//! ```
//!
//! All session state sits behind one mutex. The mutex is released before
//! any handler runs, so handlers may call back into the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use racing_wheel_hid_g29_protocol::{
    DecodeError, EncodeError, ForceCommand, InputDecoder, LOGITECH_VENDOR_ID, LedInput,
    LedPattern, OutputReport, RelayTransform, SignalSnapshot, WheelEvent, encode_autocenter,
    encode_force, encode_leds, encode_native_mode, encode_range, encode_relay, encode_relay_os,
    product_ids,
};
use racing_wheel_hid_transport::{DeviceSelector, HidCommonError, HidDevice, HidPort};
use tracing::{debug, info, trace, warn};

use crate::dispatch::{EventEmitter, HandlerId};
use crate::error::{SessionError, SessionResult};
use crate::options::SessionOptions;

/// Selector matching a G29 in either enumeration mode.
pub fn g29_selector() -> DeviceSelector {
    DeviceSelector::any_of(
        LOGITECH_VENDOR_ID,
        &[product_ids::G29_PS, product_ids::G29_COMPAT],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of one [`WheelSession::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No report arrived before the timeout.
    Idle,
    /// A report was decoded; this many signals changed.
    Dispatched(usize),
    /// A malformed report was discarded. The session stays connected.
    Dropped(DecodeError),
}

struct Connection {
    device: Box<dyn HidDevice>,
    decoder: InputDecoder,
    relay: RelayTransform,
    previous: Option<SignalSnapshot>,
    force: ForceCommand,
    leds: LedPattern,
}

struct Inner {
    state: SessionState,
    /// Bumped on every disconnect so an in-progress connect can tell it was
    /// cancelled.
    generation: u64,
    options: SessionOptions,
    connection: Option<Connection>,
}

enum ReadResult {
    Idle,
    Changes(Vec<(WheelEvent, f64)>),
    Dropped(DecodeError),
}

/// One wheel, its event handlers and its connection.
pub struct WheelSession {
    port: Arc<dyn HidPort>,
    selector: DeviceSelector,
    emitter: EventEmitter,
    open: AtomicBool,
    inner: Mutex<Inner>,
}

impl WheelSession {
    pub fn new(port: Arc<dyn HidPort>) -> Self {
        Self::with_selector(port, g29_selector())
    }

    pub fn with_selector(port: Arc<dyn HidPort>, selector: DeviceSelector) -> Self {
        Self {
            port,
            selector,
            emitter: EventEmitter::new(),
            open: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                generation: 0,
                options: SessionOptions::default(),
                connection: None,
            }),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Open the wheel and bring it to a known state: native mode, no force,
    /// autocenter per `options`, the configured rotation range (if any), LEDs
    /// off.
    ///
    /// On failure the device is closed again and the session is left
    /// `Disconnected`. A [`disconnect`](Self::disconnect) from another thread
    /// (or from a transport callback) while this runs yields `Cancelled`.
    pub fn connect(&self, options: SessionOptions) -> SessionResult<()> {
        options.validate()?;

        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Disconnected {
                return Err(SessionError::AlreadyConnected);
            }
            inner.state = SessionState::Connecting;
            inner.options = options.clone();
            inner.generation
        };

        let mut device = match self.port.open_device(&self.selector) {
            Ok(device) => device,
            Err(e) => {
                self.abort_connect(generation);
                return Err(match e {
                    HidCommonError::AlreadyOpen(_) => SessionError::AlreadyConnected,
                    other => SessionError::Transport(other),
                });
            }
        };
        let info = device.device_info().clone();
        info!(
            device = %info.display_name(),
            path = %info.path,
            product_id = format_args!("{:#06x}", info.product_id),
            "Opened wheel"
        );

        let relay = options.relay_transform();
        if let Err(e) = self.initialize(device.as_mut(), &options, relay, generation) {
            if let Err(close_err) = device.close() {
                warn!(error = %close_err, "Failed to close wheel after aborted connect");
            }
            self.abort_connect(generation);
            return Err(e);
        }

        let decoder = options.decoder();
        if options.range.is_some() {
            debug!(range = decoder.axis().range_degrees(), "Wheel range applied");
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != SessionState::Connecting {
            drop(inner);
            if let Err(close_err) = device.close() {
                warn!(error = %close_err, "Failed to close wheel after cancelled connect");
            }
            return Err(SessionError::Cancelled);
        }
        inner.connection = Some(Connection {
            device,
            decoder,
            relay,
            previous: None,
            force: ForceCommand::Off,
            leds: LedPattern::ALL_OFF,
        });
        inner.state = SessionState::Connected;
        self.open.store(true, Ordering::SeqCst);
        info!("Wheel connected");
        Ok(())
    }

    fn initialize(
        &self,
        device: &mut dyn HidDevice,
        options: &SessionOptions,
        relay: RelayTransform,
        generation: u64,
    ) -> SessionResult<()> {
        let mut frames = encode_native_mode().to_vec();
        frames.push(encode_force(ForceCommand::Off));
        frames.extend(encode_autocenter(options.autocenter));
        if let Some(range) = options.range {
            frames.push(encode_range(range));
        }
        frames.push(encode_leds(&LedPattern::ALL_OFF));

        for frame in frames {
            if !self.still_connecting(generation) {
                return Err(SessionError::Cancelled);
            }
            let report = relay.apply(&frame)?;
            write_complete(device, &report)?;
            log_written(&report, options.debug);
        }
        if self.still_connecting(generation) {
            Ok(())
        } else {
            Err(SessionError::Cancelled)
        }
    }

    fn still_connecting(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.generation == generation && inner.state == SessionState::Connecting
    }

    fn abort_connect(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == SessionState::Connecting {
            inner.state = SessionState::Disconnected;
        }
    }

    /// Close the device and stop event delivery. Safe to call repeatedly and
    /// from inside handlers; no handler runs after this returns.
    pub fn disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
        let connection = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Disconnected {
                return;
            }
            inner.state = SessionState::Disconnected;
            inner.generation = inner.generation.wrapping_add(1);
            inner.connection.take()
        };
        if let Some(mut connection) = connection {
            if let Err(e) = connection.device.close() {
                warn!(error = %e, "Error closing wheel");
            }
        }
        info!("Wheel disconnected");
    }

    // ── Input ───────────────────────────────────────────────────────────────

    /// Read at most one report and deliver its changes.
    ///
    /// A transport error disconnects the session and is returned.
    pub fn poll(&self, timeout_ms: u32) -> SessionResult<PollOutcome> {
        let (read, debug_enabled) = {
            let mut inner = self.inner.lock();
            let debug_enabled = inner.options.debug;
            let connection = inner
                .connection
                .as_mut()
                .ok_or(SessionError::NotConnected)?;
            (read_once(connection, timeout_ms, debug_enabled), debug_enabled)
        };

        match read {
            Err(e) => Err(self.fail(e)),
            Ok(ReadResult::Idle) => Ok(PollOutcome::Idle),
            Ok(ReadResult::Dropped(e)) => {
                warn!(error = %e, "Dropped malformed input report");
                Ok(PollOutcome::Dropped(e))
            }
            Ok(ReadResult::Changes(changes)) => {
                for &(event, value) in &changes {
                    if !self.open.load(Ordering::SeqCst) {
                        break;
                    }
                    if debug_enabled {
                        info!(event = %event, value, "Wheel event");
                    } else {
                        trace!(event = %event, value, "Wheel event");
                    }
                    self.emitter
                        .emit_while(event, value, || self.open.load(Ordering::SeqCst));
                }
                Ok(PollOutcome::Dispatched(changes.len()))
            }
        }
    }

    /// Poll until the session disconnects.
    ///
    /// Returns `Ok` after an explicit [`disconnect`](Self::disconnect) and
    /// the transport error otherwise.
    pub fn run(&self, timeout_ms: u32) -> SessionResult<()> {
        loop {
            match self.poll(timeout_ms) {
                Ok(_) => {}
                Err(SessionError::NotConnected) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// `None` means no force. 0.0 pulls full left, 1.0 full right.
    pub fn force_constant(&self, level: Option<f64>) -> SessionResult<()> {
        self.set_force(ForceCommand::constant(level))
    }

    /// `None` means no friction.
    pub fn force_friction(&self, level: Option<f64>) -> SessionResult<()> {
        self.set_force(ForceCommand::friction(level))
    }

    /// Stop every force effect. Autocenter keeps running.
    pub fn force_off(&self) -> SessionResult<()> {
        self.set_force(ForceCommand::Off)
    }

    fn set_force(&self, command: ForceCommand) -> SessionResult<()> {
        let frame = encode_force(command);
        self.send(
            |relay| relay.apply(&frame),
            |connection| connection.force = command,
        )
    }

    /// Light the rev LEDs from a level, a bit string or cell list.
    pub fn leds(&self, input: impl Into<LedInput>) -> SessionResult<()> {
        let pattern = LedPattern::from_input(&input.into())?;
        let frame = encode_leds(&pattern);
        self.send(
            |relay| relay.apply(&frame),
            |connection| connection.leds = pattern,
        )
    }

    /// Write `data` as-is.
    pub fn relay(&self, data: &[u8]) -> SessionResult<()> {
        self.send(|_| encode_relay(data), |_| {})
    }

    /// Write `data` after the host platform's framing is applied.
    pub fn relay_os(&self, data: &[u8]) -> SessionResult<()> {
        self.send(|relay| encode_relay_os(data, *relay), |_| {})
    }

    /// Encode under the lock, write one frame, then record the new state.
    fn send(
        &self,
        build: impl FnOnce(&RelayTransform) -> Result<OutputReport, EncodeError>,
        commit: impl FnOnce(&mut Connection),
    ) -> SessionResult<()> {
        let written = {
            let mut inner = self.inner.lock();
            let debug_enabled = inner.options.debug;
            let connection = inner
                .connection
                .as_mut()
                .ok_or(SessionError::NotConnected)?;
            let report = build(&connection.relay)?;
            write_complete(connection.device.as_mut(), &report).map(|()| {
                log_written(&report, debug_enabled);
                commit(connection);
            })
        };
        written.map_err(|e| self.fail(e))
    }

    fn fail(&self, err: HidCommonError) -> SessionError {
        if matches!(err, HidCommonError::Disconnected) {
            info!("Wheel went away; disconnecting");
        } else {
            warn!(error = %err, "Wheel transport failed; disconnecting");
        }
        self.disconnect();
        SessionError::Transport(err)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Last force command the wheel accepted, if connected.
    pub fn current_force(&self) -> Option<ForceCommand> {
        self.inner.lock().connection.as_ref().map(|c| c.force)
    }

    /// Last LED pattern the wheel accepted, if connected.
    pub fn current_leds(&self) -> Option<LedPattern> {
        self.inner.lock().connection.as_ref().map(|c| c.leds)
    }

    /// Options of the current or most recent connection.
    pub fn options(&self) -> SessionOptions {
        self.inner.lock().options.clone()
    }

    pub fn selector(&self) -> &DeviceSelector {
        &self.selector
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn on(&self, event: WheelEvent, handler: impl Fn(f64) + Send + Sync + 'static) -> HandlerId {
        self.emitter.on(event, handler)
    }

    pub fn once(
        &self,
        event: WheelEvent,
        handler: impl Fn(f64) + Send + Sync + 'static,
    ) -> HandlerId {
        self.emitter.once(event, handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.emitter.off(id)
    }
}

impl Drop for WheelSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_once(
    connection: &mut Connection,
    timeout_ms: u32,
    debug_enabled: bool,
) -> Result<ReadResult, HidCommonError> {
    let Some(raw) = connection.device.read_report(timeout_ms)? else {
        return Ok(ReadResult::Idle);
    };
    if debug_enabled {
        info!(bytes = ?raw, "Input report");
    } else {
        trace!(bytes = ?raw, "Input report");
    }

    let base = connection.previous.unwrap_or_default();
    match connection.decoder.decode(&raw, &base) {
        Ok(current) => {
            let changes = crate::dispatch::dispatch(connection.previous.as_ref(), &current);
            connection.previous = Some(current);
            Ok(ReadResult::Changes(changes))
        }
        Err(e) => Ok(ReadResult::Dropped(e)),
    }
}

fn log_written(report: &OutputReport, debug_enabled: bool) {
    if debug_enabled {
        info!(bytes = ?report.as_bytes(), "Wrote output report");
    } else {
        trace!(bytes = ?report.as_bytes(), "Wrote output report");
    }
}

fn write_complete(device: &mut dyn HidDevice, report: &OutputReport) -> Result<(), HidCommonError> {
    let expected = report.len();
    let written = device.write_report(report.as_bytes())?;
    if written == expected {
        Ok(())
    } else {
        Err(HidCommonError::WriteError(format!(
            "short write: {written} of {expected} bytes"
        )))
    }
}
