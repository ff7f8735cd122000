//! End-to-end session behavior against the in-memory mock transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use racing_wheel_g29::{
    Autocenter, ForceCommand, LedPattern, Platform, PollOutcome, SessionError, SessionOptions,
    SessionState, WheelEvent, WheelSession,
};
use racing_wheel_hid_g29_protocol::{LOGITECH_VENDOR_ID, encode_force, encode_leds, product_ids};
use racing_wheel_hid_transport::HidCommonError;
use racing_wheel_hid_transport::mock::{MockHidDevice, MockHidPort, WriteFault};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const IDLE: [u8; 12] = [
    0x08, 0x00, 0x00, 0x00, 0xFF, 0x7F, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00,
];

fn with_gas(raw: u8) -> Vec<u8> {
    let mut report = IDLE.to_vec();
    report[6] = raw;
    report
}

fn linux() -> SessionOptions {
    SessionOptions::default().with_platform(Platform::Linux)
}

fn rig() -> (MockHidDevice, Arc<WheelSession>) {
    let device = MockHidDevice::new(LOGITECH_VENDOR_ID, product_ids::G29_PS, "/dev/hidraw0");
    let mut port = MockHidPort::new();
    port.add_device(device.clone());
    (device, Arc::new(WheelSession::new(Arc::new(port))))
}

fn connected_rig() -> Result<(MockHidDevice, Arc<WheelSession>), SessionError> {
    let (device, session) = rig();
    session.connect(linux())?;
    device.clear_write_history();
    Ok((device, session))
}

fn counter(session: &WheelSession, event: WheelEvent) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    session.on(event, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

// ── Connect ──────────────────────────────────────────────────────────────────

#[test]
fn connect_writes_init_sequence() -> TestResult {
    let (device, session) = rig();
    session.connect(linux())?;

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(
        device.get_write_history(),
        vec![
            vec![0xF8, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0xF8, 0x09, 0x05, 0x01, 0x01, 0x00, 0x00],
            vec![0x11, 0x08, 0x80, 0x80, 0x00, 0x00, 0x00],
            vec![0xFE, 0x0D, 0x07, 0x07, 0xFF, 0x00, 0x00],
            vec![0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0xF8, 0x12, 0x00, 0x00, 0x00, 0x00, 0x01],
        ]
    );
    assert_eq!(session.current_force(), Some(ForceCommand::Off));
    assert_eq!(session.current_leds(), Some(LedPattern::ALL_OFF));
    Ok(())
}

#[test]
fn connect_sends_configured_range_before_leds() -> TestResult {
    let (device, session) = rig();
    session.connect(linux().with_range(540))?;

    assert_eq!(
        device.get_write_history(),
        vec![
            vec![0xF8, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0xF8, 0x09, 0x05, 0x01, 0x01, 0x00, 0x00],
            vec![0x11, 0x08, 0x80, 0x80, 0x00, 0x00, 0x00],
            vec![0xFE, 0x0D, 0x07, 0x07, 0xFF, 0x00, 0x00],
            vec![0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0xF8, 0x81, 0x1C, 0x02, 0x00, 0x00, 0x00],
            vec![0xF8, 0x12, 0x00, 0x00, 0x00, 0x00, 0x01],
        ]
    );
    Ok(())
}

#[test]
fn connect_with_autocenter_off_and_windows_framing() -> TestResult {
    let (device, session) = rig();
    session.connect(
        SessionOptions::default()
            .with_platform(Platform::Windows)
            .with_autocenter(Autocenter::Off),
    )?;

    let history = device.get_write_history();
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|frame| frame.first() == Some(&0x00) && frame.len() == 8));
    assert_eq!(history[3], vec![0x00, 0xF5, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    Ok(())
}

#[test]
fn connect_twice_is_refused() -> TestResult {
    let (_device, session) = connected_rig()?;
    assert!(matches!(
        session.connect(linux()),
        Err(SessionError::AlreadyConnected)
    ));
    assert!(session.is_connected());
    Ok(())
}

#[test]
fn second_session_cannot_claim_the_device() -> TestResult {
    let device = MockHidDevice::new(LOGITECH_VENDOR_ID, product_ids::G29_PS, "/dev/hidraw0");
    let mut port = MockHidPort::new();
    port.add_device(device.clone());
    let port = Arc::new(port);

    let first = WheelSession::new(port.clone());
    let second = WheelSession::new(port);
    first.connect(linux())?;

    assert!(matches!(
        second.connect(linux()),
        Err(SessionError::AlreadyConnected)
    ));
    assert_eq!(second.state(), SessionState::Disconnected);
    assert!(first.is_connected());

    first.disconnect();
    second.connect(linux())?;
    assert!(second.is_connected());
    Ok(())
}

#[test]
fn connect_without_device_fails_cleanly() {
    let session = WheelSession::new(Arc::new(MockHidPort::new()));
    let err = session.connect(linux());
    assert!(matches!(
        err,
        Err(SessionError::Transport(HidCommonError::DeviceNotFound(_)))
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn failed_init_write_closes_the_device() -> TestResult {
    let (device, session) = rig();
    device.fail_next_write(WriteFault::Error);

    let err = session.connect(linux());
    assert!(matches!(err, Err(SessionError::Transport(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!device.is_claimed());

    session.connect(linux())?;
    assert!(session.is_connected());
    Ok(())
}

#[test]
fn disconnect_during_connect_cancels() -> TestResult {
    let (device, session) = rig();
    let weak: Weak<WheelSession> = Arc::downgrade(&session);
    let fired = Arc::new(AtomicBool::new(false));
    let f = Arc::clone(&fired);
    device.set_write_hook(move |_| {
        if !f.swap(true, Ordering::SeqCst) {
            if let Some(session) = weak.upgrade() {
                assert_eq!(session.state(), SessionState::Connecting);
                session.disconnect();
            }
        }
    });

    let err = session.connect(linux());
    assert!(matches!(err, Err(SessionError::Cancelled)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!device.is_claimed());
    assert_eq!(device.get_write_history().len(), 1);
    Ok(())
}

// ── Input dispatch ───────────────────────────────────────────────────────────

#[test]
fn first_report_emits_every_signal_once() -> TestResult {
    let (device, session) = connected_rig()?;
    let total = Arc::new(AtomicUsize::new(0));
    for event in WheelEvent::ALL {
        let t = Arc::clone(&total);
        session.on(event, move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
    }

    device.queue_read(IDLE.to_vec());
    assert_eq!(session.poll(10)?, PollOutcome::Dispatched(WheelEvent::COUNT));
    assert_eq!(total.load(Ordering::SeqCst), WheelEvent::COUNT);

    device.queue_read(IDLE.to_vec());
    assert_eq!(session.poll(10)?, PollOutcome::Dispatched(0));
    assert_eq!(total.load(Ordering::SeqCst), WheelEvent::COUNT);
    Ok(())
}

#[test]
fn events_arrive_in_dispatch_order_with_values() -> TestResult {
    let (device, session) = connected_rig()?;
    device.queue_read(IDLE.to_vec());
    session.poll(10)?;

    let log = Arc::new(Mutex::new(Vec::new()));
    for event in [WheelEvent::PedalsGas, WheelEvent::ButtonX, WheelEvent::ShiftRight] {
        let l = Arc::clone(&log);
        session.on(event, move |v| l.lock().push((event, v)));
    }

    let mut report = with_gas(0x00);
    report[0] = 0x18;
    report[1] = 0x01;
    device.queue_read(report);
    assert_eq!(session.poll(10)?, PollOutcome::Dispatched(3));
    assert_eq!(
        *log.lock(),
        vec![
            (WheelEvent::ShiftRight, 1.0),
            (WheelEvent::ButtonX, 1.0),
            (WheelEvent::PedalsGas, 1.0),
        ]
    );
    Ok(())
}

#[test]
fn once_handler_fires_once_across_reports() -> TestResult {
    let (device, session) = connected_rig()?;
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    session.once(WheelEvent::PedalsGas, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    device.queue_read(with_gas(0x80));
    device.queue_read(with_gas(0x00));
    session.poll(10)?;
    session.poll(10)?;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn off_removes_a_handler() -> TestResult {
    let (device, session) = connected_rig()?;
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let id = session.on(WheelEvent::PedalsGas, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    assert!(session.off(id));

    device.queue_read(with_gas(0x00));
    session.poll(10)?;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn malformed_report_is_dropped_and_session_continues() -> TestResult {
    let (device, session) = connected_rig()?;
    let gas = counter(&session, WheelEvent::PedalsGas);

    device.queue_read(Vec::new());
    device.queue_read(vec![0u8; 13]);
    device.queue_read(with_gas(0x00));

    assert!(matches!(session.poll(10)?, PollOutcome::Dropped(_)));
    assert!(matches!(session.poll(10)?, PollOutcome::Dropped(_)));
    assert!(session.is_connected());
    assert_eq!(session.poll(10)?, PollOutcome::Dispatched(WheelEvent::COUNT));
    assert_eq!(gas.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn poll_without_data_is_idle() -> TestResult {
    let (_device, session) = connected_rig()?;
    assert_eq!(session.poll(1)?, PollOutcome::Idle);
    Ok(())
}

#[test]
fn read_error_forces_disconnect() -> TestResult {
    let (device, session) = connected_rig()?;
    device.queue_read_error("device removed");

    let err = session.poll(10);
    let Err(err) = err else {
        return Err("read error was swallowed".into());
    };
    assert!(err.is_terminal());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!device.is_claimed());
    Ok(())
}

#[test]
fn handlers_may_call_back_into_the_session() -> TestResult {
    let (device, session) = connected_rig()?;
    let weak = Arc::downgrade(&session);
    session.on(WheelEvent::PedalsGas, move |level| {
        if let Some(session) = weak.upgrade() {
            let _ = session.leds(level);
        }
    });

    device.queue_read(with_gas(0x00));
    session.poll(10)?;
    assert_eq!(session.current_leds(), Some(LedPattern::ALL_ON));
    assert_eq!(
        device.get_write_history().last(),
        Some(&encode_leds(&LedPattern::ALL_ON).to_vec())
    );
    Ok(())
}

// ── Disconnect ───────────────────────────────────────────────────────────────

#[test]
fn double_disconnect_is_a_noop_and_silences_handlers() -> TestResult {
    let (device, session) = connected_rig()?;
    let gas = counter(&session, WheelEvent::PedalsGas);

    session.disconnect();
    session.disconnect();
    assert_eq!(session.state(), SessionState::Disconnected);

    device.queue_read(with_gas(0x00));
    assert!(matches!(session.poll(10), Err(SessionError::NotConnected)));
    assert_eq!(gas.load(Ordering::SeqCst), 0);
    assert_eq!(device.pending_reads(), 1);
    Ok(())
}

#[test]
fn disconnect_inside_handler_stops_the_current_dispatch() -> TestResult {
    let (device, session) = connected_rig()?;
    let weak = Arc::downgrade(&session);
    session.on(WheelEvent::ShiftLeft, move |_| {
        if let Some(session) = weak.upgrade() {
            session.disconnect();
        }
    });
    let late_same_event = counter(&session, WheelEvent::ShiftLeft);
    let gas = counter(&session, WheelEvent::PedalsGas);

    device.queue_read(with_gas(0x00));
    session.poll(10)?;
    assert_eq!(late_same_event.load(Ordering::SeqCst), 0);
    assert_eq!(gas.load(Ordering::SeqCst), 0);
    assert!(!session.is_connected());
    Ok(())
}

#[test]
fn run_stops_on_disconnect_and_reports_transport_loss() -> TestResult {
    let (device, session) = connected_rig()?;
    let weak = Arc::downgrade(&session);
    session.on(WheelEvent::PedalsGas, move |level| {
        if level > 0.9 {
            if let Some(session) = weak.upgrade() {
                session.disconnect();
            }
        }
    });
    device.queue_read(with_gas(0x80));
    device.queue_read(with_gas(0x00));
    session.run(1)?;
    assert_eq!(device.pending_reads(), 0);

    session.connect(linux())?;
    device.disconnect();
    let err = session.run(1);
    assert!(matches!(
        err,
        Err(SessionError::Transport(HidCommonError::Disconnected))
    ));
    Ok(())
}

#[test]
fn reconnect_uses_new_options() -> TestResult {
    let (device, session) = connected_rig()?;
    session.disconnect();
    session.connect(linux().with_range(450).with_debug(true))?;
    assert_eq!(session.options().range, Some(450));
    assert!(
        device
            .get_write_history()
            .contains(&vec![0xF8, 0x81, 0xC2, 0x01, 0x00, 0x00, 0x00])
    );

    let wheel = Arc::new(Mutex::new(None));
    let w = Arc::clone(&wheel);
    session.on(WheelEvent::WheelTurn, move |v| *w.lock() = Some(v));

    // The wheel applies the range itself, so raw positions are not rescaled.
    let mut report = IDLE.to_vec();
    report[4] = 0xFF;
    report[5] = 0xBF;
    device.queue_read(report);
    session.poll(10)?;
    let value = wheel.lock().ok_or("wheel-turn not emitted")?;
    assert!((value - 0.75).abs() < 1e-3, "got {value}");
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────────────

#[test]
fn commands_while_disconnected_write_nothing() {
    let (device, session) = rig();
    assert!(matches!(
        session.force_constant(Some(0.2)),
        Err(SessionError::NotConnected)
    ));
    assert!(matches!(
        session.force_friction(None),
        Err(SessionError::NotConnected)
    ));
    assert!(matches!(session.force_off(), Err(SessionError::NotConnected)));
    assert!(matches!(session.leds("111"), Err(SessionError::NotConnected)));
    assert!(matches!(session.relay(&[0xF8]), Err(SessionError::NotConnected)));
    assert!(matches!(
        session.relay_os(&[0xF8]),
        Err(SessionError::NotConnected)
    ));
    assert!(device.get_write_history().is_empty());
    assert_eq!(session.current_force(), None);
}

#[test]
fn constant_midpoint_writes_the_off_frame() -> TestResult {
    let (device, session) = connected_rig()?;
    session.force_constant(Some(0.5))?;
    session.force_off()?;
    session.force_constant(None)?;
    let history = device.get_write_history();
    let off = encode_force(ForceCommand::Off).to_vec();
    assert_eq!(history, vec![off.clone(), off.clone(), off]);
    Ok(())
}

#[test]
fn friction_then_off_leaves_leds_alone() -> TestResult {
    let (device, session) = connected_rig()?;
    session.leds("111")?;
    session.force_friction(Some(1.0))?;
    assert_eq!(session.current_force(), Some(ForceCommand::Friction(1.0)));

    session.force_off()?;
    assert_eq!(session.current_force(), Some(ForceCommand::Off));
    assert_eq!(session.current_leds(), Some(LedPattern::from_bits("111")?));
    assert_eq!(
        device.get_write_history(),
        vec![
            vec![0xF8, 0x12, 0x07, 0x00, 0x00, 0x00, 0x01],
            vec![0x11, 0x02, 0x07, 0x00, 0x07, 0x00, 0x00],
            vec![0x11, 0x08, 0x80, 0x80, 0x00, 0x00, 0x00],
        ]
    );
    Ok(())
}

#[test]
fn led_inputs_normalize() -> TestResult {
    let (device, session) = connected_rig()?;
    session.leds(0.45)?;
    assert_eq!(
        session.current_leds().map(|p| p.cells()),
        Some([true, true, true, false, false])
    );

    let off = encode_leds(&LedPattern::ALL_OFF).to_vec();
    device.clear_write_history();
    session.leds("")?;
    session.leds(Vec::<bool>::new())?;
    session.leds(0.0)?;
    session.leds(None::<f64>)?;
    assert_eq!(device.get_write_history(), vec![off; 4]);
    assert_eq!(session.current_leds(), Some(LedPattern::ALL_OFF));

    session.leds([0u8, 0, 0, 0, 1])?;
    assert_eq!(session.current_leds(), Some(LedPattern::from_bits("00001")?));
    Ok(())
}

#[test]
fn invalid_led_input_writes_nothing() -> TestResult {
    let (device, session) = connected_rig()?;
    session.leds("1")?;
    device.clear_write_history();

    assert!(matches!(session.leds("12"), Err(SessionError::Encode(_))));
    assert!(matches!(session.leds("111111"), Err(SessionError::Encode(_))));
    assert!(device.get_write_history().is_empty());
    assert!(session.is_connected());
    assert_eq!(session.current_leds(), Some(LedPattern::from_bits("1")?));
    Ok(())
}

#[test]
fn relay_and_relay_os_framing() -> TestResult {
    let device = MockHidDevice::new(LOGITECH_VENDOR_ID, product_ids::G29_PS, "/dev/hidraw0");
    let mut port = MockHidPort::new();
    port.add_device(device.clone());
    let session = WheelSession::new(Arc::new(port));
    session.connect(SessionOptions::default().with_platform(Platform::Windows))?;
    device.clear_write_history();

    let all_on = [0xF8, 0x12, 0x1F, 0x00, 0x00, 0x00, 0x01];
    session.relay_os(&all_on)?;
    session.relay(&[0x00, 0xF8, 0x12, 0x1F, 0x00, 0x00, 0x00, 0x01])?;
    let history = device.get_write_history();
    assert_eq!(history[0], history[1]);
    assert_eq!(history[0].len(), 8);

    assert!(matches!(session.relay(&[]), Err(SessionError::Encode(_))));
    assert!(matches!(
        session.relay(&[0u8; 65]),
        Err(SessionError::Encode(_))
    ));
    assert_eq!(device.get_write_history().len(), 2);
    assert!(session.is_connected());
    Ok(())
}

#[test]
fn write_failures_force_disconnect() -> TestResult {
    let (device, session) = connected_rig()?;
    device.fail_next_write(WriteFault::Short);
    let err = session.force_constant(Some(0.0));
    assert!(matches!(err, Err(SessionError::Transport(HidCommonError::WriteError(_)))));
    assert!(!session.is_connected());
    assert_eq!(session.current_force(), None);

    session.connect(linux())?;
    device.fail_next_write(WriteFault::Error);
    assert!(session.leds(1.0).is_err());
    assert!(!session.is_connected());
    Ok(())
}

#[test]
fn commands_from_another_thread_interleave_with_polling() -> TestResult {
    let (device, session) = connected_rig()?;
    let writer = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            for i in 0..50u32 {
                session.leds(f64::from(i) / 50.0)?;
            }
            Ok::<(), SessionError>(())
        })
    };
    for _ in 0..50 {
        device.queue_read(with_gas(0x40));
        session.poll(1)?;
    }
    writer.join().map_err(|_| "writer thread panicked")??;
    assert_eq!(device.get_write_history().len(), 50);
    assert!(session.is_connected());
    Ok(())
}
