//! Change detection and event delivery.
//!
//! [`dispatch`] turns two consecutive snapshots into the ordered list of
//! signals that changed; [`EventEmitter`] delivers each change to the
//! handlers registered for that event.

use std::sync::Arc;

use parking_lot::Mutex;
use racing_wheel_hid_g29_protocol::{SignalSnapshot, WheelEvent};

/// Signals that differ between `previous` and `current`, in dispatch order.
///
/// With no previous snapshot every signal is returned once.
pub fn dispatch(
    previous: Option<&SignalSnapshot>,
    current: &SignalSnapshot,
) -> Vec<(WheelEvent, f64)> {
    current.changes_since(previous)
}

type Handler = Arc<dyn Fn(f64) + Send + Sync>;

/// Identifies one registration, for [`EventEmitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    event: WheelEvent,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl Registry {
    fn add(&mut self, event: WheelEvent, once: bool, handler: Handler) -> HandlerId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = HandlerId(self.next_id);
        self.registrations.push(Registration {
            id,
            event,
            once,
            handler,
        });
        id
    }

    fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }
}

/// Per-event handler registry. Clones share the same registry.
///
/// Handlers for one event run in registration order. Each emission works on
/// a snapshot of the handler list, so handlers may register or remove
/// handlers (including themselves) and the change applies from the next
/// emission on. The registry lock is never held while a handler runs.
#[derive(Clone, Default)]
pub struct EventEmitter {
    registry: Arc<Mutex<Registry>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` on every emission of `event`.
    pub fn on(&self, event: WheelEvent, handler: impl Fn(f64) + Send + Sync + 'static) -> HandlerId {
        self.registry.lock().add(event, false, Arc::new(handler))
    }

    /// Run `handler` on the next emission of `event` only.
    pub fn once(
        &self,
        event: WheelEvent,
        handler: impl Fn(f64) + Send + Sync + 'static,
    ) -> HandlerId {
        self.registry.lock().add(event, true, Arc::new(handler))
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub fn off(&self, id: HandlerId) -> bool {
        self.registry.lock().remove(id)
    }

    /// Remove every handler for `event`, or every handler at all.
    pub fn remove_all(&self, event: Option<WheelEvent>) {
        let mut registry = self.registry.lock();
        match event {
            Some(event) => registry.registrations.retain(|r| r.event != event),
            None => registry.registrations.clear(),
        }
    }

    pub fn listener_count(&self, event: WheelEvent) -> usize {
        self.registry
            .lock()
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Deliver `value` to the handlers of `event`. Returns how many ran.
    pub fn emit(&self, event: WheelEvent, value: f64) -> usize {
        self.emit_while(event, value, || true)
    }

    /// Like [`emit`](Self::emit), but `gate` is checked before each handler
    /// and delivery stops at the first `false`.
    ///
    /// A `once` handler is unregistered before its body runs; if another
    /// emission already claimed it, it is skipped.
    pub fn emit_while(&self, event: WheelEvent, value: f64, gate: impl Fn() -> bool) -> usize {
        let snapshot: Vec<Registration> = self
            .registry
            .lock()
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .cloned()
            .collect();

        let mut ran = 0usize;
        for registration in snapshot {
            if !gate() {
                break;
            }
            if registration.once && !self.registry.lock().remove(registration.id) {
                continue;
            }
            (registration.handler)(value);
            ran = ran.saturating_add(1);
        }
        ran
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.registry.lock().registrations.len())
            .finish()
    }
}
