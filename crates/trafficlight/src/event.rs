//! Typed dispatch of decoded records.
//!
//! Records carry free-form event names on the wire. Only the kinds listed in
//! [`EventKind`] are dispatched; everything else is dropped before it reaches
//! a listener.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::StreamConfig;

/// Event kinds the stream dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The device reported a new status; data is the status payload.
    StatusChanged,
}

impl EventKind {
    /// Resolve a wire event name using the configured names.
    pub fn resolve(name: &str, config: &StreamConfig) -> Option<Self> {
        if name == config.status_event {
            Some(Self::StatusChanged)
        } else {
            None
        }
    }
}

/// Callback receiving the `data` of a dispatched record.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct BusState {
    listeners: HashMap<EventKind, Vec<Listener>>,
    closed: bool,
}

/// In-process publish/subscribe registry keyed by [`EventKind`].
///
/// Listeners run while the registry lock is held. This is what makes
/// [`EventBus::close`] a hard barrier: once it returns, no listener is running
/// and none will start. The flip side is that a listener must not call back
/// into the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    ///
    /// Returns `false` (and drops the listener) if the bus is already closed.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> bool
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state
            .listeners
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
        true
    }

    /// Deliver `data` to every listener of `kind`, in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn publish(&self, kind: EventKind, data: &str) -> usize {
        let state = self.state.lock();
        if state.closed {
            return 0;
        }
        let Some(listeners) = state.listeners.get(&kind) else {
            return 0;
        };
        for listener in listeners {
            listener(data);
        }
        listeners.len()
    }

    /// Unregister every listener and refuse further registrations.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.state.lock().listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventBus")
            .field(
                "listeners",
                &state
                    .listeners
                    .iter()
                    .map(|(kind, listeners)| (*kind, listeners.len()))
                    .collect::<Vec<_>>(),
            )
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_status_event() {
        let config = StreamConfig::default();
        assert_eq!(
            EventKind::resolve("status_changed", &config),
            Some(EventKind::StatusChanged)
        );
        assert_eq!(EventKind::resolve("spark/status", &config), None);

        let config = StreamConfig {
            status_event: "light".to_owned(),
            ..StreamConfig::default()
        };
        assert_eq!(
            EventKind::resolve("light", &config),
            Some(EventKind::StatusChanged)
        );
        assert_eq!(EventKind::resolve("status_changed", &config), None);
    }

    #[test]
    fn publish_reaches_listeners_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            assert!(bus.on(EventKind::StatusChanged, move |data| {
                seen.lock().push(format!("{tag}:{data}"));
            }));
        }

        assert_eq!(bus.publish(EventKind::StatusChanged, "1"), 2);
        assert_eq!(*seen.lock(), vec!["a:1".to_owned(), "b:1".to_owned()]);
    }

    #[test]
    fn publish_without_listeners_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(EventKind::StatusChanged, "1"), 0);
    }

    #[test]
    fn close_unregisters_and_rejects_new_listeners() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        bus.on(EventKind::StatusChanged, move |_| *counter.lock() += 1);
        assert_eq!(bus.listener_count(EventKind::StatusChanged), 1);

        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.listener_count(EventKind::StatusChanged), 0);
        assert_eq!(bus.publish(EventKind::StatusChanged, "1"), 0);
        assert!(!bus.on(EventKind::StatusChanged, |_| {}));
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn clones_share_registrations() {
        let bus = EventBus::new();
        let other = bus.clone();
        other.on(EventKind::StatusChanged, |_| {});
        assert_eq!(bus.listener_count(EventKind::StatusChanged), 1);

        bus.close();
        assert!(other.is_closed());
    }
}
