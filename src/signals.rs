//! Signals received from VDR and the callbacks registered for them.
//!
//! Callbacks are keyed by signal member name (`Ready`, `Stop`, `AskUserSelect`, ...)
//! and run in the order they were registered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use zbus::message::Type as MessageType;
use zbus::Message;

/// Member names the lifecycle manager reacts to.
pub const READY: &str = "Ready";
pub const STOP: &str = "Stop";
pub const START: &str = "Start";

/// A signal sent by VDR, or synthesized locally when VDR vanished without `Stop`.
#[derive(Debug, Clone)]
pub struct VdrSignal {
    member: String,
    interface: Option<String>,
    path: Option<String>,
    sender: Option<String>,
    message: Option<Message>,
}

impl VdrSignal {
    /// A signal that did not come off the bus.
    pub fn synthetic(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            interface: None,
            path: None,
            sender: None,
            message: None,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Wrap a bus message. Returns `None` for anything but a signal with a member.
    pub fn from_message(message: &Message) -> Option<Self> {
        if message.message_type() != MessageType::Signal {
            return None;
        }
        let header = message.header();
        let member = header.member()?.to_string();
        Some(Self {
            member,
            interface: header.interface().map(|i| i.to_string()),
            path: header.path().map(|p| p.to_string()),
            sender: header.sender().map(|s| s.to_string()),
            message: Some(message.clone()),
        })
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Unique bus name of the sender.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// The original message, for decoding the signal body.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.message.is_none()
    }
}

pub type Callback = Arc<dyn Fn(&VdrSignal) + Send + Sync>;

/// A reserved position in the callback table.
type Slot = Arc<OnceLock<Callback>>;

/// Callbacks per signal member, in registration order.
#[derive(Clone, Default)]
pub struct CallbackTable {
    slots: Arc<Mutex<HashMap<String, Vec<Slot>>>>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Slot>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `callback` for signals named `member`.
    pub fn register<F>(&self, member: &str, callback: F)
    where
        F: Fn(&VdrSignal) + Send + Sync + 'static,
    {
        self.reserve(member).connect(callback);
    }

    /// Reserve a slot for `member` now and supply the callback later.
    ///
    /// The slot keeps its position relative to callbacks registered afterwards.
    pub fn reserve(&self, member: &str) -> PendingCallback {
        let slot: Slot = Arc::new(OnceLock::new());
        self.lock()
            .entry(member.to_string())
            .or_default()
            .push(slot.clone());
        PendingCallback {
            member: member.to_string(),
            slot,
        }
    }

    /// Number of slots registered for `member`, filled or not.
    pub fn count(&self, member: &str) -> usize {
        self.lock().get(member).map(Vec::len).unwrap_or(0)
    }

    /// Run every callback registered for the signal's member.
    ///
    /// The table is not locked while callbacks run, so a callback may register
    /// further callbacks.
    pub fn dispatch(&self, signal: &VdrSignal) -> usize {
        let callbacks: Vec<Callback> = self
            .lock()
            .get(signal.member())
            .map(|slots| slots.iter().filter_map(|s| s.get().cloned()).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(signal);
        }
        callbacks.len()
    }
}

/// A callback slot awaiting its callback.
pub struct PendingCallback {
    member: String,
    slot: Slot,
}

impl PendingCallback {
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Fill the slot.
    pub fn connect<F>(self, callback: F)
    where
        F: Fn(&VdrSignal) + Send + Sync + 'static,
    {
        let _ = self.slot.set(Arc::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |tag: &str| -> Callback {
            let log = log2.clone();
            let tag = tag.to_string();
            Arc::new(move |signal: &VdrSignal| {
                log.lock()
                    .unwrap()
                    .push(format!("{}:{}", tag, signal.member()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let table = CallbackTable::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        table.register("Ready", move |s| first(s));
        table.register("Ready", move |s| second(s));

        assert_eq!(table.dispatch(&VdrSignal::synthetic("Ready")), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first:Ready", "second:Ready"]);
    }

    #[test]
    fn test_dispatch_only_matching_member() {
        let table = CallbackTable::new();
        let (log, make) = recorder();
        let cb = make("stop");
        table.register("Stop", move |s| cb(s));

        assert_eq!(table.dispatch(&VdrSignal::synthetic("Start")), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deferred_registration_keeps_position() {
        let table = CallbackTable::new();
        let (log, make) = recorder();

        let pending = table.reserve("AskUserSelect");
        let direct = make("direct");
        table.register("AskUserSelect", move |s| direct(s));

        // Unfilled slots are skipped.
        table.dispatch(&VdrSignal::synthetic("AskUserSelect"));
        assert_eq!(*log.lock().unwrap(), vec!["direct:AskUserSelect"]);
        log.lock().unwrap().clear();

        let deferred = make("deferred");
        assert_eq!(pending.member(), "AskUserSelect");
        pending.connect(move |s| deferred(s));

        table.dispatch(&VdrSignal::synthetic("AskUserSelect"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["deferred:AskUserSelect", "direct:AskUserSelect"]
        );
        assert_eq!(table.count("AskUserSelect"), 2);
    }

    #[test]
    fn test_callback_may_register_during_dispatch() {
        let table = CallbackTable::new();
        let inner = table.clone();
        table.register("Ready", move |_| {
            inner.register("Ready", |_| {});
        });

        table.dispatch(&VdrSignal::synthetic("Ready"));
        assert_eq!(table.count("Ready"), 2);
    }

    #[test]
    fn test_synthetic_signal_metadata() {
        let signal = VdrSignal::synthetic("Stop")
            .with_interface("de.tvdr.vdr.vdr")
            .with_path("/vdr")
            .with_sender(":1.42");
        assert_eq!(signal.member(), "Stop");
        assert_eq!(signal.interface(), Some("de.tvdr.vdr.vdr"));
        assert_eq!(signal.path(), Some("/vdr"));
        assert_eq!(signal.sender(), Some(":1.42"));
        assert!(signal.is_synthetic());
        assert!(signal.message().is_none());
    }
}
