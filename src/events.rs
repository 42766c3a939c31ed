//! Event bus
//!
//! A synchronous, single-threaded publish/subscribe hub. Components talk to
//! each other through string topics instead of holding references to one
//! another.
//!
//! - `emit` snapshots the subscriber list first, so handlers may subscribe
//!   or unsubscribe during dispatch without affecting the dispatch in flight
//! - a handler returning `Err` is logged and dispatch continues
//! - debug mode keeps a bounded rolling history of emitted events

use crate::terminal::core::{Direction, HistoryEntry};
use crate::terminal::registry::CommandSpec;
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Maximum number of events kept in the debug history
pub const MAX_EVENT_HISTORY: usize = 100;

/// Topic names
pub mod topics {
    pub const INPUT_SUBMIT: &str = "input:submit";
    pub const INPUT_CANCEL: &str = "input:cancel";
    pub const INPUT_CHANGED: &str = "input:changed";
    pub const COMMAND_PROCESS: &str = "command:process";
    pub const COMMAND_REGISTER: &str = "command:register";
    pub const COMMAND_REGISTERED: &str = "command:registered";
    pub const HISTORY_NAVIGATE: &str = "history:navigate";
    pub const HISTORY_ENTRY: &str = "history:entry";
    pub const MENU_ACTIVE: &str = "menu:active";
    pub const MENU_SELECTED: &str = "menu:selected";
    pub const MENU_CANCELLED: &str = "menu:cancelled";
    pub const CLEAR: &str = "terminal:clear";
    pub const PROMPT_CHANGED: &str = "prompt:changed";
    pub const LANGUAGE_CHANGED: &str = "language:changed";
    pub const THEME_CHANGED: &str = "theme:changed";
}

/// Data carried by an event
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Text(String),
    Flag(bool),
    Direction(Direction),
    History(HistoryEntry),
    Selection { value: String, index: usize },
    Register(CommandSpec),
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON rendering used by the debug history
    pub fn to_json(&self) -> Value {
        match self {
            Payload::None => Value::Null,
            Payload::Text(s) => json!(s),
            Payload::Flag(b) => json!(b),
            Payload::Direction(d) => json!(d),
            Payload::History(entry) => json!(entry),
            Payload::Selection { value, index } => json!({ "value": value, "index": index }),
            Payload::Register(spec) => json!({
                "name": spec.name,
                "category": spec.category,
                "hidden": spec.hidden,
            }),
        }
    }
}

/// Handler invoked for each matching event
pub type Handler = Rc<dyn Fn(&Payload) -> anyhow::Result<()>>;

struct Listener {
    id: u64,
    handler: Handler,
    once: bool,
}

/// Token returned by `on`/`once`, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// A recorded emission (debug mode only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub topic: String,
    pub payload: Value,
}

pub struct EventBus {
    listeners: RefCell<HashMap<String, Vec<Listener>>>,
    next_id: Cell<u64>,
    sequence: Cell<u64>,
    debug: Cell<bool>,
    history: RefCell<VecDeque<EventRecord>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            sequence: Cell::new(0),
            debug: Cell::new(false),
            history: RefCell::new(VecDeque::with_capacity(MAX_EVENT_HISTORY)),
        }
    }

    /// Subscribe to a topic
    pub fn on<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Payload) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(topic, Rc::new(handler), false)
    }

    /// Subscribe for a single delivery
    pub fn once<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Payload) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(topic, Rc::new(handler), true)
    }

    fn subscribe(&self, topic: &str, handler: Handler, once: bool) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut listeners = self.listeners.borrow_mut();
        let list = listeners.entry(topic.to_string()).or_default();
        list.push(Listener { id, handler, once });
        if self.debug.get() {
            tracing::debug!(topic, listeners = list.len(), "subscribed");
        }
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    /// Unsubscribe. Returns false if the subscription was already gone.
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.remove(&subscription.topic, subscription.id)
    }

    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(topic);
        }
        removed
    }

    /// Dispatch an event to every current subscriber, in subscription order.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, topic: &str, payload: Payload) -> usize {
        self.record(topic, &payload);

        let snapshot: Vec<(u64, Handler, bool)> = match self.listeners.borrow().get(topic) {
            Some(list) => list
                .iter()
                .map(|l| (l.id, Rc::clone(&l.handler), l.once))
                .collect(),
            None => {
                tracing::trace!(topic, "no listeners");
                return 0;
            }
        };

        for (id, handler, once) in &snapshot {
            if *once {
                self.remove(topic, *id);
            }
            if let Err(e) = handler(&payload) {
                tracing::error!(topic, "event handler failed: {:#}", e);
            }
        }
        snapshot.len()
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.borrow().get(topic).map_or(0, Vec::len)
    }

    /// Drop every subscription on every topic
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.debug.set(enabled);
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug.get()
    }

    fn record(&self, topic: &str, payload: &Payload) {
        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);
        if !self.debug.get() {
            return;
        }
        tracing::debug!(topic, sequence, "emit");
        let mut history = self.history.borrow_mut();
        history.push_back(EventRecord {
            sequence,
            topic: topic.to_string(),
            payload: payload.to_json(),
        });
        while history.len() > MAX_EVENT_HISTORY {
            history.pop_front();
        }
    }

    /// Recorded events, oldest first
    pub fn event_history(&self) -> Vec<EventRecord> {
        self.history.borrow().iter().cloned().collect()
    }

    pub fn clear_event_history(&self) {
        self.history.borrow_mut().clear();
    }

    /// Debug history as a JSON array
    pub fn export_history(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.event_history())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recorder(bus: &EventBus, topic: &str, tag: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Subscription {
        let log = Rc::clone(log);
        bus.on(topic, move |p| {
            log.borrow_mut()
                .push(format!("{}:{}", tag, p.as_text().unwrap_or("-")));
            Ok(())
        })
    }

    #[test]
    fn test_emit_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&bus, "t", "a", &log);
        recorder(&bus, "t", "b", &log);

        assert_eq!(bus.emit("t", Payload::text("x")), 2);
        assert_eq!(*log.borrow(), vec!["a:x", "b:x"]);
    }

    #[test]
    fn test_off_unsubscribes() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sub = recorder(&bus, "t", "a", &log);

        assert!(bus.off(&sub));
        assert!(!bus.off(&sub));
        assert_eq!(bus.emit("t", Payload::None), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.listener_count("t"), 0);
    }

    #[test]
    fn test_once_fires_once() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        bus.once("t", move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        bus.emit("t", Payload::None);
        bus.emit("t", Payload::None);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_failing_handler_does_not_abort_dispatch() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on("t", |_| anyhow::bail!("boom"));
        recorder(&bus, "t", "after", &log);

        bus.emit("t", Payload::text("x"));
        assert_eq!(*log.borrow(), vec!["after:x"]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_keeps_snapshot() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let bus2 = Rc::clone(&bus);
        let later2 = Rc::clone(&later);
        bus.on("t", move |_| {
            if let Some(sub) = later2.borrow().as_ref() {
                bus2.off(sub);
            }
            Ok(())
        });
        *later.borrow_mut() = Some(recorder(&bus, "t", "second", &log));

        // Removed mid-dispatch, but still part of this dispatch's snapshot
        bus.emit("t", Payload::text("1"));
        bus.emit("t", Payload::text("2"));
        assert_eq!(*log.borrow(), vec!["second:1"]);
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_emit() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let bus2 = Rc::clone(&bus);
        let log2 = Rc::clone(&log);
        bus.once("t", move |_| {
            recorder(&bus2, "t", "late", &log2);
            Ok(())
        });

        bus.emit("t", Payload::text("1"));
        assert!(log.borrow().is_empty());
        bus.emit("t", Payload::text("2"));
        assert_eq!(*log.borrow(), vec!["late:2"]);
    }

    #[test]
    fn test_debug_history_is_bounded() {
        let bus = EventBus::new();
        bus.emit("ignored", Payload::None);
        assert!(bus.event_history().is_empty());

        bus.set_debug_mode(true);
        for i in 0..(MAX_EVENT_HISTORY + 10) {
            bus.emit("t", Payload::text(i.to_string()));
        }
        let history = bus.event_history();
        assert_eq!(history.len(), MAX_EVENT_HISTORY);
        assert_eq!(history[0].payload, json!("10"));

        bus.clear_event_history();
        assert!(bus.event_history().is_empty());
    }

    #[test]
    fn test_export_history_json() {
        let bus = EventBus::new();
        bus.set_debug_mode(true);
        bus.emit(topics::MENU_ACTIVE, Payload::Flag(true));

        let exported = bus.export_history().unwrap();
        let parsed: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed[0]["topic"], json!("menu:active"));
        assert_eq!(parsed[0]["payload"], json!(true));
    }
}
