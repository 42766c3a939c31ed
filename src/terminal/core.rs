//! Terminal core - session state
//!
//! Holds the prompt, the greeting and the command history. History is
//! stored newest-first in a bounded ring buffer; only immediate repeats
//! collapse. A separate navigation cursor walks the buffer without
//! touching it.

use crate::events::{EventBus, Payload, Subscription, topics};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Default number of remembered commands
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// History navigation direction. Up goes back in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Result of a navigation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Command to show in the input; empty when back at the blank line
    pub command: String,
    /// Cursor position, `None` meaning "not navigating"
    pub index: Option<usize>,
}

/// Bounded, newest-first command history
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
    cursor: Option<usize>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            cursor: None,
        }
    }

    /// Record a submission. Returns false if it was blank or repeated the
    /// most recent entry. The navigation cursor is reset either way.
    pub fn record(&mut self, command: &str) -> bool {
        self.cursor = None;
        if command.trim().is_empty() {
            return false;
        }
        if self.entries.front().map(String::as_str) == Some(command) {
            return false;
        }
        self.entries.push_front(command.to_string());
        self.entries.truncate(self.capacity);
        true
    }

    /// Move the cursor and return what the input should show
    pub fn navigate(&mut self, direction: Direction) -> HistoryEntry {
        let last = self.entries.len().checked_sub(1);
        self.cursor = match (direction, self.cursor) {
            (Direction::Up, None) => last.map(|_| 0),
            (Direction::Up, Some(i)) => Some(last.map_or(i, |last| (i + 1).min(last))),
            (Direction::Down, Some(0)) | (Direction::Down, None) => None,
            (Direction::Down, Some(i)) => Some(i - 1),
        };
        HistoryEntry {
            command: self
                .cursor
                .and_then(|i| self.entries.get(i).cloned())
                .unwrap_or_default(),
            index: self.cursor,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Entries, most recent first
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct SessionState {
    prompt: String,
    greeting: String,
    history: History,
}

/// Session state shared by the controller and the view
pub struct TerminalCore {
    bus: Rc<EventBus>,
    state: RefCell<SessionState>,
}

impl TerminalCore {
    pub fn new(
        bus: Rc<EventBus>,
        prompt: impl Into<String>,
        greeting: impl Into<String>,
        history_size: usize,
    ) -> Self {
        Self {
            bus,
            state: RefCell::new(SessionState {
                prompt: prompt.into(),
                greeting: greeting.into(),
                history: History::new(history_size),
            }),
        }
    }

    /// Answer `history:navigate` requests with `history:entry`
    pub fn attach(self: &Rc<Self>) -> Subscription {
        let core: Weak<Self> = Rc::downgrade(self);
        self.bus.on(topics::HISTORY_NAVIGATE, move |payload| {
            if let (Some(core), Payload::Direction(direction)) = (core.upgrade(), payload) {
                core.navigate_history(*direction);
            }
            Ok(())
        })
    }

    /// Record the submission and hand it to whoever processes commands
    pub fn execute_command(&self, raw: &str) {
        if raw.trim().is_empty() {
            tracing::debug!("ignoring blank submission");
            return;
        }
        self.state.borrow_mut().history.record(raw);
        self.bus.emit(topics::COMMAND_PROCESS, Payload::text(raw));
    }

    /// Step through history and announce the result on `history:entry`
    pub fn navigate_history(&self, direction: Direction) -> HistoryEntry {
        let entry = self.state.borrow_mut().history.navigate(direction);
        self.bus
            .emit(topics::HISTORY_ENTRY, Payload::History(entry.clone()));
        entry
    }

    /// History, most recent first
    pub fn history(&self) -> Vec<String> {
        self.state
            .borrow()
            .history
            .entries()
            .map(str::to_string)
            .collect()
    }

    pub fn reset_navigation(&self) {
        self.state.borrow_mut().history.reset_cursor();
    }

    pub fn prompt(&self) -> String {
        self.state.borrow().prompt.clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.state.borrow_mut().prompt = prompt.clone();
        self.bus.emit(topics::PROMPT_CHANGED, Payload::Text(prompt));
    }

    pub fn greeting(&self) -> String {
        self.state.borrow().greeting.clone()
    }

    pub fn set_greeting(&self, greeting: impl Into<String>) {
        self.state.borrow_mut().greeting = greeting.into();
    }
}
