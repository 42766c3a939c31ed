//! Input handler
//!
//! Turns raw key events on the live input line into terminal events:
//! - Enter: `input:submit` with the trimmed value (blank input is dropped)
//! - ArrowUp / ArrowDown: `history:navigate`
//! - Ctrl+C: clear the field, `input:cancel`
//! - Ctrl+L: `terminal:clear`
//! - Tab: swallowed
//!
//! Also tells clicks from drag-selections for click-to-focus.

use super::core::{Direction, HistoryEntry};
use super::view::TerminalView;
use crate::events::{EventBus, Payload, Subscription, topics};
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// A key press as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInput {
    /// `KeyboardEvent.key` value, e.g. "a", "Enter", "ArrowUp"
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            ..Self::default()
        }
    }
}

/// Semantic meaning of a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    Navigate(Direction),
    Cancel,
    Clear,
    /// Tab; reserved for completion
    Complete,
    /// Moves the caret without changing the value
    MoveCaret,
    /// Anything the field handles natively
    Edit,
}

/// Whether the host should suppress the browser's default action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Handled,
    PassThrough,
}

/// Classify a key press
pub fn classify(key: &KeyInput) -> KeyAction {
    if key.ctrl && !key.alt && !key.meta {
        match key.key.to_ascii_lowercase().as_str() {
            "c" => return KeyAction::Cancel,
            "l" => return KeyAction::Clear,
            _ => {}
        }
    }
    match key.key.as_str() {
        "Enter" => KeyAction::Submit,
        "ArrowUp" => KeyAction::Navigate(Direction::Up),
        "ArrowDown" => KeyAction::Navigate(Direction::Down),
        "Tab" => KeyAction::Complete,
        "ArrowLeft" | "ArrowRight" | "Home" | "End" => KeyAction::MoveCaret,
        _ => KeyAction::Edit,
    }
}

pub struct InputHandler {
    bus: Rc<EventBus>,
    view: Rc<TerminalView>,
}

impl InputHandler {
    pub fn new(bus: Rc<EventBus>, view: Rc<TerminalView>) -> Self {
        Self { bus, view }
    }

    /// Put recalled history entries into the field
    pub fn attach(self: &Rc<Self>) -> Subscription {
        let handler: Weak<Self> = Rc::downgrade(self);
        self.bus.on(topics::HISTORY_ENTRY, move |payload| {
            if let (Some(handler), Payload::History(HistoryEntry { command, .. })) =
                (handler.upgrade(), payload)
            {
                handler.set_value(command);
            }
            Ok(())
        })
    }

    pub fn handle_key(&self, key: &KeyInput) -> KeyDisposition {
        if self.view.menu_active() {
            return KeyDisposition::Handled;
        }

        match classify(key) {
            KeyAction::Submit => {
                let value = self.view.input_value();
                self.view.set_input_value("");
                let command = value.trim();
                if !command.is_empty() {
                    self.bus.emit(topics::INPUT_SUBMIT, Payload::text(command));
                }
                KeyDisposition::Handled
            }
            KeyAction::Navigate(direction) => {
                self.bus
                    .emit(topics::HISTORY_NAVIGATE, Payload::Direction(direction));
                KeyDisposition::Handled
            }
            KeyAction::Cancel => {
                self.view.set_input_value("");
                self.bus.emit(topics::INPUT_CANCEL, Payload::None);
                KeyDisposition::Handled
            }
            KeyAction::Clear => {
                self.bus.emit(topics::CLEAR, Payload::None);
                KeyDisposition::Handled
            }
            KeyAction::Complete => KeyDisposition::Handled,
            KeyAction::MoveCaret => {
                self.view.cursor_key();
                KeyDisposition::PassThrough
            }
            KeyAction::Edit => KeyDisposition::PassThrough,
        }
    }

    /// Replace the field's value, e.g. with a history entry
    pub fn set_value(&self, value: &str) {
        self.view.set_input_value(value);
        self.bus.emit(topics::INPUT_CHANGED, Payload::text(value));
    }
}

/// How a pointer press ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerGesture {
    Click,
    Drag,
}

/// Separates clicks from drag-selections by pointer travel
#[derive(Debug)]
pub struct PointerTracker {
    threshold: f64,
    down: Cell<Option<(f64, f64)>>,
}

impl PointerTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            down: Cell::new(None),
        }
    }

    pub fn pointer_down(&self, x: f64, y: f64) {
        self.down.set(Some((x, y)));
    }

    /// None if there was no matching pointer-down
    pub fn pointer_up(&self, x: f64, y: f64) -> Option<PointerGesture> {
        let (x0, y0) = self.down.take()?;
        let moved = (x - x0).abs().max((y - y0).abs());
        Some(if moved < self.threshold {
            PointerGesture::Click
        } else {
            PointerGesture::Drag
        })
    }
}
