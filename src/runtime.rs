//! Browser runtime integration
//!
//! Bridges DOM events to the terminal:
//! - keyboard events go to the menu or the input handler
//! - focus, input and click events on the live input line drive the caret
//! - pointer down/up on the terminal tell clicks from drag-selections
//!
//! Listeners are delegated: one per event type on the terminal container
//! (or the document), installed once, so input lines come and go without
//! registering anything.

use crate::app::Terminal;
use crate::terminal::input::{KeyDisposition, KeyInput};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::prelude::*;
use web_sys::{Element, Event, EventTarget, KeyboardEvent, MouseEvent};

const INPUT_CLASS: &str = "terminal-input";

struct RuntimeState {
    terminal: Option<Rc<Terminal>>,
    running: bool,
}

thread_local! {
    static STATE: RefCell<RuntimeState> = const {
        RefCell::new(RuntimeState {
            terminal: None,
            running: false,
        })
    };
}

fn terminal() -> Option<Rc<Terminal>> {
    STATE.with(|state| state.borrow().terminal.clone())
}

/// Hand the terminal to the runtime and install the DOM listeners
pub fn start(terminal: Rc<Terminal>, container: &Element) {
    let (previous, already_running) = STATE.with(|state| {
        let mut state = state.borrow_mut();
        let previous = state.terminal.replace(Rc::clone(&terminal));
        (previous, std::mem::replace(&mut state.running, true))
    });
    if let Some(previous) = previous.filter(|p| !Rc::ptr_eq(p, &terminal)) {
        previous.dispose();
    }
    if already_running {
        tracing::debug!("runtime already running; terminal replaced");
        return;
    }
    setup_event_listeners(container);
}

/// Detach the terminal; listeners stay installed but go quiet
pub fn stop() {
    let terminal = STATE.with(|state| state.borrow_mut().terminal.take());
    if let Some(terminal) = terminal {
        terminal.dispose();
    }
    tracing::info!("runtime stopped");
}

fn listen<E>(target: &EventTarget, event: &str, handler: impl FnMut(E) + 'static)
where
    E: FromWasmAbi + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    if let Err(e) =
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
    {
        tracing::warn!(event, "failed to add listener: {:?}", e);
    }
    closure.forget(); // lives for the page lifetime
}

/// Did the event happen on the live input field?
fn on_input_field(event: &Event) -> bool {
    event
        .target()
        .and_then(|t| t.dyn_into::<Element>().ok())
        .is_some_and(|el| el.class_list().contains(INPUT_CLASS))
}

fn key_input(event: &KeyboardEvent) -> KeyInput {
    KeyInput {
        key: event.key(),
        ctrl: event.ctrl_key(),
        alt: event.alt_key(),
        shift: event.shift_key(),
        meta: event.meta_key(),
    }
}

fn setup_event_listeners(container: &Element) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        tracing::error!("no document; listeners not installed");
        return;
    };

    // Keys: menus own the keyboard wherever focus is
    listen(&document, "keydown", |event: KeyboardEvent| {
        let Some(terminal) = terminal() else { return };
        if !terminal.view.menu_active() && !on_input_field(&event) {
            return;
        }
        if terminal.handle_key(&key_input(&event)) == KeyDisposition::Handled {
            event.prevent_default();
        }
    });

    listen(container, "input", |event: Event| {
        if on_input_field(&event) {
            if let Some(terminal) = terminal() {
                terminal.view.input_changed();
            }
        }
    });

    listen(container, "focusin", |event: Event| {
        if on_input_field(&event) {
            if let Some(terminal) = terminal() {
                terminal.view.input_focused();
            }
        }
    });

    listen(container, "focusout", |event: Event| {
        if on_input_field(&event) {
            if let Some(terminal) = terminal() {
                terminal.view.input_blurred();
            }
        }
    });

    listen(container, "click", |event: MouseEvent| {
        if on_input_field(&event) {
            if let Some(terminal) = terminal() {
                terminal.view.input_clicked();
            }
        }
    });

    listen(container, "mousedown", |event: MouseEvent| {
        if let Some(terminal) = terminal() {
            terminal
                .view
                .pointer_down(f64::from(event.client_x()), f64::from(event.client_y()));
        }
    });

    listen(container, "mouseup", |event: MouseEvent| {
        if let Some(terminal) = terminal() {
            terminal
                .view
                .pointer_up(f64::from(event.client_x()), f64::from(event.client_y()));
        }
    });

    listen(&document, "selectionchange", |_event: Event| {
        if let Some(terminal) = terminal() {
            terminal.view.selection_changed();
        }
    });

    tracing::debug!("event listeners installed");
}
