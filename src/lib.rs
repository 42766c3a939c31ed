//! simplets - a terminal-themed website engine in Rust, compiled to WASM
//!
//! A simulated command line for the browser: typed commands, animated
//! output, command history, inline menus and a synthetic blinking caret.
//! Components talk through a single-threaded event bus and reach the page
//! only through the platform traits, so the same engine runs in the
//! browser, in tests and on a native line terminal.
//!
//! Platform support:
//! - Browser (wasm32-unknown-unknown): DOM surface, `localStorage`
//! - Native: stdout surface, JSON settings file (`simplets-cli`)
//! - Memory: recording surface and manual clock (tests, headless use)

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod app;
pub mod commands;
pub mod config;
pub mod events;
pub mod logging;
pub mod platform;
pub mod settings;
pub mod terminal;

#[cfg(target_arch = "wasm32")]
mod boot;

#[cfg(target_arch = "wasm32")]
mod runtime;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Boot the terminal. This is the WASM entry point.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
    boot::boot();
}

/// Tear the terminal down (e.g. before a hot reload)
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn shutdown() {
    runtime::stop();
}
