//! Browser platform
//!
//! - [`DomSurface`]: the terminal rendered into ordinary DOM elements
//! - [`WebScheduler`]: `setTimeout`/`setInterval` and `spawn_local`
//! - [`LocalStore`]: preferences in `localStorage`
//! - page-level helpers: embedded JSON config, theme and language attributes

mod dom;

pub use dom::DomSurface;

use super::{KeyValueStore, PlatformError, PlatformResult, Scheduler, TimerId};
use crate::config::{Config, ConfigError};
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Id of the optional `<script type="application/json">` holding the config
pub const CONFIG_ELEMENT_ID: &str = "simplets-config";

pub(crate) fn window() -> PlatformResult<web_sys::Window> {
    web_sys::window().ok_or_else(|| PlatformError::InitFailed("no window object".into()))
}

pub(crate) fn document() -> PlatformResult<web_sys::Document> {
    window()?
        .document()
        .ok_or_else(|| PlatformError::InitFailed("no document".into()))
}

/// Best-effort text for a thrown JS value
pub(crate) fn js_error(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Read the embedded JSON config. A missing element means defaults.
pub fn read_config() -> Result<Config, ConfigError> {
    let text = document()
        .ok()
        .and_then(|doc| doc.get_element_by_id(CONFIG_ELEMENT_ID))
        .and_then(|el| el.text_content());
    match text {
        Some(json) if !json.trim().is_empty() => Config::from_json(&json),
        _ => Ok(Config::default()),
    }
}

/// Reflect the theme as `data-theme` on the document element
pub fn apply_theme(name: &str) -> PlatformResult<()> {
    set_root_attribute("data-theme", name)
}

/// Reflect the language as `lang` on the document element
pub fn apply_language(code: &str) -> PlatformResult<()> {
    set_root_attribute("lang", code)
}

fn set_root_attribute(name: &str, value: &str) -> PlatformResult<()> {
    let root = document()?
        .document_element()
        .ok_or_else(|| PlatformError::Render("no document element".into()))?;
    root.set_attribute(name, value)
        .map_err(|e| PlatformError::Render(js_error(e)))
}

// ===== Scheduler =====

#[derive(Clone, Copy)]
enum TimerKind {
    Timeout,
    Interval,
}

#[derive(Default)]
struct TimerTable {
    live: HashMap<i32, (TimerKind, Closure<dyn FnMut()>)>,
    /// Closures retired while possibly still on the JS stack
    retired: Vec<Closure<dyn FnMut()>>,
    purge_scheduled: bool,
}

/// Browser timers. Closures are kept alive until their timer fires or is
/// cleared, then dropped on a later microtask.
#[derive(Clone, Default)]
pub struct WebScheduler {
    timers: Rc<RefCell<TimerTable>>,
}

impl WebScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn retire(timers: &Rc<RefCell<TimerTable>>, id: i32) {
        let mut table = timers.borrow_mut();
        if let Some((_, closure)) = table.live.remove(&id) {
            table.retired.push(closure);
        }
        if table.purge_scheduled || table.retired.is_empty() {
            return;
        }
        table.purge_scheduled = true;
        let timers = Rc::clone(timers);
        wasm_bindgen_futures::spawn_local(async move {
            let retired = {
                let mut table = timers.borrow_mut();
                table.purge_scheduled = false;
                std::mem::take(&mut table.retired)
            };
            drop(retired);
        });
    }

    fn register(&self, id: i32, kind: TimerKind, closure: Closure<dyn FnMut()>) -> TimerId {
        self.timers.borrow_mut().live.insert(id, (kind, closure));
        TimerId(id)
    }
}

impl Scheduler for WebScheduler {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().is_some_and(|w| {
                w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32)
                    .is_ok()
            });
            if !scheduled {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        Box::pin(async move {
            let _ = JsFuture::from(promise).await;
        })
    }

    fn random(&self) -> f64 {
        js_sys::Math::random()
    }

    fn set_timeout(&self, ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        let slot = Rc::new(Cell::new(0));
        let timers = Rc::clone(&self.timers);
        let fired = Rc::clone(&slot);
        let closure = Closure::once(move || {
            WebScheduler::retire(&timers, fired.get());
            callback();
        });

        let id = window().and_then(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                ms as i32,
            )
            .map_err(|e| PlatformError::Render(js_error(e)))
        });
        match id {
            Ok(id) => {
                slot.set(id);
                self.register(id, TimerKind::Timeout, closure)
            }
            Err(e) => {
                tracing::error!("setTimeout failed: {}", e);
                TimerId(0)
            }
        }
    }

    fn set_interval(&self, ms: u32, callback: Box<dyn FnMut()>) -> TimerId {
        let closure = Closure::wrap(callback);
        let id = window().and_then(|w| {
            w.set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                ms as i32,
            )
            .map_err(|e| PlatformError::Render(js_error(e)))
        });
        match id {
            Ok(id) => self.register(id, TimerKind::Interval, closure),
            Err(e) => {
                tracing::error!("setInterval failed: {}", e);
                TimerId(0)
            }
        }
    }

    fn clear_timer(&self, id: TimerId) {
        let kind = self.timers.borrow().live.get(&id.0).map(|(kind, _)| *kind);
        let Some(kind) = kind else {
            return;
        };
        if let Some(window) = web_sys::window() {
            match kind {
                TimerKind::Timeout => window.clear_timeout_with_handle(id.0),
                TimerKind::Interval => window.clear_interval_with_handle(id.0),
            }
        }
        Self::retire(&self.timers, id.0);
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

// ===== Storage =====

/// `window.localStorage`, when the browser allows it
pub struct LocalStore {
    storage: Option<web_sys::Storage>,
}

impl LocalStore {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            tracing::warn!("localStorage unavailable; preferences will not persist");
        }
        Self { storage }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        storage
            .get_item(key)
            .map_err(|e| PlatformError::Storage(js_error(e)))
    }

    fn set(&self, key: &str, value: &str) -> PlatformResult<()> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| PlatformError::NotSupported("localStorage".into()))?;
        storage
            .set_item(key, value)
            .map_err(|e| PlatformError::Storage(js_error(e)))
    }
}
