//! Cursor synchronizer
//!
//! Keeps a synthetic caret glyph in step with the native caret of the live
//! input field. The native caret is hidden by the surface; this module
//! decides where the glyph sits and whether it is drawn.
//!
//! States:
//! - `Blinking`: focused, no selection. Glyph toggles every blink period.
//! - `Selecting`: focused with a non-empty selection. Glyph hidden.
//! - `Blurred`: not focused. Glyph hidden, no blink timer.
//!
//! Keystrokes resync immediately and skip one blink toggle. Clicks and
//! caret-moving keys resync on a zero-delay timer, after the browser has
//! applied the new selection.

use crate::platform::{CaretView, Scheduler, Surface, TimerId};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretMode {
    Blinking,
    Selecting,
    Blurred,
}

/// Snapshot of the caret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub mode: CaretMode,
    /// Character offset of the native caret
    pub position: usize,
    /// Blink phase; only meaningful while blinking
    pub glyph_on: bool,
}

impl CursorState {
    pub fn is_visible(&self) -> bool {
        self.mode == CaretMode::Blinking && self.glyph_on
    }

    pub fn is_blinking(&self) -> bool {
        self.mode == CaretMode::Blinking
    }
}

struct Timers {
    blink: Option<TimerId>,
    deferred: Vec<TimerId>,
}

pub struct CursorSync {
    surface: Rc<dyn Surface>,
    scheduler: Rc<dyn Scheduler>,
    blink_ms: u32,
    glyph: String,
    state: Cell<CursorState>,
    suppress_toggle: Cell<bool>,
    timers: RefCell<Timers>,
    torn_down: Cell<bool>,
    this: Weak<CursorSync>,
}

impl CursorSync {
    pub fn new(
        surface: Rc<dyn Surface>,
        scheduler: Rc<dyn Scheduler>,
        blink_ms: u32,
        glyph: impl Into<String>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            surface,
            scheduler,
            blink_ms: blink_ms.max(1),
            glyph: glyph.into(),
            state: Cell::new(CursorState {
                mode: CaretMode::Blurred,
                position: 0,
                glyph_on: false,
            }),
            suppress_toggle: Cell::new(false),
            timers: RefCell::new(Timers {
                blink: None,
                deferred: Vec::new(),
            }),
            torn_down: Cell::new(false),
            this: this.clone(),
        })
    }

    pub fn state(&self) -> CursorState {
        self.state.get()
    }

    /// Id of the running blink timer, if any
    pub fn blink_timer(&self) -> Option<TimerId> {
        self.timers.borrow().blink
    }

    pub fn on_focus(&self) {
        if self.torn_down.get() {
            return;
        }
        let mut state = self.state.get();
        state.mode = CaretMode::Blinking;
        state.glyph_on = true;
        self.state.set(state);
        self.start_blink();
        self.sync();
    }

    pub fn on_blur(&self) {
        if self.torn_down.get() {
            return;
        }
        self.stop_blink();
        let mut state = self.state.get();
        state.mode = CaretMode::Blurred;
        state.glyph_on = false;
        self.state.set(state);
        self.draw();
    }

    /// The field's value changed; the native caret is already up to date
    pub fn on_input(&self) {
        if self.torn_down.get() {
            return;
        }
        self.hold_phase();
        self.sync();
    }

    /// A caret-moving key went down; the browser moves the caret after us
    pub fn on_key(&self) {
        if self.torn_down.get() {
            return;
        }
        self.hold_phase();
        self.defer_sync();
    }

    /// Mouse click in the field
    pub fn on_click(&self) {
        if self.torn_down.get() {
            return;
        }
        self.defer_sync();
    }

    pub fn on_selection_change(&self) {
        if self.torn_down.get() {
            return;
        }
        self.sync();
    }

    /// Stop every timer and remove the glyph. The instance is dead after this.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let (blink, deferred) = {
            let mut timers = self.timers.borrow_mut();
            (timers.blink.take(), std::mem::take(&mut timers.deferred))
        };
        for id in blink.into_iter().chain(deferred) {
            self.scheduler.clear_timer(id);
        }
        self.surface.remove_caret();
        tracing::trace!("cursor torn down");
    }

    fn hold_phase(&self) {
        self.suppress_toggle.set(true);
        let mut state = self.state.get();
        state.glyph_on = true;
        self.state.set(state);
    }

    /// Read the native selection and redraw
    fn sync(&self) {
        let mut state = self.state.get();
        if let Some(selection) = self.surface.input_selection() {
            state.position = selection.end;
            if state.mode != CaretMode::Blurred {
                state.mode = if selection.is_collapsed() {
                    CaretMode::Blinking
                } else {
                    CaretMode::Selecting
                };
            }
        }
        self.state.set(state);
        self.draw();
    }

    fn draw(&self) {
        let state = self.state.get();
        self.surface.draw_caret(&CaretView {
            visible: state.is_visible(),
            position: state.position,
            glyph: self.glyph.clone(),
        });
    }

    fn tick(&self) {
        if self.torn_down.get() {
            return;
        }
        let mut state = self.state.get();
        if state.mode != CaretMode::Blinking {
            return;
        }
        if self.suppress_toggle.replace(false) {
            state.glyph_on = true;
        } else {
            state.glyph_on = !state.glyph_on;
        }
        self.state.set(state);
        self.draw();
    }

    fn start_blink(&self) {
        if self.timers.borrow().blink.is_some() {
            return;
        }
        let this = self.this.clone();
        let id = self.scheduler.set_interval(
            self.blink_ms,
            Box::new(move || {
                if let Some(cursor) = this.upgrade() {
                    cursor.tick();
                }
            }),
        );
        self.timers.borrow_mut().blink = Some(id);
    }

    fn stop_blink(&self) {
        let blink = self.timers.borrow_mut().blink.take();
        if let Some(id) = blink {
            self.scheduler.clear_timer(id);
        }
    }

    fn defer_sync(&self) {
        let this = self.this.clone();
        let slot: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let fired = Rc::clone(&slot);
        let id = self.scheduler.set_timeout(
            0,
            Box::new(move || {
                if let Some(cursor) = this.upgrade() {
                    if let Some(id) = fired.get() {
                        cursor.timers.borrow_mut().deferred.retain(|t| *t != id);
                    }
                    if !cursor.torn_down.get() {
                        cursor.sync();
                    }
                }
            }),
        );
        slot.set(Some(id));
        self.timers.borrow_mut().deferred.push(id);
    }
}

impl Drop for CursorSync {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{ManualScheduler, MemorySurface};

    fn setup() -> (Rc<MemorySurface>, Rc<ManualScheduler>, Rc<CursorSync>) {
        let surface = Rc::new(MemorySurface::new());
        surface.create_input_line("> ").unwrap();
        let scheduler = Rc::new(ManualScheduler::new());
        let cursor = CursorSync::new(surface.clone(), scheduler.clone(), 500, "_");
        (surface, scheduler, cursor)
    }

    #[test]
    fn test_focus_starts_blinking() {
        let (surface, scheduler, cursor) = setup();
        cursor.on_focus();

        assert!(cursor.state().is_visible());
        assert!(cursor.blink_timer().is_some());
        assert!(surface.caret().unwrap().visible);

        scheduler.advance(500);
        assert!(!cursor.state().is_visible());
        scheduler.advance(500);
        assert!(cursor.state().is_visible());
    }

    #[test]
    fn test_blur_hides_and_stops_timer() {
        let (surface, scheduler, cursor) = setup();
        cursor.on_focus();
        let timer = cursor.blink_timer().unwrap();

        cursor.on_blur();
        assert_eq!(cursor.state().mode, CaretMode::Blurred);
        assert!(!surface.caret().unwrap().visible);
        assert!(!scheduler.is_active(timer));
        assert_eq!(cursor.blink_timer(), None);
    }

    #[test]
    fn test_input_resyncs_and_holds_phase() {
        let (surface, scheduler, cursor) = setup();
        cursor.on_focus();

        surface.type_text("help");
        cursor.on_input();
        assert_eq!(cursor.state().position, 4);
        assert_eq!(surface.caret().unwrap().position, 4);

        // the next toggle is skipped
        scheduler.advance(500);
        assert!(cursor.state().is_visible());
        scheduler.advance(500);
        assert!(!cursor.state().is_visible());
    }

    #[test]
    fn test_click_resyncs_after_tick() {
        let (surface, scheduler, cursor) = setup();
        surface.type_text("about");
        cursor.on_focus();
        assert_eq!(cursor.state().position, 5);

        surface.select(2, 2);
        cursor.on_click();
        assert_eq!(cursor.state().position, 5);

        scheduler.advance(0);
        assert_eq!(cursor.state().position, 2);
    }

    #[test]
    fn test_selection_hides_caret() {
        let (surface, _scheduler, cursor) = setup();
        surface.type_text("legal");
        cursor.on_focus();

        surface.select(0, 3);
        cursor.on_selection_change();
        assert_eq!(cursor.state().mode, CaretMode::Selecting);
        assert!(!surface.caret().unwrap().visible);

        surface.select(3, 3);
        cursor.on_selection_change();
        assert_eq!(cursor.state().mode, CaretMode::Blinking);
        assert!(surface.caret().unwrap().visible);
    }

    #[test]
    fn test_teardown_clears_all_timers() {
        let (surface, scheduler, cursor) = setup();
        cursor.on_focus();
        cursor.on_click();
        let blink = cursor.blink_timer().unwrap();

        cursor.teardown();
        assert!(scheduler.cleared().contains(&blink));
        assert_eq!(scheduler.active_timers(), 0);
        assert_eq!(surface.caret(), None);

        let draws = surface.caret_draws();
        scheduler.advance(5_000);
        assert_eq!(surface.caret_draws(), draws);
    }

    #[test]
    fn test_dead_cursor_ignores_events() {
        let (_surface, scheduler, cursor) = setup();
        cursor.teardown();
        cursor.on_focus();
        assert_eq!(cursor.blink_timer(), None);
        assert_eq!(scheduler.active_timers(), 0);
    }
}
