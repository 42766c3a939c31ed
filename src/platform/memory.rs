//! In-memory platform
//!
//! A recording [`Surface`], a manually driven [`Scheduler`] and a
//! `HashMap`-backed [`KeyValueStore`]. Used by the unit and integration
//! tests, and by any host that wants to drive the engine headlessly.

use super::{
    CaretView, KeyValueStore, LineId, LineStyle, MenuId, MenuPhase, MenuView, PlatformError,
    PlatformResult, Scheduler, Selection, Surface, TimerId,
};
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{self, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

/// One block of recorded output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Line { id: LineId, text: String, style: LineStyle },
    Html { html: String, class_name: Option<String> },
}

#[derive(Debug, Clone, Default)]
struct InputState {
    prompt: String,
    value: String,
    selection: Selection,
    focused: bool,
}

#[derive(Default)]
struct SurfaceState {
    greeting: Option<String>,
    blocks: Vec<Block>,
    next_line: u64,
    input: Option<InputState>,
    input_lines_created: usize,
    caret: Option<CaretView>,
    caret_draws: usize,
    menus: BTreeMap<MenuId, MenuView>,
    scrolls: usize,
    text_selection: bool,
    fail_html: bool,
}

/// Surface that records everything rendered into it
#[derive(Default)]
pub struct MemorySurface {
    state: RefCell<SurfaceState>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded output blocks, oldest first
    pub fn blocks(&self) -> Vec<Block> {
        self.state.borrow().blocks.clone()
    }

    /// Text of every block (HTML blocks contribute their markup)
    pub fn lines(&self) -> Vec<String> {
        self.state
            .borrow()
            .blocks
            .iter()
            .map(|b| match b {
                Block::Line { text, .. } => text.clone(),
                Block::Html { html, .. } => html.clone(),
            })
            .collect()
    }

    /// Lines rendered with the given style
    pub fn lines_with_style(&self, style: LineStyle) -> Vec<String> {
        self.state
            .borrow()
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Line { text, style: s, .. } if *s == style => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whole output joined with newlines
    pub fn output_text(&self) -> String {
        self.lines().join("\n")
    }

    pub fn greeting(&self) -> Option<String> {
        self.state.borrow().greeting.clone()
    }

    pub fn prompt(&self) -> Option<String> {
        self.state.borrow().input.as_ref().map(|i| i.prompt.clone())
    }

    pub fn is_input_focused(&self) -> bool {
        self.state.borrow().input.as_ref().is_some_and(|i| i.focused)
    }

    /// How many input lines were ever created
    pub fn input_lines_created(&self) -> usize {
        self.state.borrow().input_lines_created
    }

    /// Simulate typing: replace the value and put the caret at the end
    pub fn type_text(&self, value: &str) {
        if let Some(input) = self.state.borrow_mut().input.as_mut() {
            input.value = value.to_string();
            input.selection = Selection::caret(value.chars().count());
        }
    }

    /// Simulate the user moving the native caret or selecting
    pub fn select(&self, start: usize, end: usize) {
        if let Some(input) = self.state.borrow_mut().input.as_mut() {
            input.selection = Selection { start, end };
        }
    }

    pub fn blur_input(&self) {
        if let Some(input) = self.state.borrow_mut().input.as_mut() {
            input.focused = false;
        }
    }

    /// Simulate a document-level text selection (mid-drag)
    pub fn set_text_selection(&self, selected: bool) {
        self.state.borrow_mut().text_selection = selected;
    }

    /// Make subsequent HTML appends fail
    pub fn fail_html(&self, fail: bool) {
        self.state.borrow_mut().fail_html = fail;
    }

    pub fn caret(&self) -> Option<CaretView> {
        self.state.borrow().caret.clone()
    }

    pub fn caret_draws(&self) -> usize {
        self.state.borrow().caret_draws
    }

    pub fn menus(&self) -> Vec<MenuView> {
        self.state.borrow().menus.values().cloned().collect()
    }

    pub fn active_menus(&self) -> Vec<MenuView> {
        self.state
            .borrow()
            .menus
            .values()
            .filter(|m| m.phase == MenuPhase::Active)
            .cloned()
            .collect()
    }

    pub fn scrolls(&self) -> usize {
        self.state.borrow().scrolls
    }

    fn push_block(&self, block: Block) {
        self.state.borrow_mut().blocks.push(block);
    }
}

impl Surface for MemorySurface {
    fn append_line(&self, text: &str, style: LineStyle) -> PlatformResult<LineId> {
        let mut state = self.state.borrow_mut();
        let id = LineId(state.next_line);
        state.next_line += 1;
        state.blocks.push(Block::Line { id, text: text.to_string(), style });
        Ok(id)
    }

    fn set_line_text(&self, line: LineId, text: &str) -> PlatformResult<()> {
        let mut state = self.state.borrow_mut();
        let target = state.blocks.iter_mut().find_map(|b| match b {
            Block::Line { id, text, .. } if *id == line => Some(text),
            _ => None,
        });
        match target {
            Some(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            None => Err(PlatformError::StaleLine(line)),
        }
    }

    fn append_html(&self, html: &str, class_name: Option<&str>) -> PlatformResult<()> {
        if self.state.borrow().fail_html {
            return Err(PlatformError::Render("html insertion rejected".into()));
        }
        self.push_block(Block::Html {
            html: html.to_string(),
            class_name: class_name.map(str::to_string),
        });
        Ok(())
    }

    fn set_greeting(&self, text: &str) -> PlatformResult<()> {
        self.state.borrow_mut().greeting = Some(text.to_string());
        Ok(())
    }

    fn clear_output(&self) -> PlatformResult<()> {
        let mut state = self.state.borrow_mut();
        state.blocks.clear();
        state.menus.clear();
        Ok(())
    }

    fn scroll_to_bottom(&self) {
        self.state.borrow_mut().scrolls += 1;
    }

    fn create_input_line(&self, prompt: &str) -> PlatformResult<()> {
        let mut state = self.state.borrow_mut();
        state.input = Some(InputState {
            prompt: prompt.to_string(),
            ..InputState::default()
        });
        state.input_lines_created += 1;
        Ok(())
    }

    fn remove_input_line(&self) {
        self.state.borrow_mut().input = None;
    }

    fn has_input_line(&self) -> bool {
        self.state.borrow().input.is_some()
    }

    fn set_prompt(&self, prompt: &str) {
        if let Some(input) = self.state.borrow_mut().input.as_mut() {
            input.prompt = prompt.to_string();
        }
    }

    fn input_value(&self) -> String {
        self.state
            .borrow()
            .input
            .as_ref()
            .map(|i| i.value.clone())
            .unwrap_or_default()
    }

    fn set_input_value(&self, value: &str) {
        self.type_text(value);
    }

    fn input_selection(&self) -> Option<Selection> {
        self.state.borrow().input.as_ref().map(|i| i.selection)
    }

    fn focus_input(&self) {
        if let Some(input) = self.state.borrow_mut().input.as_mut() {
            input.focused = true;
        }
    }

    fn has_text_selection(&self) -> bool {
        self.state.borrow().text_selection
    }

    fn draw_caret(&self, caret: &CaretView) {
        let mut state = self.state.borrow_mut();
        state.caret = Some(caret.clone());
        state.caret_draws += 1;
    }

    fn remove_caret(&self) {
        self.state.borrow_mut().caret = None;
    }

    fn render_menu(&self, menu: &MenuView) -> PlatformResult<()> {
        self.state.borrow_mut().menus.insert(menu.id, menu.clone());
        Ok(())
    }

    fn remove_menu(&self, id: MenuId) {
        self.state.borrow_mut().menus.remove(&id);
    }
}

enum TimerCallback {
    Once(Box<dyn FnOnce()>),
    Repeat(Box<dyn FnMut()>),
}

struct ManualTimer {
    due: u64,
    period: Option<u64>,
    callback: TimerCallback,
}

/// Scheduler whose clock only moves when told to
///
/// - `sleep` resolves immediately and records the requested delay
/// - timers fire from [`ManualScheduler::advance`]
/// - spawned tasks run on [`ManualScheduler::run_until_stalled`]
pub struct ManualScheduler {
    now: Cell<u64>,
    next_id: Cell<i32>,
    timers: RefCell<BTreeMap<TimerId, ManualTimer>>,
    cleared: RefCell<Vec<TimerId>>,
    sleeps: RefCell<Vec<u32>>,
    random: Cell<f64>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl ManualScheduler {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            now: Cell::new(0),
            next_id: Cell::new(1),
            timers: RefCell::new(BTreeMap::new()),
            cleared: RefCell::new(Vec::new()),
            sleeps: RefCell::new(Vec::new()),
            random: Cell::new(0.5),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// Fix the value returned by `random()`
    pub fn set_random(&self, value: f64) {
        self.random.set(value);
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Every delay passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }

    /// Every timer passed to `clear_timer`
    pub fn cleared(&self) -> Vec<TimerId> {
        self.cleared.borrow().clone()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(&id)
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Run spawned tasks until none can make progress
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Move the clock forward, firing due timers in order
    pub fn advance(&self, ms: u64) {
        let target = self.now.get() + ms;
        loop {
            let next = self
                .timers
                .borrow()
                .iter()
                .filter(|(_, t)| t.due <= target)
                .min_by_key(|(id, t)| (t.due, **id))
                .map(|(id, _)| *id);
            let Some(id) = next else { break };
            let Some(timer) = self.timers.borrow_mut().remove(&id) else { break };
            self.now.set(timer.due);
            match timer.callback {
                TimerCallback::Once(callback) => callback(),
                TimerCallback::Repeat(mut callback) => {
                    callback();
                    if !self.cleared.borrow().contains(&id) {
                        let period = timer.period.unwrap_or(1).max(1);
                        self.timers.borrow_mut().insert(
                            id,
                            ManualTimer {
                                due: timer.due + period,
                                period: timer.period,
                                callback: TimerCallback::Repeat(callback),
                            },
                        );
                    }
                }
            }
        }
        self.now.set(target);
    }

    fn schedule(&self, ms: u32, period: Option<u64>, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.timers.borrow_mut().insert(
            id,
            ManualTimer {
                due: self.now.get() + u64::from(ms),
                period,
                callback,
            },
        );
        id
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        self.sleeps.borrow_mut().push(ms);
        Box::pin(future::ready(()))
    }

    fn random(&self) -> f64 {
        self.random.get()
    }

    fn set_timeout(&self, ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        self.schedule(ms, None, TimerCallback::Once(callback))
    }

    fn set_interval(&self, ms: u32, callback: Box<dyn FnMut()>) -> TimerId {
        self.schedule(ms, Some(u64::from(ms)), TimerCallback::Repeat(callback))
    }

    fn clear_timer(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id);
        self.cleared.borrow_mut().push(id);
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(task) {
            tracing::error!("failed to spawn task: {}", e);
        }
    }
}

/// `HashMap`-backed preference store
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        store.entries.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PlatformResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timeout_fires_once() {
        let sched = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        sched.set_timeout(10, Box::new(move || h.set(h.get() + 1)));

        sched.advance(9);
        assert_eq!(hits.get(), 0);
        sched.advance(1);
        assert_eq!(hits.get(), 1);
        sched.advance(100);
        assert_eq!(hits.get(), 1);
        assert_eq!(sched.active_timers(), 0);
    }

    #[test]
    fn test_interval_repeats_until_cleared() {
        let sched = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = sched.set_interval(500, Box::new(move || h.set(h.get() + 1)));

        sched.advance(1500);
        assert_eq!(hits.get(), 3);

        sched.clear_timer(id);
        sched.advance(5000);
        assert_eq!(hits.get(), 3);
        assert_eq!(sched.cleared(), vec![id]);
    }

    #[test]
    fn test_sleep_records_delay() {
        let sched = ManualScheduler::new();
        futures::executor::block_on(sched.sleep(60));
        futures::executor::block_on(sched.sleep(0));
        assert_eq!(sched.sleeps(), vec![60, 0]);
    }

    #[test]
    fn test_spawned_tasks_run_when_pumped() {
        let sched = ManualScheduler::new();
        let done = Rc::new(Cell::new(false));
        let d = done.clone();
        sched.spawn(Box::pin(async move { d.set(true) }));
        assert!(!done.get());
        sched.run_until_stalled();
        assert!(done.get());
    }

    #[test]
    fn test_surface_stale_line() {
        let surface = MemorySurface::new();
        let id = surface.append_line("a", LineStyle::Output).unwrap();
        surface.clear_output().unwrap();
        assert_eq!(
            surface.set_line_text(id, "b"),
            Err(PlatformError::StaleLine(id))
        );
    }

    #[test]
    fn test_store_roundtrip() {
        let store = MemoryStore::with_entries([("preferredTheme", "light")]);
        assert_eq!(store.get("preferredTheme").unwrap().as_deref(), Some("light"));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
