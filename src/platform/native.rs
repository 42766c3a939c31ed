//! Native platform for the command-line host
//!
//! - [`StdoutSurface`]: lines printed to stdout as they are produced
//! - [`ThreadScheduler`]: blocking sleeps, a local task pool, inert timers
//! - [`JsonFileStore`]: preferences in a small JSON object on disk

use super::{
    CaretView, KeyValueStore, LineId, LineStyle, MenuId, MenuPhase, MenuView, PlatformError,
    PlatformResult, Scheduler, Selection, Surface, TimerId,
};
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Default)]
struct StdoutState {
    next_line: u64,
    /// Ids at or below this were wiped by the last clear
    cleared_through: u64,
    /// Line still being written (no newline yet)
    open: Option<LineId>,
    input: Option<String>,
    value: String,
    menus: HashSet<MenuId>,
}

/// Prints output to stdout. The echo of a submitted command is skipped
/// because the terminal already shows what was typed.
#[derive(Default)]
pub struct StdoutSurface {
    state: RefCell<StdoutState>,
}

impl StdoutSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn out(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn close_open_line(&self) {
        if self.state.borrow_mut().open.take().is_some() {
            self.out("\n");
        }
    }
}

/// Rough text rendering of an HTML fragment
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag.trim_start_matches('/').to_ascii_lowercase();
                let name = name.split_whitespace().next().unwrap_or("");
                if matches!(name, "br" | "br/" | "li" | "p" | "div") && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            (true, c) => tag.push(c),
            (false, '\n') => {}
            (false, c) => text.push(c),
        }
    }
    text.trim().to_string()
}

impl Surface for StdoutSurface {
    fn append_line(&self, text: &str, style: LineStyle) -> PlatformResult<LineId> {
        self.close_open_line();
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_line += 1;
            LineId(state.next_line)
        };
        if style == LineStyle::Echo {
            return Ok(id);
        }
        self.out(text);
        self.state.borrow_mut().open = Some(id);
        Ok(id)
    }

    fn set_line_text(&self, line: LineId, text: &str) -> PlatformResult<()> {
        let (open, known) = {
            let state = self.state.borrow();
            (
                state.open == Some(line),
                line.0 > state.cleared_through && line.0 <= state.next_line,
            )
        };
        if open {
            self.out(&format!("\r\x1b[2K{}", text));
            Ok(())
        } else if known {
            Ok(())
        } else {
            Err(PlatformError::StaleLine(line))
        }
    }

    fn append_html(&self, html: &str, _class_name: Option<&str>) -> PlatformResult<()> {
        self.close_open_line();
        self.out(&format!("{}\n", strip_tags(html)));
        Ok(())
    }

    fn set_greeting(&self, text: &str) -> PlatformResult<()> {
        self.close_open_line();
        self.out(&format!("{}\n", text));
        Ok(())
    }

    fn clear_output(&self) -> PlatformResult<()> {
        {
            let mut state = self.state.borrow_mut();
            state.open = None;
            state.cleared_through = state.next_line;
            state.menus.clear();
            state.input = None;
        }
        self.out("\x1b[2J\x1b[H");
        Ok(())
    }

    fn scroll_to_bottom(&self) {}

    fn create_input_line(&self, prompt: &str) -> PlatformResult<()> {
        self.close_open_line();
        {
            let mut state = self.state.borrow_mut();
            state.input = Some(prompt.to_string());
            state.value.clear();
        }
        self.out(prompt);
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
            *input = prompt.to_string();
        }
    }

    fn input_value(&self) -> String {
        self.state.borrow().value.clone()
    }

    fn set_input_value(&self, value: &str) {
        self.state.borrow_mut().value = value.to_string();
    }

    fn input_selection(&self) -> Option<Selection> {
        let state = self.state.borrow();
        state.input.as_ref()?;
        Some(Selection::caret(state.value.chars().count()))
    }

    fn focus_input(&self) {}

    fn has_text_selection(&self) -> bool {
        false
    }

    fn draw_caret(&self, _caret: &CaretView) {}

    fn remove_caret(&self) {}

    fn render_menu(&self, menu: &MenuView) -> PlatformResult<()> {
        self.close_open_line();
        match menu.phase {
            MenuPhase::Active => {
                if !self.state.borrow_mut().menus.insert(menu.id) {
                    return Ok(());
                }
                let mut text = format!("{}\n", menu.title);
                for (i, label) in menu.labels.iter().enumerate() {
                    text.push_str(&format!("  {}. {}\n", i + 1, label));
                }
                text.push_str("Number to choose, Enter for the first, q to cancel: ");
                self.out(&text);
            }
            MenuPhase::Selected => {
                let label = menu.labels.get(menu.selected).map(String::as_str);
                self.out(&format!("\u{203a} {}\n", label.unwrap_or("")));
            }
            MenuPhase::Cancelled => self.out("(cancelled)\n"),
        }
        Ok(())
    }

    fn remove_menu(&self, id: MenuId) {
        self.state.borrow_mut().menus.remove(&id);
    }
}

/// Scheduler for a single-threaded native host. Timers never fire; the
/// caret does not blink on a line terminal.
pub struct ThreadScheduler {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    next_timer: Cell<i32>,
    seed: RandomState,
    draws: Cell<u64>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
            next_timer: Cell::new(1),
            seed: RandomState::new(),
            draws: Cell::new(0),
        }
    }

    /// Run spawned tasks until they all finish or wait on something
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    fn next_timer(&self) -> TimerId {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        TimerId(id)
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        Box::pin(async move {
            std::thread::sleep(Duration::from_millis(u64::from(ms)));
        })
    }

    fn random(&self) -> f64 {
        let n = self.draws.get();
        self.draws.set(n + 1);
        let mut hasher = self.seed.build_hasher();
        hasher.write_u64(n);
        (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn set_timeout(&self, _ms: u32, _callback: Box<dyn FnOnce()>) -> TimerId {
        self.next_timer()
    }

    fn set_interval(&self, _ms: u32, _callback: Box<dyn FnMut()>) -> TimerId {
        self.next_timer()
    }

    fn clear_timer(&self, _id: TimerId) {}

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(task) {
            tracing::error!("failed to spawn task: {}", e);
        }
    }
}

/// Preferences stored as a flat JSON object
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> PlatformResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| PlatformError::Storage(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PlatformError::Storage(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PlatformResult<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| PlatformError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| PlatformError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}
