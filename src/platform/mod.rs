//! Platform Abstraction Layer
//!
//! The terminal engine never touches the DOM directly. Everything it needs
//! from the host goes through three traits:
//!
//! - [`Surface`]: the line-oriented output area, the live input line, the
//!   caret overlay and inline menus
//! - [`Scheduler`]: animation pacing, timers and task spawning
//! - [`KeyValueStore`]: persisted preferences
//!
//! Implementations:
//! - Browser (wasm32): DOM surface, `setTimeout`/`setInterval`, `localStorage`
//! - Memory: recording surface and a manually driven clock, for tests
//! - Native: stdout surface for the command-line host

use futures::future::LocalBoxFuture;

pub mod memory;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// DOM or output device failure
    Render(String),
    /// A line handle outlived the line it pointed at (e.g. after clear)
    StaleLine(LineId),
    /// Key-value storage failure
    Storage(String),
    /// Feature not supported on this platform
    NotSupported(String),
    /// Initialization failed
    InitFailed(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::Render(s) => write!(f, "render failed: {}", s),
            PlatformError::StaleLine(id) => write!(f, "line {} no longer exists", id.0),
            PlatformError::Storage(s) => write!(f, "storage error: {}", s),
            PlatformError::NotSupported(s) => write!(f, "not supported: {}", s),
            PlatformError::InitFailed(s) => write!(f, "init failed: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Handle to a rendered output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u64);

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub i32);

/// Handle to an inline menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuId(pub u32);

/// Visual role of an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Output,
    Error,
    Success,
    Warning,
    /// Static copy of a submitted prompt + command
    Echo,
    Version,
}

impl LineStyle {
    /// CSS class used by the browser surface
    pub fn css_class(self) -> &'static str {
        match self {
            LineStyle::Output => "command-output",
            LineStyle::Error => "command-output error",
            LineStyle::Success => "command-output success",
            LineStyle::Warning => "command-output warning",
            LineStyle::Echo => "command-output historical-prompt-line",
            LineStyle::Version => "command-output terminal-version",
        }
    }
}

/// Native selection range of the input field, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn caret(position: usize) -> Self {
        Self { start: position, end: position }
    }

    /// True when nothing is selected (a plain caret)
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// What the caret overlay should look like right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretView {
    pub visible: bool,
    /// Character offset the glyph sits in front of
    pub position: usize,
    pub glyph: String,
}

/// Lifecycle of an inline menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPhase {
    Active,
    /// Resolved by Enter; the chosen option stays highlighted
    Selected,
    Cancelled,
}

/// Render model of an inline menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub id: MenuId,
    pub title: String,
    pub labels: Vec<String>,
    pub selected: usize,
    pub phase: MenuPhase,
}

/// The terminal's output area and live input line
pub trait Surface {
    // ===== Output =====

    /// Append a text line to the output stream
    fn append_line(&self, text: &str, style: LineStyle) -> PlatformResult<LineId>;

    /// Replace the text of a previously appended line
    fn set_line_text(&self, line: LineId, text: &str) -> PlatformResult<()>;

    /// Append a static HTML fragment, running any embedded scripts
    fn append_html(&self, html: &str, class_name: Option<&str>) -> PlatformResult<()>;

    /// Set the greeting region (survives `clear_output`)
    fn set_greeting(&self, text: &str) -> PlatformResult<()>;

    /// Remove all output lines and menus, keeping the greeting
    fn clear_output(&self) -> PlatformResult<()>;

    /// Scroll the output to the bottom. Must be safe to call repeatedly.
    fn scroll_to_bottom(&self);

    // ===== Live input line =====

    fn create_input_line(&self, prompt: &str) -> PlatformResult<()>;
    fn remove_input_line(&self);
    fn has_input_line(&self) -> bool;
    fn set_prompt(&self, prompt: &str);
    fn input_value(&self) -> String;
    fn set_input_value(&self, value: &str);
    fn input_selection(&self) -> Option<Selection>;
    fn focus_input(&self);

    /// True if the user has a non-empty document text selection
    fn has_text_selection(&self) -> bool;

    // ===== Caret overlay =====

    fn draw_caret(&self, caret: &CaretView);

    /// Remove the caret glyph and any measurement nodes
    fn remove_caret(&self);

    // ===== Menus =====

    fn render_menu(&self, menu: &MenuView) -> PlatformResult<()>;
    fn remove_menu(&self, id: MenuId);
}

/// Cooperative timing and task spawning
pub trait Scheduler {
    /// Resolve after `ms` milliseconds without blocking the event loop
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()>;

    /// Uniform random number in `[0, 1)`
    fn random(&self) -> f64;

    fn set_timeout(&self, ms: u32, callback: Box<dyn FnOnce()>) -> TimerId;
    fn set_interval(&self, ms: u32, callback: Box<dyn FnMut()>) -> TimerId;
    fn clear_timer(&self, id: TimerId);

    /// Run a task on the local event loop
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

/// String key-value storage for preferences
pub trait KeyValueStore {
    fn get(&self, key: &str) -> PlatformResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PlatformResult<()>;
}
