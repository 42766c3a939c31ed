//! Terminal view - the output renderer
//!
//! Converts command results into terminal lines and owns the single live
//! input line together with its cursor synchronizer.
//!
//! Rendering rules:
//! - text is split into lines, each revealed in turn with a jittered pause
//!   between lines (none after the last)
//! - in mixed sequences, text is buffered and flushed as one block whenever
//!   an HTML fragment or a styled line comes along, so order is preserved
//! - HTML fragments are inserted as-is, without animation
//! - control results render nothing
//!
//! Any render failure degrades to one "Error displaying output" line.

use super::core::TerminalCore;
use super::cursor::CursorSync;
use super::input::{PointerGesture, PointerTracker};
use super::menu::{Menu, MenuKey, MenuOutcome};
use super::result::{CommandResult, OutputItem, split_lines};
use crate::config::{AnimationConfig, Config};
use crate::events::{EventBus, Subscription, topics};
use crate::platform::{LineStyle, PlatformResult, Scheduler, Surface};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub struct TerminalView {
    surface: Rc<dyn Surface>,
    scheduler: Rc<dyn Scheduler>,
    bus: Rc<EventBus>,
    core: Rc<TerminalCore>,
    menu: Rc<Menu>,
    cursor: RefCell<Option<Rc<CursorSync>>>,
    pointer: PointerTracker,
    animation: AnimationConfig,
    blink_ms: u32,
    caret_glyph: String,
}

impl TerminalView {
    pub fn new(
        surface: Rc<dyn Surface>,
        scheduler: Rc<dyn Scheduler>,
        bus: Rc<EventBus>,
        core: Rc<TerminalCore>,
        menu: Rc<Menu>,
        config: &Config,
    ) -> Self {
        Self {
            surface,
            scheduler,
            bus,
            core,
            menu,
            cursor: RefCell::new(None),
            pointer: PointerTracker::new(config.click_threshold_px),
            animation: config.animation.clone(),
            blink_ms: config.blink_interval_ms,
            caret_glyph: config.caret_glyph.clone(),
        }
    }

    pub fn attach(self: &Rc<Self>) -> Vec<Subscription> {
        let clear: Weak<Self> = Rc::downgrade(self);
        let prompt: Weak<Self> = Rc::downgrade(self);
        vec![
            self.bus.on(topics::CLEAR, move |_| {
                if let Some(view) = clear.upgrade() {
                    view.clear()?;
                }
                Ok(())
            }),
            self.bus.on(topics::PROMPT_CHANGED, move |payload| {
                if let (Some(view), Some(text)) = (prompt.upgrade(), payload.as_text()) {
                    view.surface.set_prompt(text);
                }
                Ok(())
            }),
        ]
    }

    // ===== Greeting and clearing =====

    pub fn show_greeting(&self) -> PlatformResult<()> {
        self.surface.set_greeting(&self.core.greeting())
    }

    /// Wipe the output (the greeting stays) and start a fresh input line
    pub fn clear(&self) -> PlatformResult<()> {
        self.drop_input_line();
        self.menu.close_all();
        self.surface.clear_output()?;
        self.show_greeting()?;
        self.create_input_line()
    }

    // ===== Input line lifecycle =====

    /// Replace the live input line with a static echo of the submission
    pub fn display_command(&self, raw: &str) {
        let echo = format!("{}{}", self.core.prompt(), raw);
        self.drop_input_line();
        if let Err(e) = self.surface.append_line(&echo, LineStyle::Echo) {
            tracing::error!("failed to echo command: {}", e);
        }
        self.surface.scroll_to_bottom();
    }

    /// Tear down the current input line (if any) and create a focused one
    pub fn create_input_line(&self) -> PlatformResult<()> {
        self.drop_input_line();
        self.surface.create_input_line(&self.core.prompt())?;
        let cursor = CursorSync::new(
            Rc::clone(&self.surface),
            Rc::clone(&self.scheduler),
            self.blink_ms,
            self.caret_glyph.clone(),
        );
        *self.cursor.borrow_mut() = Some(Rc::clone(&cursor));
        self.surface.focus_input();
        cursor.on_focus();
        self.surface.scroll_to_bottom();
        Ok(())
    }

    /// Create an input line unless one exists or a menu owns the keyboard
    pub fn ensure_input_line(&self) {
        if self.menu.is_active() || self.surface.has_input_line() {
            return;
        }
        if let Err(e) = self.create_input_line() {
            tracing::error!("failed to create input line: {}", e);
        }
    }

    fn drop_input_line(&self) {
        let cursor = self.cursor.borrow_mut().take();
        if let Some(cursor) = cursor {
            cursor.teardown();
        }
        self.surface.remove_input_line();
    }

    pub fn has_input_line(&self) -> bool {
        self.surface.has_input_line()
    }

    /// Cursor of the live input line
    pub fn cursor(&self) -> Option<Rc<CursorSync>> {
        self.cursor.borrow().clone()
    }

    pub fn input_value(&self) -> String {
        self.surface.input_value()
    }

    pub fn set_input_value(&self, value: &str) {
        self.surface.set_input_value(value);
        if let Some(cursor) = self.cursor() {
            cursor.on_input();
        }
    }

    pub fn focus_input(&self) {
        self.surface.focus_input();
        if let Some(cursor) = self.cursor() {
            cursor.on_focus();
        }
    }

    // ===== Events forwarded by the host =====

    pub fn input_focused(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_focus();
        }
    }

    pub fn input_blurred(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_blur();
        }
    }

    /// The field's value changed
    pub fn input_changed(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_input();
        }
    }

    pub fn input_clicked(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_click();
        }
    }

    pub fn selection_changed(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_selection_change();
        }
    }

    /// A caret-moving key was pressed
    pub fn cursor_key(&self) {
        if let Some(cursor) = self.cursor() {
            cursor.on_key();
        }
    }

    pub fn pointer_down(&self, x: f64, y: f64) {
        self.pointer.pointer_down(x, y);
    }

    /// Focus the input on a click, but not at the end of a drag-selection
    pub fn pointer_up(&self, x: f64, y: f64) {
        if self.pointer.pointer_up(x, y) == Some(PointerGesture::Click)
            && !self.surface.has_text_selection()
            && !self.menu.is_active()
        {
            self.focus_input();
        }
    }

    // ===== Menus =====

    pub fn menu_active(&self) -> bool {
        self.menu.is_active()
    }

    /// Route a key to the active menu; resume prompting once it resolves
    pub async fn menu_key(&self, key: MenuKey) -> MenuOutcome {
        let outcome = self.menu.handle_key(key);
        match &outcome {
            MenuOutcome::Selected { message, .. } => {
                if let Some(message) = message {
                    self.display_output(CommandResult::Text(message.clone()))
                        .await;
                }
                self.ensure_input_line();
            }
            MenuOutcome::Cancelled => self.ensure_input_line(),
            MenuOutcome::Handled | MenuOutcome::Inactive => {}
        }
        outcome
    }

    // ===== Output =====

    /// Render a command result. Never fails.
    pub async fn display_output(&self, result: CommandResult) {
        if let Err(e) = self.render(result).await {
            tracing::error!("error displaying output: {}", e);
            let message = format!("Error displaying output: {}", e);
            if let Err(e) = self.surface.append_line(&message, LineStyle::Error) {
                tracing::error!("failed to report render error: {}", e);
            }
        }
        self.surface.scroll_to_bottom();
    }

    pub async fn display_error(&self, message: &str) {
        self.display_styled(message, LineStyle::Error).await;
    }

    pub async fn display_success(&self, message: &str) {
        self.display_styled(message, LineStyle::Success).await;
    }

    pub async fn display_warning(&self, message: &str) {
        self.display_styled(message, LineStyle::Warning).await;
    }

    async fn display_styled(&self, message: &str, style: LineStyle) {
        let result = CommandResult::Items(vec![OutputItem::styled(message, style)]);
        self.display_output(result).await;
    }

    async fn render(&self, result: CommandResult) -> PlatformResult<()> {
        match result.normalize() {
            CommandResult::Items(items) => self.render_items(items).await,
            CommandResult::Text(text) => self.animate_lines(&split_lines(&text), LineStyle::Output).await,
            CommandResult::Control(control) => {
                tracing::trace!(?control, "control result, nothing to draw");
                Ok(())
            }
            CommandResult::Menu(request) => {
                self.menu.show(request);
                Ok(())
            }
            CommandResult::Empty => Ok(()),
        }
    }

    async fn render_items(&self, items: Vec<OutputItem>) -> PlatformResult<()> {
        let mut buffer: Vec<String> = Vec::new();
        for item in items {
            match item {
                OutputItem::Text(text) => buffer.extend(split_lines(&text)),
                OutputItem::Styled { text, style } => {
                    self.flush(&mut buffer).await?;
                    self.animate_lines(&split_lines(&text), style).await?;
                }
                OutputItem::Html(block) => {
                    self.flush(&mut buffer).await?;
                    self.surface
                        .append_html(&block.html, block.class_name.as_deref())?;
                    self.surface.scroll_to_bottom();
                }
                OutputItem::Control(control) => {
                    tracing::trace!(?control, "control item skipped");
                }
            }
        }
        self.flush(&mut buffer).await
    }

    async fn flush(&self, buffer: &mut Vec<String>) -> PlatformResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let lines = std::mem::take(buffer);
        self.animate_lines(&lines, LineStyle::Output).await
    }

    async fn animate_lines(&self, lines: &[String], style: LineStyle) -> PlatformResult<()> {
        for (i, line) in lines.iter().enumerate() {
            self.animate_line(line, style).await?;
            self.surface.scroll_to_bottom();
            if i + 1 < lines.len() {
                let delay = self.animation.line_delay(self.scheduler.random());
                self.scheduler.sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn animate_line(&self, text: &str, style: LineStyle) -> PlatformResult<()> {
        let delay = self.animation.char_delay_ms;
        if delay == 0 || text.is_empty() {
            self.surface.append_line(text, style)?;
            return Ok(());
        }
        let line = self.surface.append_line("", style)?;
        let mut shown = String::with_capacity(text.len());
        for c in text.chars() {
            shown.push(c);
            self.surface.set_line_text(line, &shown)?;
            self.scheduler.sleep(delay).await;
        }
        Ok(())
    }

    /// Remove the input line and cursor for good
    pub fn teardown(&self) {
        self.drop_input_line();
    }
}
