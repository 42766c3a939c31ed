//! Command results
//!
//! Every handler yields exactly one [`CommandResult`]. The registry wrapper
//! normalizes it (plain text becomes a sequence of lines) before the view
//! sees it.

use crate::platform::LineStyle;
use std::fmt;

/// Tells the renderer to skip normal display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control {
    pub suppress_output: bool,
    pub suppress_prompt: bool,
}

impl Control {
    /// Output suppressed, prompt still comes back
    pub fn silent() -> Self {
        Self {
            suppress_output: true,
            suppress_prompt: false,
        }
    }
}

/// Static HTML fragment inserted without animation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlBlock {
    pub html: String,
    pub class_name: Option<String>,
}

/// One element of a mixed result sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    Text(String),
    Styled { text: String, style: LineStyle },
    Html(HtmlBlock),
    Control(Control),
}

impl OutputItem {
    pub fn text(s: impl Into<String>) -> Self {
        OutputItem::Text(s.into())
    }

    pub fn html(html: impl Into<String>, class_name: Option<&str>) -> Self {
        OutputItem::Html(HtmlBlock {
            html: html.into(),
            class_name: class_name.map(str::to_string),
        })
    }

    pub fn styled(text: impl Into<String>, style: LineStyle) -> Self {
        OutputItem::Styled {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

impl MenuOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Called with the chosen value and index; may return a message to print
pub type SelectCallback = Box<dyn FnOnce(&str, usize) -> Option<String>>;
pub type CancelCallback = Box<dyn FnOnce()>;

/// A request to show an inline menu
pub struct MenuRequest {
    pub prompt: String,
    pub options: Vec<MenuOption>,
    pub on_select: Option<SelectCallback>,
    pub on_cancel: Option<CancelCallback>,
}

impl MenuRequest {
    pub fn new(prompt: impl Into<String>, options: Vec<MenuOption>) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            on_select: None,
            on_cancel: None,
        }
    }

    pub fn on_select(mut self, f: impl FnOnce(&str, usize) -> Option<String> + 'static) -> Self {
        self.on_select = Some(Box::new(f));
        self
    }

    pub fn on_cancel(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for MenuRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuRequest")
            .field("prompt", &self.prompt)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// What a command handler returns
#[derive(Debug)]
pub enum CommandResult {
    /// Possibly multi-line text
    Text(String),
    /// Ordered mix of text, HTML and control items
    Items(Vec<OutputItem>),
    Control(Control),
    Menu(MenuRequest),
    /// Nothing to render
    Empty,
}

impl CommandResult {
    pub fn error(message: impl Into<String>) -> Self {
        CommandResult::Items(vec![OutputItem::styled(message, LineStyle::Error)])
    }

    pub fn success(message: impl Into<String>) -> Self {
        CommandResult::Items(vec![OutputItem::styled(message, LineStyle::Success)])
    }

    pub fn warning(message: impl Into<String>) -> Self {
        CommandResult::Items(vec![OutputItem::styled(message, LineStyle::Warning)])
    }

    pub fn html(html: impl Into<String>, class_name: Option<&str>) -> Self {
        CommandResult::Items(vec![OutputItem::html(html, class_name)])
    }

    /// Turn plain text into a line sequence; other shapes pass through
    pub fn normalize(self) -> Self {
        match self {
            CommandResult::Text(text) => CommandResult::Items(
                split_lines(&text).into_iter().map(OutputItem::Text).collect(),
            ),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandResult::Empty => true,
            CommandResult::Items(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// Split on newlines, keeping blank lines and dropping `\r`
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}

impl From<String> for CommandResult {
    fn from(s: String) -> Self {
        CommandResult::Text(s)
    }
}

impl From<&str> for CommandResult {
    fn from(s: &str) -> Self {
        CommandResult::Text(s.to_string())
    }
}

impl From<Vec<OutputItem>> for CommandResult {
    fn from(items: Vec<OutputItem>) -> Self {
        CommandResult::Items(items)
    }
}

impl From<Control> for CommandResult {
    fn from(c: Control) -> Self {
        CommandResult::Control(c)
    }
}

impl From<MenuRequest> for CommandResult {
    fn from(m: MenuRequest) -> Self {
        CommandResult::Menu(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_splits_text() {
        let CommandResult::Items(items) = CommandResult::from("a\r\n\nb").normalize() else {
            panic!("expected items");
        };
        assert_eq!(
            items,
            vec![OutputItem::text("a"), OutputItem::text(""), OutputItem::text("b")]
        );
    }

    #[test]
    fn test_normalize_passes_items_through() {
        let items = vec![OutputItem::text("x"), OutputItem::html("<b>y</b>", None)];
        let CommandResult::Items(out) = CommandResult::Items(items.clone()).normalize() else {
            panic!("expected items");
        };
        assert_eq!(out, items);
    }

    #[test]
    fn test_is_empty() {
        assert!(CommandResult::Empty.is_empty());
        assert!(CommandResult::Items(vec![]).is_empty());
        assert!(!CommandResult::from("").is_empty());
        assert!(!CommandResult::Control(Control::silent()).is_empty());
    }
}
