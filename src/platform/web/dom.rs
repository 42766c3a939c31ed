//! DOM surface
//!
//! Layout inside the mount element:
//!
//! ```text
//! div.terminal-greeting
//! div.terminal-output
//!   div.command-output ...        appended lines
//!   div.html-output ...           static HTML blocks
//!   div.terminal-menu ...         inline menus
//!   div.input-line                the single live input line
//!     span.prompt
//!     input.terminal-input        native caret hidden (caret-color: transparent)
//!     span.terminal-caret         synthetic caret, absolutely positioned
//!     span.caret-measure          invisible, measures text width
//! ```

use super::{document, js_error, window};
use crate::platform::{
    CaretView, LineId, LineStyle, MenuId, MenuPhase, MenuView, PlatformError, PlatformResult,
    Selection, Surface,
};
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, HtmlScriptElement, Node};

const NBSP: &str = "\u{00a0}";

struct InputLine {
    row: Element,
    prompt: Element,
    field: HtmlInputElement,
    caret: HtmlElement,
    measure: HtmlElement,
}

#[derive(Default)]
struct DomState {
    /// Most recent line; the only one still revealed character by character
    open_line: Option<(LineId, Element)>,
    next_line: u64,
    menus: HashMap<MenuId, Element>,
    input: Option<InputLine>,
}

pub struct DomSurface {
    document: Document,
    container: Element,
    greeting: Element,
    output: Element,
    state: RefCell<DomState>,
}

fn render_err(e: wasm_bindgen::JsValue) -> PlatformError {
    PlatformError::Render(js_error(e))
}

impl DomSurface {
    /// Build the terminal inside the element with the given id
    pub fn mount(container_id: &str) -> PlatformResult<Self> {
        let document = document()?;
        let container = document.get_element_by_id(container_id).ok_or_else(|| {
            PlatformError::InitFailed(format!("no element with id '{}'", container_id))
        })?;
        Self::new(document, container)
    }

    pub fn new(document: Document, container: Element) -> PlatformResult<Self> {
        container.set_inner_html("");
        let greeting = document.create_element("div").map_err(render_err)?;
        greeting.set_class_name("terminal-greeting");
        let output = document.create_element("div").map_err(render_err)?;
        output.set_class_name("terminal-output");
        container.append_child(&greeting).map_err(render_err)?;
        container.append_child(&output).map_err(render_err)?;

        Ok(Self {
            document,
            container,
            greeting,
            output,
            state: RefCell::new(DomState::default()),
        })
    }

    /// The mount element; host listeners are attached here
    pub fn container(&self) -> &Element {
        &self.container
    }

    fn element(&self, tag: &str, class: &str) -> PlatformResult<Element> {
        let el = self.document.create_element(tag).map_err(render_err)?;
        el.set_class_name(class);
        Ok(el)
    }

    /// Insert above the live input line, if there is one
    fn push(&self, node: &Node) -> PlatformResult<()> {
        let state = self.state.borrow();
        let anchor: Option<&Node> = state.input.as_ref().map(|i| i.row.as_ref());
        self.output
            .insert_before(node, anchor)
            .map_err(render_err)?;
        Ok(())
    }

    fn set_text(el: &Element, text: &str) {
        el.set_text_content(Some(if text.is_empty() { NBSP } else { text }));
    }

    /// Scripts inserted through innerHTML never run; swap in fresh copies
    fn activate_scripts(&self, root: &Element) -> PlatformResult<()> {
        let scripts = root.query_selector_all("script").map_err(render_err)?;
        for i in 0..scripts.length() {
            let Some(old) = scripts.item(i) else { continue };
            let Ok(old) = old.dyn_into::<HtmlScriptElement>() else {
                continue;
            };
            let fresh: HtmlScriptElement = self
                .document
                .create_element("script")
                .map_err(render_err)?
                .unchecked_into();
            let src = old.src();
            if !src.is_empty() {
                fresh.set_src(&src);
            }
            fresh.set_text(&old.text().map_err(render_err)?).map_err(render_err)?;
            if let Some(parent) = old.parent_node() {
                parent.replace_child(&fresh, &old).map_err(render_err)?;
            }
        }
        Ok(())
    }

    fn fill_menu(&self, el: &Element, menu: &MenuView) -> PlatformResult<()> {
        let class = match menu.phase {
            MenuPhase::Active => "terminal-menu",
            MenuPhase::Selected => "terminal-menu menu-final menu-selected",
            MenuPhase::Cancelled => "terminal-menu menu-final menu-cancelled",
        };
        el.set_class_name(class);
        el.set_attribute("data-menu-id", &menu.id.0.to_string())
            .map_err(render_err)?;
        el.set_inner_html("");

        let title = self.element("div", "menu-title")?;
        title.set_text_content(Some(&menu.title));
        el.append_child(&title).map_err(render_err)?;

        for (i, label) in menu.labels.iter().enumerate() {
            let selected = i == menu.selected;
            let option = self.element(
                "div",
                if selected { "menu-option selected" } else { "menu-option" },
            )?;
            let marker = if selected { "\u{203a} " } else { "  " };
            option.set_text_content(Some(&format!("{}{}", marker, label)));
            el.append_child(&option).map_err(render_err)?;
        }
        Ok(())
    }

    /// Copy the field's font onto the measuring span
    fn sync_measure_font(input: &InputLine) {
        let Ok(window) = window() else { return };
        let Ok(Some(computed)) = window.get_computed_style(&input.field) else {
            return;
        };
        let style = input.measure.style();
        for property in ["font-family", "font-size", "font-weight", "letter-spacing"] {
            if let Ok(value) = computed.get_property_value(property) {
                let _ = style.set_property(property, &value);
            }
        }
    }
}

/// Browsers report selection offsets in UTF-16 units
fn utf16_to_chars(value: &str, offset: u32) -> usize {
    let mut units = 0u32;
    for (i, c) in value.chars().enumerate() {
        if units >= offset {
            return i;
        }
        units += c.len_utf16() as u32;
    }
    value.chars().count()
}

impl Surface for DomSurface {
    fn append_line(&self, text: &str, style: LineStyle) -> PlatformResult<LineId> {
        let line = self.element("div", style.css_class())?;
        Self::set_text(&line, text);
        self.push(&line)?;

        let mut state = self.state.borrow_mut();
        state.next_line += 1;
        let id = LineId(state.next_line);
        state.open_line = Some((id, line));
        Ok(id)
    }

    fn set_line_text(&self, line: LineId, text: &str) -> PlatformResult<()> {
        let state = self.state.borrow();
        match &state.open_line {
            Some((id, el)) if *id == line => {
                Self::set_text(el, text);
                Ok(())
            }
            _ => Err(PlatformError::StaleLine(line)),
        }
    }

    fn append_html(&self, html: &str, class_name: Option<&str>) -> PlatformResult<()> {
        let class = match class_name {
            Some(extra) => format!("command-output html-output {}", extra),
            None => "command-output html-output".to_string(),
        };
        let block = self.element("div", &class)?;
        block.set_inner_html(html);
        self.activate_scripts(&block)?;
        self.push(&block)
    }

    fn set_greeting(&self, text: &str) -> PlatformResult<()> {
        self.greeting.set_text_content(Some(text));
        Ok(())
    }

    fn clear_output(&self) -> PlatformResult<()> {
        let mut state = self.state.borrow_mut();
        state.open_line = None;
        state.menus.clear();
        state.input = None;
        self.output.set_inner_html("");
        Ok(())
    }

    fn scroll_to_bottom(&self) {
        self.container.set_scroll_top(self.container.scroll_height());
    }

    fn create_input_line(&self, prompt: &str) -> PlatformResult<()> {
        self.remove_input_line();

        let row = self.element("div", "input-line")?;
        let prompt_el = self.element("span", "prompt")?;
        prompt_el.set_text_content(Some(prompt));

        let field: HtmlInputElement = self
            .element("input", "terminal-input")?
            .unchecked_into();
        field.set_type("text");
        field.set_autocomplete("off");
        field
            .set_attribute("spellcheck", "false")
            .map_err(render_err)?;
        field
            .style()
            .set_property("caret-color", "transparent")
            .map_err(render_err)?;

        let caret: HtmlElement = self.element("span", "terminal-caret")?.unchecked_into();
        caret
            .style()
            .set_property("position", "absolute")
            .map_err(render_err)?;

        let measure: HtmlElement = self.element("span", "caret-measure")?.unchecked_into();
        let style = measure.style();
        for (property, value) in [
            ("position", "absolute"),
            ("visibility", "hidden"),
            ("white-space", "pre"),
            ("left", "-9999px"),
        ] {
            style.set_property(property, value).map_err(render_err)?;
        }

        row.append_child(&prompt_el).map_err(render_err)?;
        row.append_child(&field).map_err(render_err)?;
        row.append_child(&caret).map_err(render_err)?;
        row.append_child(&measure).map_err(render_err)?;
        self.output.append_child(&row).map_err(render_err)?;

        self.state.borrow_mut().input = Some(InputLine {
            row,
            prompt: prompt_el,
            field,
            caret,
            measure,
        });
        Ok(())
    }

    fn remove_input_line(&self) {
        if let Some(input) = self.state.borrow_mut().input.take() {
            input.row.remove();
        }
    }

    fn has_input_line(&self) -> bool {
        self.state.borrow().input.is_some()
    }

    fn set_prompt(&self, prompt: &str) {
        if let Some(input) = &self.state.borrow().input {
            input.prompt.set_text_content(Some(prompt));
        }
    }

    fn input_value(&self) -> String {
        self.state
            .borrow()
            .input
            .as_ref()
            .map(|i| i.field.value())
            .unwrap_or_default()
    }

    fn set_input_value(&self, value: &str) {
        if let Some(input) = &self.state.borrow().input {
            input.field.set_value(value);
            let end = value.encode_utf16().count() as u32;
            let _ = input.field.set_selection_range(end, end);
        }
    }

    fn input_selection(&self) -> Option<Selection> {
        let state = self.state.borrow();
        let field = &state.input.as_ref()?.field;
        let value = field.value();
        let start = field.selection_start().ok().flatten()?;
        let end = field.selection_end().ok().flatten().unwrap_or(start);
        Some(Selection {
            start: utf16_to_chars(&value, start),
            end: utf16_to_chars(&value, end),
        })
    }

    fn focus_input(&self) {
        if let Some(input) = &self.state.borrow().input {
            if let Err(e) = input.field.focus() {
                tracing::debug!("focus failed: {}", js_error(e));
            }
        }
    }

    fn has_text_selection(&self) -> bool {
        window()
            .ok()
            .and_then(|w| w.get_selection().ok().flatten())
            .is_some_and(|s| !s.is_collapsed())
    }

    fn draw_caret(&self, caret: &CaretView) {
        let state = self.state.borrow();
        let Some(input) = &state.input else { return };
        let style = input.caret.style();

        if !caret.visible {
            let _ = style.set_property("display", "none");
            return;
        }

        Self::sync_measure_font(input);
        let value = input.field.value();
        let before: String = value.chars().take(caret.position).collect();
        input.measure.set_text_content(Some(&before));
        let left = input.field.offset_left() + input.measure.offset_width()
            - input.field.scroll_left();

        input.caret.set_text_content(Some(&caret.glyph));
        let _ = style.set_property("display", "inline-block");
        let _ = style.set_property("left", &format!("{}px", left));
        let _ = style.set_property("top", &format!("{}px", input.field.offset_top()));
    }

    fn remove_caret(&self) {
        if let Some(input) = &self.state.borrow().input {
            let _ = input.caret.style().set_property("display", "none");
            input.measure.set_text_content(None);
        }
    }

    fn render_menu(&self, menu: &MenuView) -> PlatformResult<()> {
        let existing = self.state.borrow().menus.get(&menu.id).cloned();
        if let Some(el) = existing {
            return self.fill_menu(&el, menu);
        }
        let el = self.element("div", "terminal-menu")?;
        self.fill_menu(&el, menu)?;
        self.push(&el)?;
        self.state.borrow_mut().menus.insert(menu.id, el);
        Ok(())
    }

    fn remove_menu(&self, id: MenuId) {
        if let Some(el) = self.state.borrow_mut().menus.remove(&id) {
            el.remove();
        }
    }
}
