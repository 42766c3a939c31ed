//! Inline menu
//!
//! A keyboard-driven option list rendered into the output stream. At most
//! one menu is active; showing another force-closes the current one and
//! removes it from the output. A resolved menu stays on screen, marked
//! final, as a record of the choice.

use super::input::KeyInput;
use super::result::{CancelCallback, MenuOption, MenuRequest, SelectCallback};
use crate::events::{EventBus, Payload, Subscription, topics};
use crate::platform::{MenuId, MenuPhase, MenuView, Surface};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Keys a menu understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    Up,
    Down,
    Enter,
    Escape,
    Char(char),
    Other,
}

impl MenuKey {
    /// Map a key press. Chords with Ctrl, Alt or Meta held mean nothing
    /// to a menu.
    pub fn from_input(key: &KeyInput) -> Self {
        if key.ctrl || key.alt || key.meta {
            return MenuKey::Other;
        }
        Self::from_key(&key.key)
    }

    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_key(key: &str) -> Self {
        match key {
            "ArrowUp" | "Up" => MenuKey::Up,
            "ArrowDown" | "Down" => MenuKey::Down,
            "Enter" => MenuKey::Enter,
            "Escape" | "Esc" => MenuKey::Escape,
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => MenuKey::Char(c),
                    _ => MenuKey::Other,
                }
            }
        }
    }
}

/// What a key press did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    /// No menu was active; the key belongs to someone else
    Inactive,
    /// Consumed by the active menu
    Handled,
    Selected {
        value: String,
        index: usize,
        /// Message returned by the selection callback
        message: Option<String>,
    },
    Cancelled,
}

struct ActiveMenu {
    id: MenuId,
    title: String,
    options: Vec<MenuOption>,
    selected: usize,
    on_select: Option<SelectCallback>,
    on_cancel: Option<CancelCallback>,
}

impl ActiveMenu {
    fn view(&self, phase: MenuPhase) -> MenuView {
        MenuView {
            id: self.id,
            title: self.title.clone(),
            labels: self.options.iter().map(|o| o.label.clone()).collect(),
            selected: self.selected,
            phase,
        }
    }
}

pub struct Menu {
    surface: Rc<dyn Surface>,
    bus: Rc<EventBus>,
    active: RefCell<Option<ActiveMenu>>,
    resolved: RefCell<Vec<MenuId>>,
    next_id: Cell<u32>,
}

impl Menu {
    pub fn new(surface: Rc<dyn Surface>, bus: Rc<EventBus>) -> Self {
        Self {
            surface,
            bus,
            active: RefCell::new(None),
            resolved: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Close every menu when the terminal is cleared
    pub fn attach(self: &Rc<Self>) -> Subscription {
        let menu: Weak<Self> = Rc::downgrade(self);
        self.bus.on(topics::CLEAR, move |_| {
            if let Some(menu) = menu.upgrade() {
                menu.close_all();
            }
            Ok(())
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.borrow().is_some()
    }

    /// Index currently highlighted in the active menu
    pub fn selected_index(&self) -> Option<usize> {
        self.active.borrow().as_ref().map(|m| m.selected)
    }

    /// Show a menu. Returns false if there was nothing to show.
    pub fn show(&self, request: MenuRequest) -> bool {
        if request.options.is_empty() {
            tracing::warn!(prompt = %request.prompt, "menu has no options");
            return false;
        }

        if let Some(previous) = self.active.borrow_mut().take() {
            tracing::debug!(menu = previous.id.0, "force-closing active menu");
            self.surface.remove_menu(previous.id);
        }

        let id = MenuId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let menu = ActiveMenu {
            id,
            title: format!(
                "{} (Use \u{2191}/\u{2193}, Enter to confirm, Esc to cancel):",
                request.prompt
            ),
            options: request.options,
            selected: 0,
            on_select: request.on_select,
            on_cancel: request.on_cancel,
        };

        if let Err(e) = self.surface.render_menu(&menu.view(MenuPhase::Active)) {
            tracing::error!("failed to render menu: {}", e);
            self.bus.emit(topics::MENU_ACTIVE, Payload::Flag(false));
            return false;
        }
        *self.active.borrow_mut() = Some(menu);
        self.surface.scroll_to_bottom();
        self.bus.emit(topics::MENU_ACTIVE, Payload::Flag(true));
        true
    }

    pub fn handle_key(&self, key: MenuKey) -> MenuOutcome {
        match key {
            MenuKey::Enter => return self.select(),
            MenuKey::Escape => return self.cancel(),
            _ => {}
        }

        let view = {
            let mut active = self.active.borrow_mut();
            let Some(menu) = active.as_mut() else {
                return MenuOutcome::Inactive;
            };
            let len = menu.options.len();
            match key {
                MenuKey::Up => menu.selected = (menu.selected + len - 1) % len,
                MenuKey::Down => menu.selected = (menu.selected + 1) % len,
                MenuKey::Char(c) if c.is_alphanumeric() => {
                    let needle = c.to_lowercase().to_string();
                    if let Some(i) = menu
                        .options
                        .iter()
                        .position(|o| o.label.to_lowercase().starts_with(&needle))
                    {
                        menu.selected = i;
                    }
                }
                _ => {}
            }
            menu.view(MenuPhase::Active)
        };

        if let Err(e) = self.surface.render_menu(&view) {
            tracing::warn!("failed to redraw menu: {}", e);
        }
        MenuOutcome::Handled
    }

    fn select(&self) -> MenuOutcome {
        let Some(mut menu) = self.active.borrow_mut().take() else {
            return MenuOutcome::Inactive;
        };
        self.finish(&menu, MenuPhase::Selected);

        let index = menu.selected;
        let value = menu.options[index].value.clone();
        self.bus.emit(
            topics::MENU_SELECTED,
            Payload::Selection {
                value: value.clone(),
                index,
            },
        );
        let message = menu.on_select.take().and_then(|f| f(&value, index));
        MenuOutcome::Selected {
            value,
            index,
            message,
        }
    }

    fn cancel(&self) -> MenuOutcome {
        let Some(mut menu) = self.active.borrow_mut().take() else {
            return MenuOutcome::Inactive;
        };
        self.finish(&menu, MenuPhase::Cancelled);
        self.bus.emit(topics::MENU_CANCELLED, Payload::None);
        if let Some(f) = menu.on_cancel.take() {
            f();
        }
        MenuOutcome::Cancelled
    }

    fn finish(&self, menu: &ActiveMenu, phase: MenuPhase) {
        if let Err(e) = self.surface.render_menu(&menu.view(phase)) {
            tracing::warn!("failed to finalize menu: {}", e);
        }
        self.resolved.borrow_mut().push(menu.id);
        self.bus.emit(topics::MENU_ACTIVE, Payload::Flag(false));
    }

    /// Drop the active menu without callbacks and remove every menu from
    /// the output
    pub fn close_all(&self) {
        let active = self.active.borrow_mut().take();
        let resolved = std::mem::take(&mut *self.resolved.borrow_mut());
        let was_active = active.is_some();
        for id in active.map(|m| m.id).into_iter().chain(resolved) {
            self.surface.remove_menu(id);
        }
        if was_active {
            self.bus.emit(topics::MENU_ACTIVE, Payload::Flag(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemorySurface;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn languages() -> Vec<MenuOption> {
        vec![
            MenuOption::new("English", "en"),
            MenuOption::new("Español", "es"),
            MenuOption::new("Deutsch", "de"),
        ]
    }

    fn setup() -> (Rc<MemorySurface>, Rc<EventBus>, Menu) {
        let surface = Rc::new(MemorySurface::new());
        let bus = Rc::new(EventBus::new());
        let menu = Menu::new(surface.clone(), Rc::clone(&bus));
        (surface, bus, menu)
    }

    #[test]
    fn test_show_renders_title_and_options() {
        let (surface, _, menu) = setup();
        assert!(menu.show(MenuRequest::new("Select language", languages())));

        let views = surface.active_menus();
        assert_eq!(views.len(), 1);
        assert_eq!(
            views[0].title,
            "Select language (Use ↑/↓, Enter to confirm, Esc to cancel):"
        );
        assert_eq!(views[0].labels, vec!["English", "Español", "Deutsch"]);
    }

    #[test]
    fn test_empty_menu_not_shown() {
        let (surface, _, menu) = setup();
        assert!(!menu.show(MenuRequest::new("nothing", vec![])));
        assert!(!menu.is_active());
        assert!(surface.menus().is_empty());
    }

    #[test]
    fn test_second_show_replaces_first() {
        let (surface, _, menu) = setup();
        menu.show(MenuRequest::new("first", languages()));
        let first = surface.menus()[0].id;

        menu.show(MenuRequest::new("second", languages()));
        let menus = surface.menus();
        assert_eq!(menus.len(), 1);
        assert_ne!(menus[0].id, first);
        assert!(menus[0].title.starts_with("second"));
        assert_eq!(surface.active_menus().len(), 1);
    }

    #[test_case(&[MenuKey::Down], 1 ; "down")]
    #[test_case(&[MenuKey::Up], 2 ; "up wraps to last")]
    #[test_case(&[MenuKey::Down, MenuKey::Down, MenuKey::Down], 0 ; "down wraps to first")]
    #[test_case(&[MenuKey::Char('D')], 2 ; "jump is case insensitive")]
    #[test_case(&[MenuKey::Char('e')], 0 ; "jump picks first match")]
    #[test_case(&[MenuKey::Char('z')], 0 ; "no match keeps selection")]
    #[test_case(&[MenuKey::Char('?')], 0 ; "punctuation ignored")]
    fn test_navigation(keys: &[MenuKey], expected: usize) {
        let (_, _, menu) = setup();
        menu.show(MenuRequest::new("pick", languages()));
        for key in keys {
            assert_eq!(menu.handle_key(*key), MenuOutcome::Handled);
        }
        assert_eq!(menu.selected_index(), Some(expected));
    }

    #[test]
    fn test_enter_selects_and_keeps_final_dom() {
        let (surface, bus, menu) = setup();
        let picked = Rc::new(RefCell::new(None));
        let p = Rc::clone(&picked);
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        bus.on(topics::MENU_SELECTED, move |payload| {
            if let Payload::Selection { value, index } = payload {
                e.borrow_mut().push((value.clone(), *index));
            }
            Ok(())
        });

        menu.show(MenuRequest::new("pick", languages()).on_select(move |value, index| {
            *p.borrow_mut() = Some((value.to_string(), index));
            Some(format!("picked {}", value))
        }));
        menu.handle_key(MenuKey::Down);
        let outcome = menu.handle_key(MenuKey::Enter);

        assert_eq!(
            outcome,
            MenuOutcome::Selected {
                value: "es".into(),
                index: 1,
                message: Some("picked es".into()),
            }
        );
        assert_eq!(*picked.borrow(), Some(("es".to_string(), 1)));
        assert_eq!(*events.borrow(), vec![("es".to_string(), 1)]);
        assert!(!menu.is_active());

        let menus = surface.menus();
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].phase, MenuPhase::Selected);
        assert_eq!(menus[0].selected, 1);
    }

    #[test]
    fn test_escape_cancels() {
        let (surface, bus, menu) = setup();
        let cancelled = Rc::new(Cell::new(false));
        let c = Rc::clone(&cancelled);
        let announced = Rc::new(Cell::new(false));
        let a = Rc::clone(&announced);
        bus.on(topics::MENU_CANCELLED, move |_| {
            a.set(true);
            Ok(())
        });

        menu.show(MenuRequest::new("pick", languages()).on_cancel(move || c.set(true)));
        assert_eq!(menu.handle_key(MenuKey::Escape), MenuOutcome::Cancelled);
        assert!(cancelled.get());
        assert!(announced.get());
        assert_eq!(surface.menus()[0].phase, MenuPhase::Cancelled);
    }

    #[test]
    fn test_active_flag_events() {
        let (_, bus, menu) = setup();
        let flags = Rc::new(RefCell::new(Vec::new()));
        let f = Rc::clone(&flags);
        bus.on(topics::MENU_ACTIVE, move |payload| {
            if let Payload::Flag(b) = payload {
                f.borrow_mut().push(*b);
            }
            Ok(())
        });

        menu.show(MenuRequest::new("pick", languages()));
        menu.handle_key(MenuKey::Enter);
        assert_eq!(*flags.borrow(), vec![true, false]);
    }

    #[test]
    fn test_keys_without_menu() {
        let (_, _, menu) = setup();
        assert_eq!(menu.handle_key(MenuKey::Down), MenuOutcome::Inactive);
        assert_eq!(menu.handle_key(MenuKey::Enter), MenuOutcome::Inactive);
    }

    #[test]
    fn test_clear_closes_everything() {
        let (surface, bus, menu) = setup();
        let menu = Rc::new(menu);
        let _sub = menu.attach();

        menu.show(MenuRequest::new("one", languages()));
        menu.handle_key(MenuKey::Enter);
        menu.show(MenuRequest::new("two", languages()));

        bus.emit(topics::CLEAR, Payload::None);
        assert!(!menu.is_active());
        assert!(surface.menus().is_empty());
    }

    #[test_case("ArrowUp", MenuKey::Up)]
    #[test_case("ArrowDown", MenuKey::Down)]
    #[test_case("Enter", MenuKey::Enter)]
    #[test_case("Escape", MenuKey::Escape)]
    #[test_case("e", MenuKey::Char('e'))]
    #[test_case("Shift", MenuKey::Other)]
    fn test_from_key(key: &str, expected: MenuKey) {
        assert_eq!(MenuKey::from_key(key), expected);
    }

    #[test_case(KeyInput::ctrl("l"), MenuKey::Other ; "ctrl l")]
    #[test_case(KeyInput::ctrl("c"), MenuKey::Other ; "ctrl c")]
    #[test_case(KeyInput { key: "d".into(), meta: true, ..KeyInput::default() }, MenuKey::Other ; "meta d")]
    #[test_case(KeyInput { key: "L".into(), shift: true, ..KeyInput::default() }, MenuKey::Char('L') ; "shift keeps letter")]
    fn test_from_input(key: KeyInput, expected: MenuKey) {
        assert_eq!(MenuKey::from_input(&key), expected);
    }

    #[test]
    fn test_modified_letter_does_not_jump() {
        let (_, _, menu) = setup();
        menu.show(MenuRequest::new("pick", languages()));
        assert_eq!(
            menu.handle_key(MenuKey::from_input(&KeyInput::ctrl("d"))),
            MenuOutcome::Handled
        );
        assert_eq!(menu.selected_index(), Some(0));
    }
}
