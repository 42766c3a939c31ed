//! Composition root
//!
//! Builds every terminal component over one event bus and a set of
//! platform services, then wires them together in [`Terminal::init`].
//! Components hold each other through `Rc` and subscribe to the bus with
//! `Weak` back-references, so dropping the `Terminal` (after `dispose`)
//! releases everything.

use crate::commands::{self, CommandContext};
use crate::config::Config;
use crate::events::{EventBus, Subscription};
use crate::platform::memory::{ManualScheduler, MemoryStore, MemorySurface};
use crate::platform::{KeyValueStore, PlatformResult, Scheduler, Surface};
use crate::settings::Settings;
use crate::terminal::controller::TerminalController;
use crate::terminal::core::TerminalCore;
use crate::terminal::input::{InputHandler, KeyDisposition, KeyInput};
use crate::terminal::menu::{Menu, MenuKey};
use crate::terminal::registry::CommandRegistry;
use crate::terminal::view::TerminalView;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct Terminal {
    pub config: Config,
    pub bus: Rc<EventBus>,
    pub registry: Rc<CommandRegistry>,
    pub core: Rc<TerminalCore>,
    pub menu: Rc<Menu>,
    pub view: Rc<TerminalView>,
    pub input: Rc<InputHandler>,
    pub controller: Rc<TerminalController>,
    pub settings: Rc<Settings>,
    scheduler: Rc<dyn Scheduler>,
    subscriptions: RefCell<Vec<Subscription>>,
    initialized: Cell<bool>,
}

impl Terminal {
    pub fn new(
        config: Config,
        surface: Rc<dyn Surface>,
        scheduler: Rc<dyn Scheduler>,
        store: Rc<dyn KeyValueStore>,
    ) -> Rc<Self> {
        let bus = Rc::new(EventBus::new());
        let settings = Rc::new(Settings::load(store, Rc::clone(&bus)));
        let registry = Rc::new(CommandRegistry::new(Rc::clone(&bus)));
        let core = Rc::new(TerminalCore::new(
            Rc::clone(&bus),
            config.prompt(),
            config.greeting.clone(),
            config.history_size,
        ));
        let menu = Rc::new(Menu::new(Rc::clone(&surface), Rc::clone(&bus)));
        let view = Rc::new(TerminalView::new(
            surface,
            Rc::clone(&scheduler),
            Rc::clone(&bus),
            Rc::clone(&core),
            Rc::clone(&menu),
            &config,
        ));
        let input = Rc::new(InputHandler::new(Rc::clone(&bus), Rc::clone(&view)));
        let controller = Rc::new(TerminalController::new(
            Rc::clone(&bus),
            Rc::clone(&core),
            Rc::clone(&registry),
            Rc::clone(&view),
            Rc::clone(&scheduler),
            config.version_banner(),
        ));

        Rc::new(Self {
            config,
            bus,
            registry,
            core,
            menu,
            view,
            input,
            controller,
            settings,
            scheduler,
            subscriptions: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        })
    }

    /// Wire subscriptions, register commands and draw the first prompt.
    /// Calling it again is a no-op.
    pub fn init(&self) -> PlatformResult<()> {
        if self.initialized.replace(true) {
            return Ok(());
        }
        self.bus.set_debug_mode(self.config.debug_events);

        let mut subscriptions = vec![
            self.registry.attach(),
            self.core.attach(),
            self.menu.attach(),
            self.input.attach(),
        ];
        subscriptions.extend(self.view.attach());
        subscriptions.extend(self.controller.attach());
        *self.subscriptions.borrow_mut() = subscriptions;

        let ctx = CommandContext {
            registry: Rc::downgrade(&self.registry),
            core: Rc::downgrade(&self.core),
            settings: Rc::clone(&self.settings),
            bus: Rc::clone(&self.bus),
        };
        commands::register_all(&self.registry, &ctx);

        self.view.show_greeting()?;
        self.view.create_input_line()?;
        tracing::info!(
            version = %self.config.version,
            language = %self.settings.language(),
            "terminal ready"
        );
        Ok(())
    }

    /// Drop every subscription, close menus and remove the input line
    pub fn dispose(&self) {
        if !self.initialized.replace(false) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for subscription in &subscriptions {
            self.bus.off(subscription);
        }
        self.menu.close_all();
        self.view.teardown();
        tracing::debug!(released = subscriptions.len(), "terminal disposed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Submit a command as if typed and confirmed
    pub fn submit(&self, raw: &str) -> bool {
        self.controller.handle_submission(raw)
    }

    /// Route a key press to the active menu or the input handler
    pub fn handle_key(&self, key: &KeyInput) -> KeyDisposition {
        if self.view.menu_active() {
            let view = Rc::clone(&self.view);
            let key = MenuKey::from_input(key);
            self.scheduler.spawn(Box::pin(async move {
                view.menu_key(key).await;
            }));
            return KeyDisposition::Handled;
        }
        self.input.handle_key(key)
    }
}

/// A fully initialized terminal over the in-memory platform
pub struct HeadlessTerminal {
    pub terminal: Rc<Terminal>,
    pub surface: Rc<MemorySurface>,
    pub scheduler: Rc<ManualScheduler>,
    pub store: Rc<MemoryStore>,
}

impl HeadlessTerminal {
    pub fn new(config: Config) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    /// Start with preloaded settings
    pub fn with_store(config: Config, store: MemoryStore) -> Self {
        let surface = Rc::new(MemorySurface::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let store = Rc::new(store);
        let terminal = Terminal::new(
            config,
            Rc::clone(&surface) as Rc<dyn Surface>,
            Rc::clone(&scheduler) as Rc<dyn Scheduler>,
            Rc::clone(&store) as Rc<dyn KeyValueStore>,
        );
        if let Err(e) = terminal.init() {
            tracing::error!("headless terminal failed to start: {}", e);
        }
        Self {
            terminal,
            surface,
            scheduler,
            store,
        }
    }

    /// Type a line and press Enter, then run spawned work to completion
    pub fn enter(&self, line: &str) {
        self.surface.type_text(line);
        self.press(KeyInput::new("Enter"));
    }

    /// Press a key and run spawned work to completion
    pub fn press(&self, key: KeyInput) -> KeyDisposition {
        let disposition = self.terminal.handle_key(&key);
        self.scheduler.run_until_stalled();
        disposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::topics;

    #[test]
    fn test_init_is_idempotent() {
        let h = HeadlessTerminal::new(Config::default());
        let listeners = h.terminal.bus.listener_count(topics::INPUT_SUBMIT);
        let created = h.surface.input_lines_created();

        h.terminal.init().unwrap();
        assert_eq!(h.terminal.bus.listener_count(topics::INPUT_SUBMIT), listeners);
        assert_eq!(h.surface.input_lines_created(), created);
    }

    #[test]
    fn test_init_draws_greeting_and_prompt() {
        let h = HeadlessTerminal::new(Config::default());
        assert_eq!(
            h.surface.greeting().as_deref(),
            Some("Welcome to the abyss. Type [help] to interact.")
        );
        assert_eq!(h.surface.prompt().as_deref(), Some("anonymous: "));
        assert!(h.surface.is_input_focused());
    }

    #[test]
    fn test_dispose_releases_subscriptions() {
        let h = HeadlessTerminal::new(Config::default());
        h.terminal.dispose();
        assert!(!h.terminal.is_initialized());
        assert_eq!(h.terminal.bus.listener_count(topics::INPUT_SUBMIT), 0);
        assert_eq!(h.terminal.bus.listener_count(topics::CLEAR), 0);
        assert!(!h.terminal.view.has_input_line());
        assert_eq!(h.scheduler.active_timers(), 0);
    }
}
