//! Boot sequence
//!
//! Read the page config, start logging, mount the DOM surface, build the
//! terminal and hand it to the runtime. Any failure leaves a message in the
//! console and an otherwise untouched page.

use crate::app::Terminal;
use crate::config::Config;
use crate::events::topics;
use crate::logging;
use crate::platform::web::{self, DomSurface, LocalStore, WebScheduler};
use crate::platform::{KeyValueStore, PlatformResult, Scheduler, Surface};
use crate::runtime;
use std::rc::Rc;

/// Id of the element the terminal mounts into
pub const TERMINAL_ELEMENT_ID: &str = "terminal";

/// Boot the terminal
pub fn boot() {
    let config = web::read_config();
    let level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    logging::init(&level);

    let config = config.unwrap_or_else(|e| {
        tracing::warn!("{}; using defaults", e);
        Config::default()
    });

    if let Err(e) = start(config) {
        tracing::error!("boot failed: {}", e);
    }
}

fn start(config: Config) -> PlatformResult<()> {
    let surface = Rc::new(DomSurface::mount(TERMINAL_ELEMENT_ID)?);
    let container = surface.container().clone();
    let terminal = Terminal::new(
        config,
        surface as Rc<dyn Surface>,
        Rc::new(WebScheduler::new()) as Rc<dyn Scheduler>,
        Rc::new(LocalStore::new()) as Rc<dyn KeyValueStore>,
    );

    web::apply_theme(&terminal.settings.theme())?;
    web::apply_language(&terminal.settings.language())?;
    terminal.bus.on(topics::THEME_CHANGED, |payload| {
        if let Some(theme) = payload.as_text() {
            web::apply_theme(theme)?;
        }
        Ok(())
    });
    terminal.bus.on(topics::LANGUAGE_CHANGED, |payload| {
        if let Some(code) = payload.as_text() {
            web::apply_language(code)?;
        }
        Ok(())
    });

    terminal.init()?;
    runtime::start(terminal, &container);
    tracing::info!("booted");
    Ok(())
}
