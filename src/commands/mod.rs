//! Command set
//!
//! The startup registration list. Each submodule contributes a handful of
//! commands and their help text; the registry never imports them.
//!
//! - `help`: listings built from the registry itself
//! - `info`: static content pages (about, links, legal)
//! - `preferences`: language and theme, including `set lang <code>`
//! - `session`: cls, history

mod help;
mod info;
mod preferences;
mod session;

use crate::events::EventBus;
use crate::settings::Settings;
use crate::terminal::core::TerminalCore;
use crate::terminal::registry::{CommandRegistry, HelpText};
use std::rc::{Rc, Weak};

/// What command handlers may reach
#[derive(Clone)]
pub struct CommandContext {
    pub registry: Weak<CommandRegistry>,
    pub core: Weak<TerminalCore>,
    pub settings: Rc<Settings>,
    pub bus: Rc<EventBus>,
}

/// Register every command shipped with the terminal
pub fn register_all(registry: &CommandRegistry, ctx: &CommandContext) {
    help::register(registry, ctx);
    info::register(registry);
    preferences::register(registry, ctx);
    session::register(registry, ctx);

    // Built-ins live in the controller but are documented here
    registry.register_help_text(
        "clear",
        HelpText::new("Clears the terminal screen")
            .usage("clear")
            .example("clear"),
    );
    registry.register_help_text(
        "version",
        HelpText::new("Shows the terminal version")
            .usage("version")
            .example("version"),
    );

    tracing::debug!(
        commands = registry.get_all_command_names().len(),
        "commands registered"
    );
}
