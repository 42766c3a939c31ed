//! Session commands: `cls`, `history`

use super::CommandContext;
use crate::events::{Payload, topics};
use crate::terminal::registry::{Category, CommandHandler, CommandRegistry, HelpText};
use crate::terminal::result::{CommandResult, Control};
use std::fmt::Write;
use std::rc::{Rc, Weak};

pub(super) fn register(registry: &CommandRegistry, ctx: &CommandContext) {
    let bus = Rc::clone(&ctx.bus);
    registry.register_with_category(
        "cls",
        CommandHandler::sync(move |_| {
            bus.emit(topics::CLEAR, Payload::None);
            Ok(Control::silent().into())
        }),
        Category::Core,
    );
    registry.register_help_text(
        "cls",
        HelpText::new("Clears the terminal screen (alias of clear)")
            .usage("cls")
            .example("cls"),
    );

    let core = Weak::clone(&ctx.core);
    registry.register_with_category(
        "history",
        CommandHandler::sync(move |_| {
            let core = core
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("terminal session is gone"))?;
            Ok(format_history(&core.history()))
        }),
        Category::Tools,
    );
    registry.register_help_text(
        "history",
        HelpText::new("Lists the commands entered in this session")
            .usage("history")
            .example("history"),
    );
}

/// Newest first, numbered from 1
fn format_history(entries: &[String]) -> CommandResult {
    if entries.is_empty() {
        return CommandResult::warning("No commands in history");
    }
    let mut out = String::new();
    for (i, command) in entries.iter().enumerate() {
        let _ = writeln!(out, "{:5}  {}", i + 1, command);
    }
    out.pop();
    CommandResult::Text(out)
}
