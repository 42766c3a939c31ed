//! `help`

use super::CommandContext;
use crate::terminal::registry::{Category, CommandHandler, CommandRegistry, HelpText};
use crate::terminal::result::CommandResult;
use std::fmt::Write;
use std::rc::Weak;

pub(super) fn register(registry: &CommandRegistry, ctx: &CommandContext) {
    let weak = Weak::clone(&ctx.registry);
    registry.register_with_category(
        "help",
        CommandHandler::sync(move |args| {
            let registry = weak
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("command registry is gone"))?;
            Ok(CommandResult::Text(match args.first() {
                Some(name) => command_help(&registry, name),
                None => overview(&registry),
            }))
        }),
        Category::Core,
    );
    registry.register_help_text(
        "help",
        HelpText::new("Displays a list of all available commands")
            .usage("help [command-name]")
            .example("help")
            .example("help clear"),
    );
}

/// Detailed help for one command
fn command_help(registry: &CommandRegistry, name: &str) -> String {
    let name = name.trim().to_lowercase();
    let Some(help) = registry.get_help_text(&name) else {
        return format!("No help available for '{}'", name);
    };

    let mut out = format!("{} - {}\n\n", name.to_uppercase(), help.description);
    if let Some(usage) = &help.usage {
        let _ = write!(out, "Usage: {}\n\n", usage);
    }
    if !help.examples.is_empty() {
        out.push_str("Examples:\n");
        for example in &help.examples {
            let _ = writeln!(out, "  \u{203a} {}", example);
        }
    }
    out.trim_end().to_string()
}

/// Every visible command, grouped by category
fn overview(registry: &CommandRegistry) -> String {
    let mut out = String::from("Available commands:\n\n");
    for category in registry.get_all_categories() {
        let commands = registry.get_commands_by_category(category);
        if commands.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", category.title());
        for command in commands {
            match registry.get_help_text(&command) {
                Some(help) => {
                    let _ = writeln!(out, "  \u{203a} {} - {}", command, help.description);
                }
                None => {
                    let _ = writeln!(out, "  \u{203a} {}", command);
                }
            }
        }
        out.push('\n');
    }
    out.push_str("For more details on a specific command, type \"help command-name\"");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn registry() -> CommandRegistry {
        let reg = CommandRegistry::new(Rc::new(EventBus::new()));
        let noop = || CommandHandler::sync(|_| Ok(CommandResult::Empty));
        reg.register_with_category("help", noop(), Category::Core);
        reg.register_with_category("about", noop(), Category::Info);
        reg.register_with_category("links", noop(), Category::Info);
        reg.register_hidden("set lang", noop());
        reg.register_help_text("help", HelpText::new("Lists commands"));
        reg.register_help_text(
            "about",
            HelpText::new("About us").usage("about").example("about"),
        );
        reg
    }

    #[test]
    fn test_overview_groups_by_category() {
        let out = overview(&registry());
        assert_eq!(
            out,
            "Available commands:\n\n\
             Core:\n  \u{203a} help - Lists commands\n\n\
             Info:\n  \u{203a} about - About us\n  \u{203a} links\n\n\
             For more details on a specific command, type \"help command-name\""
        );
        assert!(!out.contains("set lang"));
    }

    #[test]
    fn test_command_help() {
        assert_eq!(
            command_help(&registry(), "ABOUT"),
            "ABOUT - About us\n\nUsage: about\n\nExamples:\n  \u{203a} about"
        );
    }

    #[test]
    fn test_missing_help() {
        assert_eq!(
            command_help(&registry(), "nope"),
            "No help available for 'nope'"
        );
    }
}
