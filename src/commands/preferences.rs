//! Language and theme commands
//!
//! Without an argument each command opens a menu; with one it applies the
//! value directly. `set lang <code>` is a hidden shortcut for `language`.

use super::CommandContext;
use crate::settings::{LANGUAGES, Settings, THEMES};
use crate::terminal::registry::{Category, CommandHandler, CommandRegistry, HelpText};
use crate::terminal::result::{CommandResult, MenuOption, MenuRequest};
use std::rc::Rc;

pub(super) fn register(registry: &CommandRegistry, ctx: &CommandContext) {
    let settings = Rc::clone(&ctx.settings);
    registry.register_with_category(
        "language",
        CommandHandler::sync(move |args| Ok(language(&settings, args.first()))),
        Category::Settings,
    );
    registry.register_help_text(
        "language",
        HelpText::new("Displays and changes the terminal language")
            .usage("language [language-code]")
            .example("language")
            .example("language en"),
    );

    let settings = Rc::clone(&ctx.settings);
    registry.register_hidden(
        "set lang",
        CommandHandler::sync(move |args| Ok(language(&settings, args.first()))),
    );
    registry.register_help_text(
        "set lang",
        HelpText::new("Sets the terminal language")
            .usage("set lang [language-code]")
            .example("set lang en")
            .example("set lang es"),
    );

    let settings = Rc::clone(&ctx.settings);
    registry.register_with_category(
        "theme",
        CommandHandler::sync(move |args| Ok(theme(&settings, args.first()))),
        Category::Settings,
    );
    registry.register_help_text(
        "theme",
        HelpText::new("Switches between the dark and light themes")
            .usage("theme [dark|light]")
            .example("theme")
            .example("theme light"),
    );
}

fn language(settings: &Rc<Settings>, code: Option<&String>) -> CommandResult {
    if let Some(code) = code {
        return match settings.set_language(code) {
            Ok(name) => CommandResult::success(language_changed(name)),
            Err(e) => CommandResult::error(e.to_string()),
        };
    }

    let current = settings.language();
    let options = LANGUAGES
        .iter()
        .map(|(code, name)| MenuOption::new(marked(name, *code == current), *code))
        .collect();
    let settings = Rc::clone(settings);
    MenuRequest::new("Select a language for the terminal", options)
        .on_select(move |code, _| {
            Some(match settings.set_language(code) {
                Ok(name) => language_changed(name),
                Err(e) => e.to_string(),
            })
        })
        .into()
}

fn theme(settings: &Rc<Settings>, name: Option<&String>) -> CommandResult {
    if let Some(name) = name {
        return match settings.set_theme(name) {
            Ok(display) => CommandResult::success(theme_changed(display)),
            Err(e) => CommandResult::error(e.to_string()),
        };
    }

    let current = settings.theme();
    let options = THEMES
        .iter()
        .map(|(name, display)| MenuOption::new(marked(display, *name == current), *name))
        .collect();
    let settings = Rc::clone(settings);
    MenuRequest::new("Select a theme", options)
        .on_select(move |name, _| {
            Some(match settings.set_theme(name) {
                Ok(display) => theme_changed(display),
                Err(e) => e.to_string(),
            })
        })
        .into()
}

fn language_changed(name: &str) -> String {
    format!("Language successfully changed to: {}", name)
}

fn theme_changed(name: &str) -> String {
    format!("Theme changed to: {}", name)
}

fn marked(label: &str, current: bool) -> String {
    if current {
        format!("{} (current)", label)
    } else {
        label.to_string()
    }
}
