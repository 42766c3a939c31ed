//! Command registry
//!
//! Maps normalized command names to handlers plus metadata:
//! - category bookkeeping (a visible command lives in exactly one category)
//! - hidden commands, matched by input prefix instead of exact name
//! - help text, keyed separately and allowed without a runnable command
//!
//! Every lookup hands out an [`Invoker`] that normalizes the handler's
//! result and turns handler errors into an error line.

use super::parser;
use super::result::CommandResult;
use crate::events::{EventBus, Payload, Subscription, topics};
use futures::future::LocalBoxFuture;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

/// Future returned by a command handler
pub type CommandFuture = LocalBoxFuture<'static, anyhow::Result<CommandResult>>;

/// A callable command body, sync or async
#[derive(Clone)]
pub struct CommandHandler(Rc<dyn Fn(Vec<String>) -> CommandFuture>);

impl CommandHandler {
    /// Wrap a synchronous handler
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&[String]) -> anyhow::Result<CommandResult> + 'static,
    {
        Self(Rc::new(move |args: Vec<String>| {
            let result = f(&args);
            Box::pin(async move { result })
        }))
    }

    /// Wrap an asynchronous handler
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<CommandResult>> + 'static,
    {
        Self(Rc::new(move |args: Vec<String>| Box::pin(f(args))))
    }

    pub fn call(&self, args: Vec<String>) -> CommandFuture {
        (self.0)(args)
    }
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommandHandler(..)")
    }
}

/// Help listing groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Info,
    Tools,
    Settings,
    Web3,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Core,
        Category::Info,
        Category::Tools,
        Category::Settings,
        Category::Web3,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Info => "info",
            Category::Tools => "tools",
            Category::Settings => "settings",
            Category::Web3 => "web3",
            Category::Other => "other",
        }
    }

    /// Display form: first letter upper-cased
    pub fn title(self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// A registration request, as carried by `command:register`
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub handler: Option<CommandHandler>,
    pub category: Option<Category>,
    pub hidden: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, handler: CommandHandler) -> Self {
        Self {
            name: name.into(),
            handler: Some(handler),
            category: None,
            hidden: false,
        }
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Documentation for a command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelpText {
    pub description: String,
    pub usage: Option<String>,
    pub examples: Vec<String>,
}

impl HelpText {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Wrapped handler returned by lookups
#[derive(Debug, Clone)]
pub struct Invoker {
    name: String,
    handler: CommandHandler,
}

impl Invoker {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler. Never fails: errors become an error line.
    pub async fn invoke(&self, args: Vec<String>) -> CommandResult {
        match self.handler.call(args).await {
            Ok(result) => result.normalize(),
            Err(e) => {
                tracing::error!(command = %self.name, "command failed: {:#}", e);
                CommandResult::error(format!("Error executing command: {}", e))
            }
        }
    }
}

/// Result of a hidden-command prefix match
#[derive(Debug, Clone)]
pub struct HiddenMatch {
    /// The hidden command key that matched, e.g. `set lang`
    pub key: String,
    /// Raw input as submitted
    pub input: String,
    /// Tokens following the key
    pub args: Vec<String>,
    pub invoker: Invoker,
}

struct Entry {
    handler: CommandHandler,
    hidden: bool,
}

pub struct CommandRegistry {
    commands: RefCell<HashMap<String, Entry>>,
    help: RefCell<HashMap<String, HelpText>>,
    categories: RefCell<BTreeMap<Category, Vec<String>>>,
    bus: Rc<EventBus>,
}

/// Trim, lowercase and collapse inner whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandRegistry {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            commands: RefCell::new(HashMap::new()),
            help: RefCell::new(HashMap::new()),
            categories: RefCell::new(BTreeMap::new()),
            bus,
        }
    }

    /// Listen for `command:register` requests on the bus
    pub fn attach(self: &Rc<Self>) -> Subscription {
        let registry: Weak<Self> = Rc::downgrade(self);
        self.bus.on(topics::COMMAND_REGISTER, move |payload| {
            let Some(registry) = registry.upgrade() else {
                return Ok(());
            };
            match payload {
                Payload::Register(spec) => {
                    registry.register_spec(spec.clone());
                    Ok(())
                }
                other => anyhow::bail!("unexpected register payload: {:?}", other),
            }
        })
    }

    /// Register a visible command in the `other` category
    pub fn register(&self, name: &str, handler: CommandHandler) -> bool {
        self.register_spec(CommandSpec::new(name, handler))
    }

    /// Register a hidden, prefix-matched command
    pub fn register_hidden(&self, name: &str, handler: CommandHandler) -> bool {
        self.register_spec(CommandSpec::new(name, handler).hidden())
    }

    pub fn register_with_category(
        &self,
        name: &str,
        handler: CommandHandler,
        category: Category,
    ) -> bool {
        self.register_spec(CommandSpec::new(name, handler).category(category))
    }

    /// Register from a full spec. Invalid specs are logged and ignored.
    pub fn register_spec(&self, spec: CommandSpec) -> bool {
        let name = normalize_name(&spec.name);
        if name.is_empty() {
            tracing::warn!(raw = %spec.name, "rejected command registration: empty name");
            return false;
        }
        let Some(handler) = spec.handler else {
            tracing::warn!(command = %name, "rejected command registration: no handler");
            return false;
        };

        if self.commands.borrow().contains_key(&name) {
            tracing::debug!(command = %name, "replacing existing command");
        }
        self.commands.borrow_mut().insert(
            name.clone(),
            Entry {
                handler,
                hidden: spec.hidden,
            },
        );

        self.remove_from_categories(&name);
        if !spec.hidden {
            let category = spec.category.unwrap_or(Category::Other);
            let mut categories = self.categories.borrow_mut();
            let list = categories.entry(category).or_default();
            list.push(name.clone());
            list.sort();
        }

        tracing::trace!(command = %name, hidden = spec.hidden, "registered");
        self.bus.emit(topics::COMMAND_REGISTERED, Payload::Text(name));
        true
    }

    fn remove_from_categories(&self, name: &str) {
        let mut categories = self.categories.borrow_mut();
        for list in categories.values_mut() {
            list.retain(|n| n != name);
        }
        categories.retain(|_, list| !list.is_empty());
    }

    /// Attach documentation. The command does not need to exist.
    pub fn register_help_text(&self, name: &str, help: HelpText) {
        let name = normalize_name(name);
        if name.is_empty() {
            tracing::warn!("rejected help text with empty command name");
            return;
        }
        self.help.borrow_mut().insert(name, help);
    }

    pub fn get_help_text(&self, name: &str) -> Option<HelpText> {
        self.help.borrow().get(&normalize_name(name)).cloned()
    }

    /// Look up a command by name (case and whitespace insensitive)
    pub fn get_command(&self, name: &str) -> Option<Invoker> {
        let name = normalize_name(name);
        self.commands.borrow().get(&name).map(|entry| Invoker {
            name: name.clone(),
            handler: entry.handler.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.borrow().contains_key(&normalize_name(name))
    }

    /// Match raw input against hidden command keys by word prefix.
    /// The longest matching key wins.
    pub fn match_hidden_command(&self, raw: &str) -> Option<HiddenMatch> {
        let input = normalize_name(raw);
        if input.is_empty() {
            return None;
        }

        let commands = self.commands.borrow();
        let (key, entry) = commands
            .iter()
            .filter(|(_, e)| e.hidden)
            .filter(|(key, _)| {
                input == **key
                    || input
                        .strip_prefix(key.as_str())
                        .is_some_and(|rest| rest.starts_with(' '))
            })
            .max_by_key(|(key, _)| key.len())?;

        let key_words = key.split(' ').count();
        Some(HiddenMatch {
            key: key.clone(),
            input: raw.to_string(),
            args: parser::tokenize(raw).into_iter().skip(key_words).collect(),
            invoker: Invoker {
                name: key.clone(),
                handler: entry.handler.clone(),
            },
        })
    }

    /// Visible command names, sorted
    pub fn get_all_command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .borrow()
            .iter()
            .filter(|(_, e)| !e.hidden)
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Commands in a category, sorted
    pub fn get_commands_by_category(&self, category: Category) -> Vec<String> {
        self.categories
            .borrow()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all_categories(&self) -> Vec<Category> {
        Category::ALL.to_vec()
    }

    /// Category a visible command currently belongs to
    pub fn category_of(&self, name: &str) -> Option<Category> {
        let name = normalize_name(name);
        self.categories
            .borrow()
            .iter()
            .find(|(_, list)| list.contains(&name))
            .map(|(c, _)| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::result::OutputItem;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(Rc::new(EventBus::new()))
    }

    fn echo() -> CommandHandler {
        CommandHandler::sync(|args| Ok(CommandResult::Text(args.join(" "))))
    }

    fn run(invoker: &Invoker, args: &[&str]) -> CommandResult {
        block_on(invoker.invoke(args.iter().map(|s| s.to_string()).collect()))
    }

    fn texts(result: CommandResult) -> Vec<String> {
        match result {
            CommandResult::Items(items) => items
                .into_iter()
                .map(|i| match i {
                    OutputItem::Text(t) | OutputItem::Styled { text: t, .. } => t,
                    other => format!("{:?}", other),
                })
                .collect(),
            other => panic!("expected items, got {:?}", other),
        }
    }

    #[test_case("About" ; "capitalized")]
    #[test_case(" about " ; "padded")]
    #[test_case("ABOUT" ; "upper")]
    #[test_case("about" ; "exact")]
    fn test_lookup_is_case_and_whitespace_insensitive(name: &str) {
        let reg = registry();
        assert!(reg.register("about", echo()));
        let invoker = reg.get_command(name).expect("command found");
        assert_eq!(invoker.name(), "about");
    }

    #[test]
    fn test_register_normalizes_name() {
        let reg = registry();
        reg.register("  HeLLo ", echo());
        assert_eq!(reg.get_all_command_names(), vec!["hello"]);
    }

    #[test]
    fn test_invalid_registration_is_ignored() {
        let reg = registry();
        assert!(!reg.register("   ", echo()));
        assert!(!reg.register_spec(CommandSpec {
            name: "nohandler".into(),
            handler: None,
            category: None,
            hidden: false,
        }));
        assert!(reg.get_all_command_names().is_empty());

        // still usable afterwards
        assert!(reg.register("ok", echo()));
        assert!(reg.contains("ok"));
    }

    #[test]
    fn test_string_result_becomes_lines() {
        let reg = registry();
        reg.register("multi", CommandHandler::sync(|_| Ok("one\ntwo".into())));
        let out = run(&reg.get_command("multi").unwrap(), &[]);
        assert_eq!(texts(out), vec!["one", "two"]);
    }

    #[test]
    fn test_handler_error_becomes_error_line() {
        let reg = registry();
        reg.register("boom", CommandHandler::sync(|_| anyhow::bail!("kaput")));
        let out = run(&reg.get_command("boom").unwrap(), &[]);
        assert_eq!(texts(out), vec!["Error executing command: kaput"]);
    }

    #[test]
    fn test_async_handler() {
        let reg = registry();
        reg.register(
            "later",
            CommandHandler::from_async(|args: Vec<String>| async move {
                Ok(CommandResult::Text(format!("got {}", args.len())))
            }),
        );
        let out = run(&reg.get_command("later").unwrap(), &["a", "b"]);
        assert_eq!(texts(out), vec!["got 2"]);
    }

    #[test]
    fn test_hidden_prefix_matching() {
        let reg = registry();
        reg.register_hidden("set lang", echo());

        let m = reg.match_hidden_command("set lang en").expect("matches");
        assert_eq!(m.key, "set lang");
        assert_eq!(m.args, vec!["en"]);
        assert_eq!(m.input, "set lang en");

        assert!(reg.match_hidden_command("setlang en").is_none());
        assert!(reg.match_hidden_command("set language en").is_none());
        assert!(reg.match_hidden_command("SET  LANG es").is_some());
        assert!(reg.match_hidden_command("set lang").is_some());
    }

    #[test]
    fn test_longest_hidden_key_wins() {
        let reg = registry();
        reg.register_hidden("set", echo());
        reg.register_hidden("set lang", echo());
        let m = reg.match_hidden_command("set lang es").unwrap();
        assert_eq!(m.key, "set lang");
        assert_eq!(m.args, vec!["es"]);
    }

    #[test]
    fn test_hidden_commands_not_listed() {
        let reg = registry();
        reg.register_hidden("set lang", echo());
        reg.register("help", echo());
        assert_eq!(reg.get_all_command_names(), vec!["help"]);
        assert_eq!(reg.get_commands_by_category(Category::Other), vec!["help"]);
    }

    #[test]
    fn test_reregistration_moves_category() {
        let reg = registry();
        reg.register_with_category("language", echo(), Category::Tools);
        reg.register_with_category("language", echo(), Category::Settings);

        assert!(reg.get_commands_by_category(Category::Tools).is_empty());
        assert_eq!(
            reg.get_commands_by_category(Category::Settings),
            vec!["language"]
        );
        assert_eq!(reg.category_of("language"), Some(Category::Settings));
    }

    #[test]
    fn test_help_text_without_command() {
        let reg = registry();
        reg.register_help_text("Version", HelpText::new("Shows the version"));
        assert_eq!(
            reg.get_help_text("version").map(|h| h.description),
            Some("Shows the version".to_string())
        );
        assert!(reg.get_command("version").is_none());
    }

    #[test]
    fn test_register_via_bus() {
        let bus = Rc::new(EventBus::new());
        let reg = Rc::new(CommandRegistry::new(Rc::clone(&bus)));
        let _sub = reg.attach();

        let acks = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&acks);
        bus.on(topics::COMMAND_REGISTERED, move |p| {
            a.borrow_mut().push(p.as_text().unwrap_or_default().to_string());
            Ok(())
        });

        bus.emit(
            topics::COMMAND_REGISTER,
            Payload::Register(CommandSpec::new("Links", echo()).category(Category::Info)),
        );
        assert!(reg.contains("links"));
        assert_eq!(reg.category_of("links"), Some(Category::Info));
        assert_eq!(*acks.borrow(), vec!["links"]);
    }

    #[test]
    fn test_category_title() {
        assert_eq!(Category::Web3.title(), "Web3");
        assert_eq!(Category::Core.title(), "Core");
    }
}
