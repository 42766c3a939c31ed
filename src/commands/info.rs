//! Static content pages

use crate::terminal::registry::{Category, CommandHandler, CommandRegistry, HelpText};
use crate::terminal::result::CommandResult;

const ABOUT: &str = "SIMPLETS is the cult of digital awakening:\n\
An inclusive decentralized community where A.I. and analog souls unite.\n\
Built on codes, from character to character.";

const LINKS: &str = r#"<strong>SIMPLETS Links</strong><br>
<span class="terminal-styled-text">
- <span class="terminal-command">Website</span>: https://simplets.tech<br>
- <span class="terminal-command">GitHub</span>: https://github.com/simplets-git<br>
- <span class="terminal-command">Twitter</span>: @SIMPLETS_tech<br>
</span>"#;

const LEGAL: &str = r#"<strong>Legal Notice</strong><br>
<ul class="terminal-list">
<li>SIMPLETS is a community-led, experimental project.</li>
<li>There are no guarantees, warranties, or promises of functionality, value, or outcome.</li>
<li><b>Not financial or legal advice.</b></li>
</ul>"#;

pub(super) fn register(registry: &CommandRegistry) {
    page(registry, "about", "Displays information about SIMPLETS", || {
        CommandResult::from(ABOUT)
    });
    page(registry, "links", "Displays links to SIMPLETS resources", || {
        CommandResult::html(LINKS, Some("terminal-links"))
    });
    page(registry, "legal", "Displays the legal notice", || {
        CommandResult::html(LEGAL, Some("terminal-legal"))
    });
}

fn page(registry: &CommandRegistry, name: &str, description: &str, body: fn() -> CommandResult) {
    registry.register_with_category(
        name,
        CommandHandler::sync(move |_| Ok(body())),
        Category::Info,
    );
    registry.register_help_text(
        name,
        HelpText::new(description).usage(name).example(name),
    );
}
