//! simplets CLI - the terminal engine on a plain line terminal
//!
//! Usage: `simplets-cli [config.json]`
//!
//! Preferences persist in `.simplets-settings.json` in the working
//! directory. Type `exit` or send EOF to leave.

use anyhow::Context;
use simplets::app::Terminal;
use simplets::config::Config;
use simplets::platform::native::{JsonFileStore, StdoutSurface, ThreadScheduler};
use simplets::platform::{KeyValueStore, Scheduler, Surface};
use simplets::terminal::input::KeyInput;
use std::io::{self, BufRead};
use std::rc::Rc;

const SETTINGS_FILE: &str = ".simplets-settings.json";

fn load_config() -> anyhow::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path))?;
            Config::from_json(&json).with_context(|| format!("invalid config {}", path))
        }
        None => Ok(Config::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let mut config = load_config()?;
    simplets::logging::init(&config.log_level);
    // Line terminals cannot animate a caret or reveal characters
    config.animation.char_delay_ms = 0;

    let surface = Rc::new(StdoutSurface::new());
    let scheduler = Rc::new(ThreadScheduler::new());
    let store = Rc::new(JsonFileStore::new(SETTINGS_FILE));
    let terminal = Terminal::new(
        config,
        Rc::clone(&surface) as Rc<dyn Surface>,
        Rc::clone(&scheduler) as Rc<dyn Scheduler>,
        store as Rc<dyn KeyValueStore>,
    );
    terminal.init().context("failed to start terminal")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim() == "exit" && !terminal.view.menu_active() {
            break;
        }

        for key in keys_for(&terminal, &surface, &line) {
            terminal.handle_key(&key);
            scheduler.run_until_stalled();
        }
    }

    terminal.dispose();
    println!();
    Ok(())
}

/// Translate one typed line into key presses
fn keys_for(terminal: &Terminal, surface: &StdoutSurface, line: &str) -> Vec<KeyInput> {
    if !terminal.view.menu_active() {
        surface.set_input_value(line);
        return vec![KeyInput::new("Enter")];
    }

    let answer = line.trim();
    if answer.eq_ignore_ascii_case("q") {
        return vec![KeyInput::new("Escape")];
    }
    let steps = answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .unwrap_or(0);
    let mut keys = vec![KeyInput::new("ArrowDown"); steps];
    keys.push(KeyInput::new("Enter"));
    keys
}
