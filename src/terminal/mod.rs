//! Terminal engine
//!
//! The pieces of the interactive terminal, wired together through the
//! event bus:
//! - `core`: session state and command history
//! - `registry`: name -> handler lookup and help metadata
//! - `controller`: the one-command-at-a-time state machine
//! - `view`: animated output rendering and the live input line
//! - `menu`: inline keyboard-driven option lists
//! - `cursor`: synthetic caret kept in sync with the input field
//! - `input`: key and pointer event mapping

pub mod controller;
pub mod core;
pub mod cursor;
pub mod input;
pub mod menu;
pub mod parser;
pub mod registry;
pub mod result;
pub mod view;

pub use controller::{ControllerState, ProcessOutcome, TerminalController};
pub use core::{Direction, History, HistoryEntry, TerminalCore};
pub use cursor::{CaretMode, CursorState, CursorSync};
pub use input::{InputHandler, KeyAction, KeyDisposition, KeyInput};
pub use menu::{Menu, MenuKey, MenuOutcome};
pub use parser::{ParsedCommand, parse_command, tokenize};
pub use registry::{Category, CommandHandler, CommandRegistry, CommandSpec, HelpText};
pub use result::{CommandResult, Control, MenuOption, MenuRequest, OutputItem};
pub use view::TerminalView;
