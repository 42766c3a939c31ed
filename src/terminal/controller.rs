//! Terminal controller
//!
//! The command-processing state machine. `Idle -> Processing` when a
//! command starts; back to `Idle` unconditionally when it finishes, fails
//! or turns out to be unknown. Submissions arriving while a command is
//! still running are dropped with a warning.
//!
//! Dispatch order:
//! 1. built-ins (`clear`, `version`)
//! 2. registry lookup by normalized name
//! 3. hidden commands by input prefix
//! 4. "Unknown command"

use super::core::TerminalCore;
use super::parser::{self, ParsedCommand};
use super::registry::CommandRegistry;
use super::result::{CommandResult, OutputItem};
use super::view::TerminalView;
use crate::events::{EventBus, Payload, Subscription, topics};
use crate::platform::{LineStyle, Scheduler};
use std::cell::Cell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing,
}

/// How a `process_command` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    /// Another command was still running; nothing happened
    Busy,
    /// Blank input
    Empty,
}

/// Holds the controller in `Processing`; dropping it returns to `Idle`
/// however processing ends. Owned, so it can move into a spawned task.
struct ProcessingGuard(Rc<Cell<ControllerState>>);

impl ProcessingGuard {
    fn acquire(state: &Rc<Cell<ControllerState>>) -> Option<Self> {
        if state.get() == ControllerState::Processing {
            return None;
        }
        state.set(ControllerState::Processing);
        Some(Self(Rc::clone(state)))
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.set(ControllerState::Idle);
    }
}

pub struct TerminalController {
    bus: Rc<EventBus>,
    core: Rc<TerminalCore>,
    registry: Rc<CommandRegistry>,
    view: Rc<TerminalView>,
    scheduler: Rc<dyn Scheduler>,
    state: Rc<Cell<ControllerState>>,
    version_banner: String,
}

impl TerminalController {
    pub fn new(
        bus: Rc<EventBus>,
        core: Rc<TerminalCore>,
        registry: Rc<CommandRegistry>,
        view: Rc<TerminalView>,
        scheduler: Rc<dyn Scheduler>,
        version_banner: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            core,
            registry,
            view,
            scheduler,
            state: Rc::new(Cell::new(ControllerState::Idle)),
            version_banner: version_banner.into(),
        }
    }

    /// Subscribe to submissions and to `command:process`
    pub fn attach(self: &Rc<Self>) -> Vec<Subscription> {
        let submit: Weak<Self> = Rc::downgrade(self);
        let process: Weak<Self> = Rc::downgrade(self);
        vec![
            self.bus.on(topics::INPUT_SUBMIT, move |payload| {
                if let (Some(controller), Some(raw)) = (submit.upgrade(), payload.as_text()) {
                    controller.handle_submission(raw);
                }
                Ok(())
            }),
            self.bus.on(topics::COMMAND_PROCESS, move |payload| {
                let (Some(controller), Some(raw)) = (process.upgrade(), payload.as_text()) else {
                    return Ok(());
                };
                // Processing starts here, not when the task is first polled
                let Some(guard) = ProcessingGuard::acquire(&controller.state) else {
                    tracing::warn!(command = raw, "command still running; ignoring");
                    return Ok(());
                };
                let raw = raw.to_string();
                let task = Rc::clone(&controller);
                controller.scheduler.spawn(Box::pin(async move {
                    task.run(&raw, guard).await;
                }));
                Ok(())
            }),
        ]
    }

    pub fn state(&self) -> ControllerState {
        self.state.get()
    }

    pub fn is_processing(&self) -> bool {
        self.state.get() == ControllerState::Processing
    }

    /// Echo the submission and hand it to the core. Returns false if a
    /// command is still running.
    pub fn handle_submission(&self, raw: &str) -> bool {
        if self.is_processing() {
            tracing::warn!(command = raw, "command still running; submission dropped");
            return false;
        }
        self.view.display_command(raw);
        self.core.execute_command(raw);
        if raw.trim().is_empty() {
            self.view.ensure_input_line();
        }
        true
    }

    /// Run one command to completion
    pub async fn process_command(&self, raw: &str) -> ProcessOutcome {
        let Some(guard) = ProcessingGuard::acquire(&self.state) else {
            tracing::warn!(command = raw, "command still running; ignoring");
            return ProcessOutcome::Busy;
        };
        self.run(raw, guard).await
    }

    async fn run(&self, raw: &str, guard: ProcessingGuard) -> ProcessOutcome {
        let parsed = parser::parse_command(raw);
        let outcome = if parsed.is_empty() {
            ProcessOutcome::Empty
        } else {
            self.dispatch(raw, parsed).await;
            ProcessOutcome::Completed
        };

        drop(guard);
        self.view.ensure_input_line();
        outcome
    }

    async fn dispatch(&self, raw: &str, parsed: ParsedCommand) {
        let name = parsed.normalized_name();
        tracing::debug!(command = %name, args = parsed.args.len(), "dispatch");

        match name.as_str() {
            "clear" => {
                self.bus.emit(topics::CLEAR, Payload::None);
                return;
            }
            "version" => {
                let banner = OutputItem::styled(self.version_banner.clone(), LineStyle::Version);
                self.view.display_output(vec![banner].into()).await;
                return;
            }
            _ => {}
        }

        if let Some(invoker) = self.registry.get_command(&name) {
            let result = invoker.invoke(parsed.args).await;
            self.render(result).await;
        } else if let Some(hidden) = self.registry.match_hidden_command(raw) {
            let result = hidden.invoker.invoke(hidden.args).await;
            self.render(result).await;
        } else {
            self.view
                .display_error(&format!("Unknown command: {}", parsed.name))
                .await;
        }
    }

    async fn render(&self, result: CommandResult) {
        if result.is_empty() {
            return;
        }
        self.view.display_output(result).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::HeadlessTerminal;
    use crate::config::Config;
    use crate::terminal::registry::CommandHandler;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::RefCell;

    fn headless() -> HeadlessTerminal {
        HeadlessTerminal::new(Config::default())
    }

    #[test]
    fn test_unknown_command() {
        let h = headless();
        let outcome = block_on(h.terminal.controller.process_command("frobnicate"));
        assert_eq!(outcome, ProcessOutcome::Completed);

        let errors = h.surface.lines_with_style(LineStyle::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("frobnicate"));
        assert!(!h.terminal.controller.is_processing());
        assert!(h.terminal.view.has_input_line());

        // still accepts commands
        let outcome = block_on(h.terminal.controller.process_command("version"));
        assert_eq!(outcome, ProcessOutcome::Completed);
    }

    #[test]
    fn test_version_builtin() {
        let h = headless();
        block_on(h.terminal.controller.process_command("VERSION"));
        assert_eq!(
            h.surface.lines_with_style(LineStyle::Version),
            vec!["SimpleTS Terminal v0.8.0"]
        );
    }

    #[test]
    fn test_second_command_while_processing_is_dropped() {
        let h = headless();
        let (tx, rx) = oneshot::channel::<()>();
        let rx = Rc::new(RefCell::new(Some(rx)));
        h.terminal.registry.register(
            "slow",
            CommandHandler::from_async(move |_| {
                let rx = rx.borrow_mut().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(CommandResult::from("slow done"))
                }
            }),
        );

        assert!(h.terminal.submit("slow"));
        h.scheduler.run_until_stalled();
        assert!(h.terminal.controller.is_processing());

        assert_eq!(
            block_on(h.terminal.controller.process_command("version")),
            ProcessOutcome::Busy
        );
        assert!(!h.terminal.submit("about"));
        assert_eq!(h.terminal.core.history(), vec!["slow"]);

        tx.send(()).unwrap();
        h.scheduler.run_until_stalled();

        assert_eq!(h.terminal.controller.state(), ControllerState::Idle);
        assert!(h.surface.output_text().ends_with("slow done"));
        assert!(h.surface.lines_with_style(LineStyle::Version).is_empty());
        assert!(h.terminal.view.has_input_line());
    }

    #[test]
    fn test_submission_before_task_runs_is_rejected() {
        let h = headless();
        let (tx, rx) = oneshot::channel::<()>();
        let rx = Rc::new(RefCell::new(Some(rx)));
        h.terminal.registry.register(
            "slow",
            CommandHandler::from_async(move |_| {
                let rx = rx.borrow_mut().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(CommandResult::from("slow done"))
                }
            }),
        );

        // no executor turn between the two
        assert!(h.terminal.submit("slow"));
        assert!(h.terminal.controller.is_processing());
        assert!(!h.terminal.submit("version"));

        h.scheduler.run_until_stalled();
        tx.send(()).unwrap();
        h.scheduler.run_until_stalled();

        assert_eq!(h.terminal.core.history(), vec!["slow"]);
        assert_eq!(
            h.surface.lines_with_style(LineStyle::Echo),
            vec!["anonymous: slow"]
        );
        assert!(h.surface.output_text().ends_with("slow done"));
        assert_eq!(h.terminal.controller.state(), ControllerState::Idle);
        assert!(h.terminal.view.has_input_line());

        assert!(h.terminal.submit("version"));
        h.scheduler.run_until_stalled();
        assert_eq!(
            h.surface.lines_with_style(LineStyle::Version),
            vec!["SimpleTS Terminal v0.8.0"]
        );
    }

    #[test]
    fn test_failing_handler_returns_to_idle() {
        let h = headless();
        h.terminal
            .registry
            .register("broken", CommandHandler::sync(|_| anyhow::bail!("no luck")));

        block_on(h.terminal.controller.process_command("broken"));
        assert_eq!(
            h.surface.lines_with_style(LineStyle::Error),
            vec!["Error executing command: no luck"]
        );
        assert_eq!(h.terminal.controller.state(), ControllerState::Idle);
        assert!(h.terminal.view.has_input_line());
    }

    #[test]
    fn test_hidden_command_dispatch() {
        let h = headless();
        block_on(h.terminal.controller.process_command("set lang es"));
        assert_eq!(h.terminal.settings.language(), "es");
    }

    #[test]
    fn test_blank_input() {
        let h = headless();
        assert_eq!(
            block_on(h.terminal.controller.process_command("   ")),
            ProcessOutcome::Empty
        );
        assert!(!h.terminal.controller.is_processing());
    }
}
