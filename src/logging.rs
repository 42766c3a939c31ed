//! Log subscriber setup
//!
//! Everything in the crate logs through `tracing`. This module installs the
//! one subscriber that decides where those events go:
//! - browser: formatted lines forwarded to `console.log/warn/error`
//! - native: stderr, filtered by `RUST_LOG` when set

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the global subscriber. `level` is an `EnvFilter` directive such
/// as `"info"` or `"simplets=debug"`. Returns false if a subscriber was
/// already installed.
pub fn init(level: &str) -> bool {
    let filter = default_filter(level);
    let installed = install(filter);
    if installed {
        tracing::debug!(level, "logging initialized");
    }
    installed
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(not(target_arch = "wasm32"))]
fn install(fallback: EnvFilter) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or(fallback);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(target_arch = "wasm32")]
fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(console::ConsoleMakeWriter)
                .without_time()
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;
    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;

    /// Hands out one buffered writer per event
    pub struct ConsoleMakeWriter;

    /// Collects one formatted event, emitted to the console on drop
    pub struct ConsoleWriter {
        level: Level,
        buf: Vec<u8>,
    }

    impl io::Write for ConsoleWriter {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            let text = String::from_utf8_lossy(&self.buf);
            let line = wasm_bindgen::JsValue::from_str(text.trim_end());
            match self.level {
                Level::ERROR => web_sys::console::error_1(&line),
                Level::WARN => web_sys::console::warn_1(&line),
                Level::DEBUG | Level::TRACE => web_sys::console::debug_1(&line),
                _ => web_sys::console::log_1(&line),
            }
        }
    }

    impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
        type Writer = ConsoleWriter;

        fn make_writer(&'a self) -> Self::Writer {
            ConsoleWriter {
                level: Level::INFO,
                buf: Vec::new(),
            }
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            ConsoleWriter {
                level: *meta.level(),
                buf: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init("debug");
        assert!(!init("info"));
    }
}
