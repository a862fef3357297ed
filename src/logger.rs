//! Logging collaborator.
//!
//! Every engine component receives an `Arc<dyn Logger>` instead of reaching
//! for a global. The default implementation, [`LogFacade`], forwards to the
//! `log` crate so the binary's `env_logger` backend decides formatting and
//! filtering; [`MemoryLogger`] records lines for inspection.

use std::sync::{Arc, Mutex};

pub use log::Level;

/// Sink for leveled text lines.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, line: &str);

    fn error(&self, line: &str) {
        self.log(Level::Error, line);
    }

    fn warn(&self, line: &str) {
        self.log(Level::Warn, line);
    }

    fn info(&self, line: &str) {
        self.log(Level::Info, line);
    }

    fn debug(&self, line: &str) {
        self.log(Level::Debug, line);
    }
}

/// Forwards every line to the `log` facade under the `wsforge` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl LogFacade {
    pub fn shared() -> Arc<dyn Logger> {
        Arc::new(LogFacade)
    }
}

impl Logger for LogFacade {
    fn log(&self, level: Level, line: &str) {
        log::log!(target: "wsforge", level, "{}", line);
    }
}

/// Keeps every logged line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines, oldest first.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Recorded messages at exactly `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, line.to_string()));
        }
    }
}
