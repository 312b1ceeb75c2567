//! Logging capability injected into every component.
//!
//! Components never reach for a global logger; they log through the
//! [`StoreLogger`] they were constructed with. [`LogFacade`] is the default and
//! forwards to the `log` crate, so the binary's choice of `log` backend applies.

use std::sync::{Arc, Mutex};

/// Log target used by [`LogFacade`]
pub const LOG_TARGET: &str = "tablekit";

/// The three severities the library logs at.
pub trait StoreLogger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Forwards to the `log` crate macros under [`LOG_TARGET`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl StoreLogger for LogFacade {
    fn info(&self, message: &str) {
        log::info!(target: LOG_TARGET, "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: LOG_TARGET, "{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!(target: LOG_TARGET, "{message}");
    }
}

/// Drops every line
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl StoreLogger for NoopLogger {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
    Debug,
}

/// Keeps every line in memory.
///
/// # Examples
///
/// ```no_run
/// use tablekit::logging::{LogLevel, RecordingLogger, StoreLogger};
///
/// let logger = RecordingLogger::default();
/// logger.error("chunk 0 failed");
/// assert_eq!(logger.lines_at(LogLevel::Error), vec!["chunk 0 failed".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    fn push(&self, level: LogLevel, message: &str) {
        // A poisoned lock only means another thread panicked mid-push.
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push((level, message.to_string()));
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn lines_at(&self, level: LogLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }
}

impl StoreLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }

    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }
}

/// The logger used when none is supplied
pub fn default_logger() -> Arc<dyn StoreLogger> {
    Arc::new(LogFacade)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_levels_apart() {
        let logger = RecordingLogger::default();
        logger.info("starting");
        logger.debug("attempt 1");
        logger.error("failed");

        assert_eq!(logger.lines().len(), 3);
        assert_eq!(logger.lines_at(LogLevel::Debug), vec!["attempt 1".to_string()]);
        assert!(logger.contains("fail"));
        assert!(!logger.contains("missing"));
    }

    #[test]
    fn clones_share_the_buffer() {
        let logger = RecordingLogger::default();
        let shared: Arc<dyn StoreLogger> = Arc::new(logger.clone());
        shared.info("through the trait object");
        assert!(logger.contains("trait object"));
    }
}
