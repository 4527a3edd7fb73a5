//! Log sinks that receive run outcomes.
//!
//! The backup pipeline never talks to a logger directly. It is handed a
//! [`LogSink`] at construction and reports through it, so the binary can
//! route messages to the system log while tests capture them in memory.

use std::fmt;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

/// Severity attached to a sink message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
        }
    }
}

/// Destination for leveled messages.
pub trait LogSink: Send + Sync {
    /// Accept a message at the given level.
    fn log(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
}

/// Forwards sink messages to `tracing` events on the `archivist::sink` target.
///
/// Whatever subscriber the binary installs decides where they end up
/// (the system log, stderr, or both).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "archivist::sink", "{}", message),
            LogLevel::Info => tracing::info!(target: "archivist::sink", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "archivist::sink", "{}", message),
        }
    }
}

/// A message captured by [`MemorySink`]
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub level: LogLevel,
    pub message: String,
}

/// Records every message in memory.
///
/// Available to tests and with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages received so far
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Messages received at the given level
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(SinkRecord {
                level,
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.info("first");
        sink.log(LogLevel::Warning, "second");
        sink.log(LogLevel::Debug, "third");

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].level, LogLevel::Warning);
        assert_eq!(sink.messages_at(LogLevel::Info), vec!["first"]);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warning.to_string(), "warning");
        assert!(LogLevel::Debug < LogLevel::Info);
    }

    #[test]
    fn test_tracing_sink_without_subscriber() {
        // No subscriber installed: events are dropped, not panicking.
        let sink = TracingSink::new();
        sink.info("nobody listens");
    }
}
