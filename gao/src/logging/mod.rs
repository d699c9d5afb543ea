//! Caller-facing event log.
//!
//! The orchestrator reports what happened (created, destroyed, subprocess
//! exited) as [`LogRecord`]s handed to an injected [`LogSink`]. Filtering is
//! decided once per record against the orchestrator's [`LogLevel`]:
//!
//! | level     | `Priority::Always` | `Priority::Verbose` |
//! |-----------|--------------------|---------------------|
//! | `Quiet`   | emitted            | dropped             |
//! | `Verbose` | emitted            | emitted             |
//!
//! Internal diagnostics go straight to `tracing`; see [`init_logging`].

mod subscriber;

pub use subscriber::{LoggingOptions, init_logging};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// How much the orchestrator reports to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Only records marked [`Priority::Always`].
    #[default]
    Quiet,
    /// Every record.
    Verbose,
}

impl LogLevel {
    pub fn admits(self, priority: Priority) -> bool {
        match (self, priority) {
            (_, Priority::Always) => true,
            (LogLevel::Verbose, Priority::Verbose) => true,
            (LogLevel::Quiet, Priority::Verbose) => false,
        }
    }
}

/// Whether a record is shown at every level or only when verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Always,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Success,
    Failure,
    Notice,
    Warning,
}

impl LogKind {
    pub fn label(self) -> &'static str {
        match self {
            LogKind::Success => "SUCCESS",
            LogKind::Failure => "FAILURE",
            LogKind::Notice => "NOTICE",
            LogKind::Warning => "WARNING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: LogKind,
    pub priority: Priority,
    pub message: String,
}

impl LogRecord {
    pub fn new(kind: LogKind, priority: Priority, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

/// Destination for orchestrator event records.
///
/// Records reaching a sink have already passed the level check.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Forwards records to `tracing`. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        match record.kind {
            LogKind::Success | LogKind::Notice => tracing::info!("{}", record.message),
            LogKind::Warning => tracing::warn!("{}", record.message),
            LogKind::Failure => tracing::error!("{}", record.message),
        }
    }
}

/// Collects records in memory until the caller drains them.
#[derive(Debug, Default)]
pub struct BufferedSink {
    records: Mutex<Vec<LogRecord>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the buffered records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Take all buffered records, leaving the buffer empty.
    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl LogSink for BufferedSink {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Writes one `[KIND] message` line per record.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn emit(&self, record: &LogRecord) {
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", record) {
            tracing::warn!(error = %e, "Failed to write log record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert!(LogLevel::Quiet.admits(Priority::Always));
        assert!(!LogLevel::Quiet.admits(Priority::Verbose));
        assert!(LogLevel::Verbose.admits(Priority::Always));
        assert!(LogLevel::Verbose.admits(Priority::Verbose));
    }

    #[test]
    fn test_record_display() {
        let record = LogRecord::new(LogKind::Warning, Priority::Always, "subprocess slow");
        assert_eq!(record.to_string(), "[WARNING] subprocess slow");
    }

    #[test]
    fn test_buffered_sink_drain_clears() {
        let sink = BufferedSink::new();
        sink.emit(&LogRecord::new(LogKind::Notice, Priority::Verbose, "one"));
        sink.emit(&LogRecord::new(LogKind::Success, Priority::Always, "two"));
        assert_eq!(sink.records().len(), 2);

        let drained = sink.drain();
        assert_eq!(drained[0].message, "one");
        assert_eq!(drained[1].kind, LogKind::Success);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_writer_sink_formats_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(&LogRecord::new(LogKind::Failure, Priority::Always, "boom"));
        sink.emit(&LogRecord::new(LogKind::Success, Priority::Always, "ok"));
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "[FAILURE] boom\n[SUCCESS] ok\n");
    }
}
