//! # Logger Service
//!
//! Structured logging setup for the editor crates.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Every crate emits `tracing` events with named fields; this crate decides
//! where they go.
//!
//! - [`init_tracing`] installs a formatted subscriber filtered by `RUST_LOG`
//! - [`LogCapture`] is a layer that keeps events in memory so tests can
//!   assert on what was logged
//!
//! ## Example
//!
//! ```ignore
//! let capture = LogCapture::new();
//! capture.in_scope(|| tab.save(&mut services));
//! assert!(capture.contains("save finished"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Module path of the emitting code
    pub target: String,
    pub message: String,
    /// Structured fields, in emission order
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            target: String::new(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }
}

/// In-memory layer recording every event it sees
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.entries.lock() {
            Ok(mut entries) => entries.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// True if some entry's message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }

    pub fn at_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// Runs `f` with this capture as the thread's default subscriber
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = Registry::default().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    fn push(&self, entry: LogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl<S> Layer<S> for LogCapture
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        let meta = event.metadata();
        self.push(LogEntry {
            level: LogLevel::from(meta.level()),
            target: meta.target().to_string(),
            message: collector.message,
            fields: collector.fields,
        });
    }
}

/// Installs a formatted global subscriber
///
/// Honors `RUST_LOG`, falling back to `default_filter`. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_fmt().with_env_filter(filter).try_init();
}

/// Like [`init_tracing`], but writes through the test harness
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, warn};

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_entry_with_fields() {
        let entry = LogEntry::new(LogLevel::Info, "saved")
            .with_target("services_tab")
            .with_field("tab", "Tab(1)")
            .with_field("bytes", "12");

        assert_eq!(entry.fields.len(), 2);
        assert_eq!(entry.field("bytes"), Some("12"));
        assert_eq!(entry.field("missing"), None);
    }

    #[test]
    fn test_capture_records_events() {
        let capture = LogCapture::new();
        capture.in_scope(|| {
            info!(location = "/tmp/a.txt", bytes = 12u64, "save finished");
            warn!("busy");
        });

        let entries = capture.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "save finished");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].field("location"), Some("/tmp/a.txt"));
        assert_eq!(entries[0].field("bytes"), Some("12"));
        assert!(entries[0].target.starts_with("services_logger"));
        assert_eq!(capture.at_level(LogLevel::Warn).len(), 1);
    }

    #[test]
    fn test_capture_is_scoped() {
        let capture = LogCapture::new();
        debug!("outside");
        capture.in_scope(|| debug!("inside"));
        assert!(capture.contains("inside"));
        assert!(!capture.contains("outside"));

        capture.clear();
        assert!(capture.entries().is_empty());
    }
}
