use chrono::{DateTime, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::BenchError;

/// Target used for records that already carry a serialized [`LogEntry`].
const STRUCTURED_TARGET: &str = "jnibench::structured";

static TRACE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique trace ID for request tracking
pub fn generate_trace_id() -> String {
    let id = TRACE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:016x}", id)
}

/// Structured log entry with context
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub trace_id: String,
    pub component: String,
    pub operation: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<u64>,
    pub thread_id: String,
    pub process_id: u32,
}

impl LogEntry {
    pub fn new(level: Level, component: &str, operation: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            trace_id: generate_trace_id(),
            component: component.to_string(),
            operation: operation.to_string(),
            message: message.to_string(),
            error_code: None,
            context: HashMap::new(),
            duration_us: None,
            thread_id: format!("{:?}", std::thread::current().id()),
            process_id: std::process::id(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn with_error_code(mut self, error_code: &str) -> Self {
        self.error_code = Some(error_code.to_string());
        self
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn with_duration_us(mut self, duration_us: u64) -> Self {
        self.duration_us = Some(duration_us);
        self
    }

    fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::Info)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
    }

    pub fn log(self) {
        let level = self.level();
        if level > log::max_level() {
            return;
        }
        log::log!(target: STRUCTURED_TARGET, level, "{}", self.to_json());
    }
}

/// Per-component logger that stamps entries with a trace ID.
#[derive(Debug, Clone)]
pub struct PerformanceLogger {
    component: String,
}

impl PerformanceLogger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    /// Run `f` and log how long it took.
    pub fn log_operation<F, R>(&self, operation: &str, trace_id: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = std::time::Instant::now();
        let result = f();
        let duration = start.elapsed().as_micros() as u64;

        LogEntry::new(Level::Info, &self.component, operation, "Operation completed")
            .with_trace_id(trace_id.to_string())
            .with_duration_us(duration)
            .log();

        result
    }

    /// Record why a run aborted. Only emitted at DEBUG.
    pub fn log_fault(&self, operation: &str, trace_id: &str, fault: &BenchError) {
        if !log::log_enabled!(target: STRUCTURED_TARGET, Level::Debug) {
            return;
        }
        LogEntry::new(Level::Debug, &self.component, operation, &fault.to_string())
            .with_trace_id(trace_id.to_string())
            .with_error_code(fault.error_code())
            .log();
    }

    pub fn log_warning(&self, operation: &str, trace_id: &str, message: &str) {
        LogEntry::new(Level::Warn, &self.component, operation, message)
            .with_trace_id(trace_id.to_string())
            .log();
    }

    pub fn log_info(&self, operation: &str, trace_id: &str, message: &str) {
        LogEntry::new(Level::Info, &self.component, operation, message)
            .with_trace_id(trace_id.to_string())
            .log();
    }
}

/// `log` backend that writes one JSON object per line to stderr.
pub struct StructuredLogger {
    component: String,
    min_level: LevelFilter,
}

impl StructuredLogger {
    pub fn new(component: &str, min_level: LevelFilter) -> Self {
        Self {
            component: component.to_string(),
            min_level,
        }
    }

    /// Render a record as a JSON line.
    pub fn render(&self, record: &Record) -> String {
        if record.target() == STRUCTURED_TARGET {
            return record.args().to_string();
        }

        let mut entry = LogEntry::new(
            record.level(),
            &self.component,
            record.target(),
            &record.args().to_string(),
        );
        if let Some(file) = record.file() {
            entry = entry.with_context("file", serde_json::Value::String(file.to_string()));
        }
        if let Some(line) = record.line() {
            entry = entry.with_context("line", serde_json::Value::Number(line.into()));
        }
        entry.to_json()
    }
}

impl Log for StructuredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.render(record);
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the structured logger as the global `log` backend.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = StructuredLogger::new("jnibench", level);
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_ids_are_unique_hex() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_entry_serializes_optional_fields_only_when_set() {
        let entry = LogEntry::new(Level::Debug, "driver", "byte_string", "aborted");
        let json: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(json["level"], "DEBUG");
        assert_eq!(json["component"], "driver");
        assert!(json.get("error_code").is_none());
        assert!(json.get("duration_us").is_none());

        let entry = entry.with_error_code("ABSENT_VALUE").with_duration_us(12);
        let json: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(json["error_code"], "ABSENT_VALUE");
        assert_eq!(json["duration_us"], 12);
    }

    #[test]
    fn test_render_wraps_plain_records() {
        let logger = StructuredLogger::new("jnibench", LevelFilter::Debug);
        let line = logger.render(
            &Record::builder()
                .args(format_args!("hello"))
                .level(Level::Warn)
                .target("jnibench::exports")
                .line(Some(7))
                .build(),
        );
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["message"], "hello");
        assert_eq!(json["operation"], "jnibench::exports");
        assert_eq!(json["context"]["line"], 7);
    }

    #[test]
    fn test_render_passes_structured_records_through() {
        let logger = StructuredLogger::new("jnibench", LevelFilter::Debug);
        let line = logger.render(
            &Record::builder()
                .args(format_args!("{{\"already\":\"json\"}}"))
                .level(Level::Info)
                .target(STRUCTURED_TARGET)
                .build(),
        );
        assert_eq!(line, "{\"already\":\"json\"}");
    }

    #[test]
    fn test_performance_logger_returns_result() {
        let logger = PerformanceLogger::new("driver");
        let value = logger.log_operation("noop", &generate_trace_id(), || 41 + 1);
        assert_eq!(value, 42);
    }
}
