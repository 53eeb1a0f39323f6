//! Recent-log capture for operators.
//!
//! A tracing layer copies every event into a bounded ring buffer, which the
//! web API serves at `GET /api/logs`.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Structured fields other than the message, as `key=value`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl LogEntry {
    pub fn format(&self) -> String {
        let mut line = format!(
            "{} {} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        );
        for field in &self.fields {
            line.push(' ');
            line.push_str(field);
        }
        line
    }

    fn level(&self) -> Option<Level> {
        self.level.parse().ok()
    }
}

/// Ring buffer of the most recent entries
pub struct LogBuffer {
    recent: parking_lot::RwLock<VecDeque<LogEntry>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            recent: parking_lot::RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut recent = self.recent.write();
        if recent.len() >= self.max_entries {
            recent.pop_front();
        }
        recent.push_back(entry);
    }

    /// Up to `count` newest entries at or above `min_level`, oldest first
    pub fn recent(&self, count: usize, min_level: Level) -> Vec<LogEntry> {
        let recent = self.recent.read();
        let mut entries: Vec<LogEntry> = recent
            .iter()
            .rev()
            // Level ordering in tracing: TRACE > DEBUG > INFO > WARN > ERROR
            .filter(|e| e.level().map_or(true, |level| level <= min_level))
            .take(count)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    pub fn len(&self) -> usize {
        self.recent.read().len()
    }
}

pub type SharedLogBuffer = Arc<LogBuffer>;

pub fn create_log_buffer(max_entries: usize) -> SharedLogBuffer {
    Arc::new(LogBuffer::new(max_entries))
}

/// Tracing layer that captures events into the buffer
pub struct LogCaptureLayer {
    buffer: SharedLogBuffer,
}

impl LogCaptureLayer {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogEntry {
            timestamp: chrono::Utc::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for EntryVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}
