//! Logger handed to every stage at assembly time.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt::Debug;
use tracing::Level;

/// Structured attributes attached to a log call.
pub type Attributes = Map<String, Value>;

/// Builds an attribute map from key/value pairs.
#[must_use]
pub fn attributes<const N: usize>(pairs: [(&str, Value); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Leveled, structured logging used by chain stages.
///
/// Callers that build expensive attributes should check [`enabled`](Self::enabled)
/// first; the level helpers check it too, so a disabled level costs one call.
pub trait ChainLogger: Send + Sync + Debug {
    /// Returns true if records at `level` would be kept.
    fn enabled(&self, level: Level) -> bool;

    /// Records a message.
    fn log(&self, level: Level, message: &str, attributes: Attributes);

    /// Records a debug message.
    fn debug(&self, message: &str, attributes: Attributes) {
        if self.enabled(Level::DEBUG) {
            self.log(Level::DEBUG, message, attributes);
        }
    }

    /// Records an info message.
    fn info(&self, message: &str, attributes: Attributes) {
        if self.enabled(Level::INFO) {
            self.log(Level::INFO, message, attributes);
        }
    }

    /// Records a warning.
    fn warn(&self, message: &str, attributes: Attributes) {
        if self.enabled(Level::WARN) {
            self.log(Level::WARN, message, attributes);
        }
    }

    /// Records an error.
    fn error(&self, message: &str, attributes: Attributes) {
        if self.enabled(Level::ERROR) {
            self.log(Level::ERROR, message, attributes);
        }
    }
}

/// A logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl ChainLogger for NoOpLogger {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn log(&self, _level: Level, _message: &str, _attributes: Attributes) {}
}

/// A logger that forwards to the `tracing` framework.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    component: Option<String>,
}

impl TracingLogger {
    /// Creates a tracing logger that tags every record with a component name.
    #[must_use]
    pub fn for_component(component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
        }
    }
}

impl ChainLogger for TracingLogger {
    fn enabled(&self, level: Level) -> bool {
        match level {
            Level::TRACE => tracing::enabled!(Level::TRACE),
            Level::DEBUG => tracing::enabled!(Level::DEBUG),
            Level::INFO => tracing::enabled!(Level::INFO),
            Level::WARN => tracing::enabled!(Level::WARN),
            _ => tracing::enabled!(Level::ERROR),
        }
    }

    fn log(&self, level: Level, message: &str, attributes: Attributes) {
        let component = self.component.as_deref().unwrap_or("chain");
        let attributes = Value::Object(attributes);
        match level {
            Level::TRACE => tracing::trace!(component, %attributes, "{message}"),
            Level::DEBUG => tracing::debug!(component, %attributes, "{message}"),
            Level::INFO => tracing::info!(component, %attributes, "{message}"),
            Level::WARN => tracing::warn!(component, %attributes, "{message}"),
            _ => tracing::error!(component, %attributes, "{message}"),
        }
    }
}

/// One record captured by a [`CollectingLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// The level.
    pub level: Level,
    /// The message.
    pub message: String,
    /// The attributes.
    pub attributes: Attributes,
}

/// A logger that keeps every record in memory, for tests.
#[derive(Debug)]
pub struct CollectingLogger {
    max_level: Level,
    records: RwLock<Vec<LogRecord>>,
}

impl Default for CollectingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectingLogger {
    /// Creates a logger that keeps records at every level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_level(Level::TRACE)
    }

    /// Creates a logger that only keeps records at `max_level` or more severe.
    #[must_use]
    pub fn with_max_level(max_level: Level) -> Self {
        Self {
            max_level,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Returns all records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns `(message, attributes)` for records at one level.
    #[must_use]
    pub fn trace_for(&self, level: Level) -> Vec<(String, Attributes)> {
        self.records
            .read()
            .iter()
            .filter(|record| record.level == level)
            .map(|record| (record.message.clone(), record.attributes.clone()))
            .collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl ChainLogger for CollectingLogger {
    fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    fn log(&self, level: Level, message: &str, attributes: Attributes) {
        self.records.write().push(LogRecord {
            level,
            message: message.to_string(),
            attributes,
        });
    }
}
