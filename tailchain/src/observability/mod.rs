//! Logging for chain stages.

mod logger;
mod subscriber;

pub use logger::{
    attributes, Attributes, ChainLogger, CollectingLogger, LogRecord, NoOpLogger, TracingLogger,
};
pub use subscriber::{init_tracing, LogFormat};
