//! Error types for the tailchain crate.
//!
//! Assembly and configuration problems are reported before any notification
//! is processed; everything raised while a notification travels the chain is
//! a [`ChainError`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by chain stages.
pub type ChainResult<T> = Result<T, ChainError>;

/// The main error type for chain traversal and session lifecycle.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A stage tried to forward without a downstream stage.
    #[error("Stage '{stage}' has no downstream stage configured")]
    NoDownstream {
        /// The forwarding stage.
        stage: String,
    },

    /// A stage was used before a required collaborator was attached.
    #[error("Stage '{stage}' is missing its {collaborator}")]
    NotConfigured {
        /// The stage name.
        stage: String,
        /// The missing collaborator (decoder factory, queue, watcher).
        collaborator: &'static str,
    },

    /// A notification carried a payload its action does not allow.
    #[error("Stage '{stage}' received an unexpected payload for action '{action}'")]
    UnexpectedPayload {
        /// The stage name.
        stage: String,
        /// The notification action.
        action: String,
    },

    /// The decoder rejected its input.
    #[error("Decoder error: {0}")]
    Decode(#[from] DecodeError),

    /// The destination queue no longer accepts events.
    #[error("Destination queue is closed")]
    QueueClosed,

    /// A lifecycle call was made from a state that does not allow it.
    #[error("Invalid session transition: {from} -> {to}")]
    Lifecycle {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// The chain could not be assembled.
    #[error("{0}")]
    Assembly(#[from] AssemblyError),

    /// The input configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The external watcher reported a failure.
    #[error("Watcher error: {0}")]
    Watcher(String),
}

impl ChainError {
    /// Creates a not-configured error.
    #[must_use]
    pub fn not_configured(stage: impl Into<String>, collaborator: &'static str) -> Self {
        Self::NotConfigured {
            stage: stage.into(),
            collaborator,
        }
    }

    /// Creates a lifecycle error.
    #[must_use]
    pub fn lifecycle(from: impl ToString, to: impl ToString) -> Self {
        Self::Lifecycle {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Errors raised by decoders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The line is not a JSON object.
    #[error("Invalid JSON line: {reason}")]
    InvalidJson {
        /// The offending line.
        line: String,
        /// The parser's explanation.
        reason: String,
    },

    /// Any other decoder-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Diagnostic metadata attached to assembly errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "ASSEMBLY-001-DECODER").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a JSON object, omitting unset fields.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        serde_json::Value::Object(map)
    }
}

/// Error raised when a chain cannot be assembled.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AssemblyError {
    /// The error message.
    pub message: String,
    /// The stage the error concerns, if any.
    pub stage: Option<String>,
    /// Diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl AssemblyError {
    /// Creates a new assembly error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            error_info: None,
        }
    }

    /// Sets the stage involved.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Error for a chain built without a decoder factory.
    #[must_use]
    pub fn missing_decoder() -> Self {
        Self::new("Chain has no decoder factory")
            .with_stage("decoder")
            .with_error_info(
                ErrorInfo::new("ASSEMBLY-001-DECODER", "The decoding stage needs a decoder factory")
                    .with_fix_hint("Call ChainBuilder::with_decoder_factory before build()."),
            )
    }

    /// Error for a chain built without a destination queue.
    #[must_use]
    pub fn missing_queue() -> Self {
        Self::new("Chain has no destination queue")
            .with_stage("delivery")
            .with_error_info(
                ErrorInfo::new("ASSEMBLY-002-QUEUE", "The delivery stage needs a destination queue")
                    .with_fix_hint("Call ChainBuilder::with_queue (or with_tail) before build()."),
            )
    }

    /// Error for a chain built without a watcher.
    #[must_use]
    pub fn missing_watcher() -> Self {
        Self::new("Chain has no watcher")
            .with_stage("watcher")
            .with_error_info(
                ErrorInfo::new("ASSEMBLY-003-WATCHER", "The head stage needs a file watcher")
                    .with_fix_hint("Call ChainBuilder::with_watcher before build()."),
            )
    }
}

/// Errors found while validating a file input configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No path patterns were configured.
    #[error("At least one path must be configured")]
    EmptyPaths,

    /// A path pattern was relative.
    #[error("File paths must be absolute, relative path specified: {0}")]
    RelativePath(String),

    /// Neither SINCEDB_DIR nor HOME is available.
    #[error(
        "No SINCEDB_DIR or HOME environment variable set, cannot decide where to keep \
         track of the files being watched for paths {paths:?}; set one of them or set sincedb_path"
    )]
    NoSincedbDir {
        /// The configured paths.
        paths: Vec<String>,
    },

    /// The sincedb path points at a directory.
    #[error(
        "The \"sincedb_path\" argument must point to a file, received a directory: \"{}\"",
        .0.display()
    )]
    SincedbIsDirectory(PathBuf),

    /// An interval is negative, not a number, or too large.
    #[error("Invalid {field} '{value}': expected a finite, non-negative number of seconds")]
    InvalidInterval {
        /// The setting name.
        field: &'static str,
        /// The configured value.
        value: f64,
    },

    /// The multiline pattern does not compile.
    #[error("Invalid multiline pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern.
        pattern: String,
        /// The regex error.
        reason: String,
    },

    /// IO error while preparing the sincedb location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading position records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed sincedb record '{line}': {reason}")]
pub struct SinceDbError {
    /// The offending line.
    pub line: String,
    /// What was wrong with it.
    pub reason: String,
}

impl SinceDbError {
    /// Creates a new sincedb error.
    #[must_use]
    pub fn new(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_to_value() {
        let info = ErrorInfo::new("TEST-001", "Test error").with_fix_hint("Fix this");
        let value = info.to_value();

        assert_eq!(value["code"], "TEST-001");
        assert_eq!(value["fix_hint"], "Fix this");
    }

    #[test]
    fn test_error_info_omits_missing_hint() {
        let value = ErrorInfo::new("TEST-002", "No hint").to_value();
        assert!(value.get("fix_hint").is_none());
    }

    #[test]
    fn test_assembly_error_codes() {
        assert_eq!(
            AssemblyError::missing_decoder().error_info.unwrap().code,
            "ASSEMBLY-001-DECODER"
        );
        assert_eq!(
            AssemblyError::missing_queue().error_info.unwrap().code,
            "ASSEMBLY-002-QUEUE"
        );
        assert_eq!(
            AssemblyError::missing_watcher().stage.as_deref(),
            Some("watcher")
        );
    }

    #[test]
    fn test_chain_error_from_assembly() {
        let err: ChainError = AssemblyError::missing_queue().into();
        assert_eq!(err.to_string(), "Chain has no destination queue");
    }

    #[test]
    fn test_relative_path_message() {
        let err = ConfigError::RelativePath("logs/app.log".to_string());
        assert!(err.to_string().contains("relative path specified: logs/app.log"));
    }

    #[test]
    fn test_sincedb_error_display() {
        let err = SinceDbError::new("1 2", "expected 4 fields");
        assert_eq!(err.to_string(), "Malformed sincedb record '1 2': expected 4 fields");
    }
}
