//! Decoders turning raw lines into events.
//!
//! A [`Decoder`] is stateful and belongs to exactly one file identity; the
//! decoding stage asks a [`DecoderFactory`] for a fresh instance the first
//! time it sees a line from a new identity.

mod json;
mod line;
mod multiline;

pub use json::{JsonDecoder, JSON_FAILURE_TAG};
pub use line::LineDecoder;
pub use multiline::{
    MultilineConfig, MultilineDecoder, MultilineWhat, MAX_LINES_TAG, MULTILINE_TAG,
};

use crate::core::Event;
use crate::errors::{ConfigError, DecodeError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Turns raw lines into zero or more events.
pub trait Decoder: Send + Sync {
    /// Feeds one line; returns whatever records it completed.
    fn decode(&mut self, line: &str) -> Result<Vec<Event>, DecodeError>;

    /// Emits any buffered partial record.
    fn flush(&mut self) -> Result<Vec<Event>, DecodeError>;
}

/// Creates one decoder per file identity.
pub trait DecoderFactory: Send + Sync {
    /// Returns a new decoder with empty state.
    fn create(&self) -> Box<dyn Decoder>;
}

impl<F> DecoderFactory for F
where
    F: Fn() -> Box<dyn Decoder> + Send + Sync,
{
    fn create(&self) -> Box<dyn Decoder> {
        self()
    }
}

/// Decoder selection as written in the input configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoderKind {
    /// One event per line.
    #[default]
    Line,
    /// Join lines into records by pattern.
    Multiline(MultilineConfig),
    /// One JSON object per line.
    Json {
        /// Return an error instead of tagging unparseable lines.
        #[serde(default)]
        strict: bool,
    },
}

impl DecoderKind {
    /// Builds the factory for this codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the multiline pattern does not compile.
    pub fn build_factory(&self) -> Result<Arc<dyn DecoderFactory>, ConfigError> {
        match self {
            Self::Line => Ok(Arc::new(|| Box::new(LineDecoder::new()) as Box<dyn Decoder>)),
            Self::Multiline(config) => {
                let prototype = MultilineDecoder::new(config)?;
                Ok(Arc::new(move || Box::new(prototype.fresh()) as Box<dyn Decoder>))
            }
            Self::Json { strict } => {
                let strict = *strict;
                Ok(Arc::new(move || {
                    Box::new(JsonDecoder::new().with_strict(strict)) as Box<dyn Decoder>
                }))
            }
        }
    }
}
