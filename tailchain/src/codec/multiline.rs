//! Joins physical lines into logical records.

use super::Decoder;
use crate::core::Event;
use crate::errors::{ConfigError, DecodeError};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tag added to events built from more than one line.
pub const MULTILINE_TAG: &str = "multiline";
/// Tag added when a record was cut at `max_lines`.
pub const MAX_LINES_TAG: &str = "multiline_codec_max_lines_reached";

const fn default_max_lines() -> usize {
    500
}

/// Which record a matching line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultilineWhat {
    /// A matching line continues the record before it.
    #[default]
    Previous,
    /// A matching line continues into the record after it.
    Next,
}

/// Settings for [`MultilineDecoder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultilineConfig {
    /// Regex tested against each line.
    pub pattern: String,
    /// Invert the match.
    #[serde(default)]
    pub negate: bool,
    /// Direction a matching line joins.
    #[serde(default)]
    pub what: MultilineWhat,
    /// Upper bound on lines per record.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

impl MultilineConfig {
    /// Creates a config joining lines that match `pattern` onto the previous record.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            negate: false,
            what: MultilineWhat::Previous,
            max_lines: default_max_lines(),
        }
    }

    /// Inverts the match.
    #[must_use]
    pub const fn negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    /// Sets the join direction.
    #[must_use]
    pub const fn what(mut self, what: MultilineWhat) -> Self {
        self.what = what;
        self
    }

    /// Sets the line limit.
    #[must_use]
    pub const fn max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }
}

/// Buffers lines until a record boundary is seen.
#[derive(Debug, Clone)]
pub struct MultilineDecoder {
    pattern: Regex,
    negate: bool,
    what: MultilineWhat,
    max_lines: usize,
    buffer: Vec<String>,
}

impl MultilineDecoder {
    /// Compiles the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the regex is invalid.
    pub fn new(config: &MultilineConfig) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&config.pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: config.pattern.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern,
            negate: config.negate,
            what: config.what,
            max_lines: config.max_lines.max(1),
            buffer: Vec::new(),
        })
    }

    /// Returns a decoder with the same settings and an empty buffer.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self {
            buffer: Vec::new(),
            ..self.clone()
        }
    }

    /// Number of lines currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn continues(&self, line: &str) -> bool {
        self.pattern.is_match(line) != self.negate
    }

    fn take_record(&mut self, truncated: bool) -> Option<Event> {
        if self.buffer.is_empty() {
            return None;
        }
        let lines = std::mem::take(&mut self.buffer);
        let mut event = Event::with_message(lines.join("\n"));
        if lines.len() > 1 {
            event.add_tag(MULTILINE_TAG);
        }
        if truncated {
            event.add_tag(MAX_LINES_TAG);
        }
        Some(event)
    }
}

impl Decoder for MultilineDecoder {
    fn decode(&mut self, line: &str) -> Result<Vec<Event>, DecodeError> {
        let mut out = Vec::new();
        let continues = self.continues(line);

        match self.what {
            MultilineWhat::Previous => {
                if !continues {
                    out.extend(self.take_record(false));
                }
                self.buffer.push(line.to_string());
            }
            MultilineWhat::Next => {
                self.buffer.push(line.to_string());
                if !continues {
                    out.extend(self.take_record(false));
                }
            }
        }

        if self.buffer.len() >= self.max_lines {
            out.extend(self.take_record(true));
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<Event>, DecodeError> {
        Ok(self.take_record(false).into_iter().collect())
    }
}
