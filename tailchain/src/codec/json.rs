//! One JSON object per line.

use super::Decoder;
use crate::core::Event;
use crate::errors::DecodeError;
use serde_json::Value;

/// Tag added to events whose line could not be parsed.
pub const JSON_FAILURE_TAG: &str = "_jsonparsefailure";

/// Parses each line as a JSON object.
///
/// By default an unparseable line still becomes an event: the raw text goes
/// to `message` and the event is tagged [`JSON_FAILURE_TAG`]. Strict mode
/// returns [`DecodeError::InvalidJson`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder {
    strict: bool,
}

impl JsonDecoder {
    /// Creates a lenient JSON decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { strict: false }
    }

    /// Sets strict mode.
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn failure(&self, line: &str, reason: String) -> Result<Vec<Event>, DecodeError> {
        if self.strict {
            return Err(DecodeError::InvalidJson {
                line: line.to_string(),
                reason,
            });
        }
        let mut event = Event::with_message(line);
        event.add_tag(JSON_FAILURE_TAG);
        Ok(vec![event])
    }
}

impl Decoder for JsonDecoder {
    fn decode(&mut self, line: &str) -> Result<Vec<Event>, DecodeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(fields)) => Ok(vec![Event::from_fields(fields)]),
            Ok(other) => self.failure(line, format!("expected an object, found {other}")),
            Err(e) => self.failure(line, e.to_string()),
        }
    }

    fn flush(&mut self) -> Result<Vec<Event>, DecodeError> {
        Ok(Vec::new())
    }
}
