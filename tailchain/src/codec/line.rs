//! One event per line.

use super::Decoder;
use crate::core::Event;
use crate::errors::DecodeError;

/// Emits every line as its own event, with the line as `message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDecoder;

impl LineDecoder {
    /// Creates a line decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Decoder for LineDecoder {
    fn decode(&mut self, line: &str) -> Result<Vec<Event>, DecodeError> {
        Ok(vec![Event::with_message(line)])
    }

    fn flush(&mut self) -> Result<Vec<Event>, DecodeError> {
        Ok(Vec::new())
    }
}
