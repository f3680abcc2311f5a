//! The data half of a `(context, payload)` pair.

use super::Event;

/// What travels alongside a [`Context`](super::Context).
///
/// Watchers send `Line` for line notifications and `Empty` for everything
/// else; the decoding stage turns lines into `Event`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No data (structural notifications).
    #[default]
    Empty,
    /// A raw line of text.
    Line(String),
    /// A decoded record.
    Event(Event),
}

impl Payload {
    /// Returns true if there is no data.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the raw line, if any.
    #[must_use]
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::Line(line) => Some(line),
            _ => None,
        }
    }

    /// Returns the event, if any.
    #[must_use]
    pub const fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Consumes the payload, returning the event if any.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }
}

impl From<Event> for Payload {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<String> for Payload {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<&str> for Payload {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accessors() {
        let line = Payload::from("hello");
        assert_eq!(line.as_line(), Some("hello"));
        assert!(line.as_event().is_none());

        let event = Payload::from(Event::with_message("hello"));
        assert!(event.as_line().is_none());
        assert_eq!(event.as_event().and_then(|e| e.get_str("message")), Some("hello"));

        assert!(Payload::default().is_empty());
    }

    #[test]
    fn test_into_event() {
        assert!(Payload::Empty.into_event().is_none());
        assert!(Payload::from(Event::new()).into_event().is_some());
    }
}
