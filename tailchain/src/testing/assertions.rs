//! Test assertions for recorded calls and events.

use crate::core::{Action, Event};

/// Asserts that the recorded actions match, in order.
pub fn assert_actions(actual: &[Action], expected: &[Action]) {
    assert_eq!(
        actual, expected,
        "Expected actions {expected:?}, got {actual:?}"
    );
}

/// Asserts that an event field holds the expected string.
pub fn assert_event_field(event: &Event, field: &str, expected: &str) {
    assert_eq!(
        event.get_str(field),
        Some(expected),
        "Expected field '{}' to be {:?}, event fields: {:?}",
        field,
        expected,
        event.fields()
    );
}

/// Asserts that an event carries a tag.
pub fn assert_has_tag(event: &Event, tag: &str) {
    assert!(
        event.has_tag(tag),
        "Expected tag '{}', got {:?}",
        tag,
        event.tags()
    );
}

/// Asserts the `message` of each event, in order.
pub fn assert_messages(events: &[Event], expected: &[&str]) {
    let actual: Vec<&str> = events
        .iter()
        .map(|event| event.get_str("message").unwrap_or_default())
        .collect();
    assert_eq!(actual, expected, "Unexpected event messages");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_event_field() {
        let mut event = Event::new();
        event.set("host", "web-1");
        assert_event_field(&event, "host", "web-1");
    }

    #[test]
    #[should_panic(expected = "Expected tag 'missing'")]
    fn test_assert_has_tag_fails() {
        assert_has_tag(&Event::new(), "missing");
    }

    #[test]
    fn test_assert_messages() {
        let events = vec![Event::with_message("a"), Event::with_message("b")];
        assert_messages(&events, &["a", "b"]);
    }
}
