//! Field and tag overlays applied by the global enrichment stage.
//!
//! Both helpers interpolate `%{field}` references against the event before
//! writing, and attribute every addition to a plugin name in the debug log.

use super::Event;
use crate::observability::{attributes, ChainLogger};
use serde_json::{Map, Value};
use tracing::Level;

/// Merges static field assignments into an event.
///
/// Unlike the first-writer-wins fields, overlays are always applied: when
/// the field already exists its value becomes a list and the new value is
/// appended. A list value in `fields` contributes each of its items.
pub fn add_fields(
    fields: &Map<String, Value>,
    event: &mut Event,
    plugin_name: &str,
    logger: &dyn ChainLogger,
) {
    for (field, value) in fields {
        let field = event.sprintf(field);
        let values = match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };

        for value in values {
            let value = match value {
                Value::String(s) => Value::String(event.sprintf(&s)),
                other => other,
            };

            if logger.enabled(Level::DEBUG) {
                logger.debug(
                    &format!("{plugin_name}: adding value to field"),
                    attributes([
                        ("field", Value::String(field.clone())),
                        ("value", value.clone()),
                    ]),
                );
            }

            let merged = match event.get(&field) {
                Some(Value::Array(existing)) => {
                    let mut existing = existing.clone();
                    existing.push(value);
                    Value::Array(existing)
                }
                Some(existing) => Value::Array(vec![existing.clone(), value]),
                None => value,
            };
            event.set(&field, merged);
        }
    }
}

/// Appends tags to an event, skipping tags it already carries.
pub fn add_tags(tags: &[String], event: &mut Event, plugin_name: &str, logger: &dyn ChainLogger) {
    for tag in tags {
        let tag = event.sprintf(tag);
        if logger.enabled(Level::DEBUG) {
            logger.debug(
                &format!("{plugin_name}: adding tag"),
                attributes([("tag", Value::String(tag.clone()))]),
            );
        }
        event.add_tag(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{CollectingLogger, NoOpLogger};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn overlay(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_add_fields_sets_new_field() {
        let mut event = Event::with_message("bar");
        add_fields(&overlay(&[("baz", json!("quux"))]), &mut event, "file", &NoOpLogger);

        assert_eq!(event.get_str("baz"), Some("quux"));
    }

    #[test]
    fn test_add_fields_appends_to_existing() {
        let mut event = Event::new();
        event.set("env", "prod");
        add_fields(&overlay(&[("env", json!("eu"))]), &mut event, "file", &NoOpLogger);

        assert_eq!(event.get("env"), Some(&json!(["prod", "eu"])));
    }

    #[test]
    fn test_add_fields_interpolates() {
        let mut event = Event::new();
        event.set("host", "web-1");
        add_fields(
            &overlay(&[("origin_%{host}", json!("seen on %{host}"))]),
            &mut event,
            "file",
            &NoOpLogger,
        );

        assert_eq!(event.get_str("origin_web-1"), Some("seen on web-1"));
    }

    #[test]
    fn test_add_fields_expands_lists() {
        let mut event = Event::new();
        add_fields(&overlay(&[("team", json!(["a", "b"]))]), &mut event, "file", &NoOpLogger);

        assert_eq!(event.get("team"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_add_tags_logs_plugin_name() {
        let logger = CollectingLogger::new();
        let mut event = Event::new();
        add_tags(&["nginx".to_string(), "nginx".to_string()], &mut event, "bar", &logger);

        assert_eq!(event.tags(), vec!["nginx"]);
        let debug = logger.trace_for(Level::DEBUG);
        assert_eq!(debug.len(), 2);
        assert_eq!(debug[0].0, "bar: adding tag");
    }
}
