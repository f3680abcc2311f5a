//! The structured record that flows to the destination queue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the raw text of a record.
pub const MESSAGE_FIELD: &str = "message";
/// Field holding the record creation time.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Field holding the tag list.
pub const TAGS_FIELD: &str = "tags";
/// Namespace for bookkeeping fields that are never serialized.
pub const METADATA_FIELD: &str = "@metadata";

/// An ordered, mutable mapping from field name to value.
///
/// Fields are addressed by reference: a bare name (`host`) or bracket
/// segments (`[@metadata][path]`, `[http][status]`). References rooted at
/// `@metadata` read and write a separate map that is skipped on
/// serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(skip)]
    metadata: Map<String, Value>,
}

impl Event {
    /// Creates an empty event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an event for one record of text, stamped with the current time.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut event = Self::new();
        event.set(TIMESTAMP_FIELD, Value::String(crate::core::iso_timestamp()));
        event.set(MESSAGE_FIELD, Value::String(message.into()));
        event
    }

    /// Creates an event from decoded fields, stamping it if no timestamp was decoded.
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut event = Self {
            fields,
            metadata: Map::new(),
        };
        if !event.contains(TIMESTAMP_FIELD) {
            event.set(TIMESTAMP_FIELD, Value::String(crate::core::iso_timestamp()));
        }
        event
    }

    /// Returns the value at a field reference.
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&Value> {
        let segments = field_path(reference);
        match segments.split_first() {
            Some((&METADATA_FIELD, rest)) => lookup(&self.metadata, rest),
            _ => lookup(&self.fields, &segments),
        }
    }

    /// Returns the value at a field reference as a string slice.
    #[must_use]
    pub fn get_str(&self, reference: &str) -> Option<&str> {
        self.get(reference).and_then(Value::as_str)
    }

    /// Returns true if a value is present at the field reference.
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.get(reference).is_some()
    }

    /// Sets the value at a field reference, creating intermediate objects.
    pub fn set(&mut self, reference: &str, value: impl Into<Value>) {
        let segments = field_path(reference);
        match segments.split_first() {
            Some((&METADATA_FIELD, rest)) => insert(&mut self.metadata, rest, value.into()),
            _ => insert(&mut self.fields, &segments, value.into()),
        }
    }

    /// Sets the value only if the field is absent. Returns true if it was set.
    pub fn set_if_absent(&mut self, reference: &str, value: impl Into<Value>) -> bool {
        if self.contains(reference) {
            return false;
        }
        self.set(reference, value);
        true
    }

    /// Returns the tags on the event.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        match self.fields.get(TAGS_FIELD) {
            Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(tag)) => vec![tag.as_str()],
            _ => Vec::new(),
        }
    }

    /// Returns true if the event carries the tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    /// Appends a tag unless already present. Returns true if it was added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.has_tag(&tag) {
            return false;
        }
        let entry = self
            .fields
            .entry(TAGS_FIELD.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(tags) => tags.push(Value::String(tag)),
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, Value::String(tag)]);
            }
        }
        true
    }

    /// Replaces `%{reference}` placeholders with field values.
    ///
    /// Placeholders whose field is absent are left as written.
    #[must_use]
    pub fn sprintf(&self, template: &str) -> String {
        if !template.contains("%{") {
            return template.to_string();
        }

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("%{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let reference = &after[..end];
            match self.get(reference) {
                Some(value) => out.push_str(&value_to_string(value)),
                None => {
                    out.push_str("%{");
                    out.push_str(reference);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// The visible fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The `@metadata` fields.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the visible fields as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Splits a field reference into its path segments.
fn field_path(reference: &str) -> Vec<&str> {
    if reference.len() > 1 && reference.starts_with('[') && reference.ends_with(']') {
        reference[1..reference.len() - 1]
            .split("][")
            .filter(|segment| !segment.is_empty())
            .collect()
    } else {
        vec![reference]
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let value = map.get(*first)?;
    if rest.is_empty() {
        Some(value)
    } else {
        lookup(value.as_object()?, rest)
    }
}

fn insert(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return;
    }
    let entry = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        insert(inner, rest, value);
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
