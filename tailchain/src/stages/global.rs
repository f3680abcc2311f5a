//! Attaches deployment-level type, fields and tags.

use super::{MetaSlot, Stage, StageBase, StageRole};
use crate::core::decorators::{add_fields, add_tags};
use crate::core::{Context, Payload};
use crate::errors::ChainResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Field receiving the declared event type.
pub const TYPE_FIELD: &str = "type";

/// Settings shared by every event of one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMeta {
    /// Event type, set when the event has none.
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    /// Fields merged into every event.
    #[serde(default)]
    pub add_field: Map<String, Value>,
    /// Tags appended to every event.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Name the additions are attributed to.
    #[serde(default)]
    pub plugin_name: String,
}

impl GlobalMeta {
    /// Creates meta attributed to `plugin_name`.
    #[must_use]
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            ..Self::default()
        }
    }

    /// Sets the event type.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Adds a field overlay.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_field.insert(field.into(), value.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Link stage applying [`GlobalMeta`] to events.
#[derive(Debug)]
pub struct GlobalEnrichStage {
    base: StageBase,
    meta: MetaSlot<GlobalMeta>,
}

impl Default for GlobalEnrichStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalEnrichStage {
    /// Creates the stage with no meta.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: StageBase::new("global_enrich", StageRole::Link),
            meta: MetaSlot::new(),
        }
    }

    /// Attaches the shared settings.
    pub fn accept_meta(&self, meta: GlobalMeta) {
        self.meta.set(meta);
    }

    /// The attached settings, if any.
    #[must_use]
    pub fn meta(&self) -> Option<Arc<GlobalMeta>> {
        self.meta.get()
    }
}

impl Stage for GlobalEnrichStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn do_work(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        let Some(meta) = self.meta() else {
            return self.deliver(ctx, payload);
        };
        let mut event = match payload {
            Payload::Event(event) => event,
            other => return self.deliver(ctx, other),
        };

        if let Some(event_type) = &meta.event_type {
            event.set_if_absent(TYPE_FIELD, event_type.as_str());
        }
        let logger = self.base.logger();
        add_fields(&meta.add_field, &mut event, &meta.plugin_name, logger.as_ref());
        add_tags(&meta.tags, &mut event, &meta.plugin_name, logger.as_ref());

        self.deliver(ctx, Payload::Event(event))
    }
}
