//! Attaches the originating path and the local host.

use super::{MetaSlot, Stage, StageBase, StageRole};
use crate::core::{Context, Payload};
use crate::errors::ChainResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Field receiving the host name.
pub const HOST_FIELD: &str = "host";
/// Field receiving the source path when the decoder did not set one.
pub const PATH_FIELD: &str = "path";
/// Metadata reference always receiving the source path.
pub const METADATA_PATH: &str = "[@metadata][path]";

/// Instance-local settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMeta {
    /// Host name to stamp on events that lack one.
    #[serde(default)]
    pub host: Option<String>,
}

impl LocalMeta {
    /// Creates meta declaring a host.
    #[must_use]
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
        }
    }
}

/// Link stage adding `host`, `path` and `[@metadata][path]`.
///
/// `host` and `path` are first-writer-wins: values the decoder produced
/// are kept.
#[derive(Debug)]
pub struct LocalEnrichStage {
    base: StageBase,
    meta: MetaSlot<LocalMeta>,
}

impl Default for LocalEnrichStage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEnrichStage {
    /// Creates the stage with no meta.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: StageBase::new("local_enrich", StageRole::Link),
            meta: MetaSlot::new(),
        }
    }

    /// Attaches the local settings.
    pub fn accept_meta(&self, meta: LocalMeta) {
        self.meta.set(meta);
    }

    /// The attached settings, if any.
    #[must_use]
    pub fn meta(&self) -> Option<Arc<LocalMeta>> {
        self.meta.get()
    }
}

impl Stage for LocalEnrichStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn do_work(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        let mut event = match payload {
            Payload::Event(event) => event,
            other => return self.deliver(ctx, other),
        };

        if let Some(host) = self.meta().and_then(|meta| meta.host.clone()) {
            event.set_if_absent(HOST_FIELD, host);
        }
        event.set(METADATA_PATH, ctx.path());
        event.set_if_absent(PATH_FIELD, ctx.path());

        self.deliver(ctx, Payload::Event(event))
    }
}
