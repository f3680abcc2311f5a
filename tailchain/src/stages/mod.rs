//! Stage protocol and the stages of a file-input chain.
//!
//! Every stage receives a `(context, payload)` pair through [`Stage::accept`].
//! The provided methods form a fixed pipeline inside each stage:
//!
//! ```text
//! accept -> do_work -> deliver -> downstream.accept
//! ```
//!
//! A link stage overrides [`Stage::do_work`] to transform, filter or branch;
//! a tail stage overrides [`Stage::deliver`] to hand data out of the chain.
//! Everything else (naming, the neighbour references, the injected logger)
//! lives in an embedded [`StageBase`].

mod decoder;
mod delivery;
mod global;
mod local;
mod watcher;

pub use decoder::{DecoderRegistry, DecoderStage};
pub use delivery::{DeliveryStage, EventQueue};
pub use global::{GlobalEnrichStage, GlobalMeta, TYPE_FIELD};
pub use local::{LocalEnrichStage, LocalMeta, HOST_FIELD, METADATA_PATH, PATH_FIELD};
pub use watcher::{SessionState, WatcherStage};

use crate::core::{Context, Payload};
use crate::errors::{ChainError, ChainResult};
use crate::observability::{ChainLogger, TracingLogger};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Position of a stage in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Receives notifications from outside the chain.
    Head,
    /// Transforms and forwards.
    Link,
    /// Hands data out of the chain.
    Tail,
}

impl StageRole {
    /// Returns the role as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Link => "link",
            Self::Tail => "tail",
        }
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared by every stage.
///
/// The downstream reference is strong and the upstream reference weak, so a
/// chain is owned from its head and dropping the head releases it.
pub struct StageBase {
    name: String,
    role: StageRole,
    upstream: RwLock<Option<Weak<dyn Stage>>>,
    downstream: RwLock<Option<Arc<dyn Stage>>>,
    logger: RwLock<Arc<dyn ChainLogger>>,
}

impl StageBase {
    /// Creates the base for a stage, logging through `tracing`.
    #[must_use]
    pub fn new(name: impl Into<String>, role: StageRole) -> Self {
        let name = name.into();
        let logger: Arc<dyn ChainLogger> = Arc::new(TracingLogger::for_component(name.clone()));
        Self {
            name,
            role,
            upstream: RwLock::new(None),
            downstream: RwLock::new(None),
            logger: RwLock::new(logger),
        }
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stage role.
    #[must_use]
    pub const fn role(&self) -> StageRole {
        self.role
    }

    /// Sets the stage that receives forwarded calls.
    pub fn set_downstream(&self, stage: Arc<dyn Stage>) {
        *self.downstream.write() = Some(stage);
    }

    /// Records the stage that forwards into this one.
    pub fn set_upstream(&self, stage: &Arc<dyn Stage>) {
        *self.upstream.write() = Some(Arc::downgrade(stage));
    }

    /// The downstream stage, if linked.
    #[must_use]
    pub fn downstream(&self) -> Option<Arc<dyn Stage>> {
        self.downstream.read().clone()
    }

    /// The upstream stage, if linked and still alive.
    #[must_use]
    pub fn upstream(&self) -> Option<Arc<dyn Stage>> {
        self.upstream.read().as_ref().and_then(Weak::upgrade)
    }

    /// The injected logger.
    #[must_use]
    pub fn logger(&self) -> Arc<dyn ChainLogger> {
        Arc::clone(&self.logger.read())
    }

    /// Replaces the injected logger.
    pub fn set_logger(&self, logger: Arc<dyn ChainLogger>) {
        *self.logger.write() = logger;
    }

    /// Passes a call to the downstream stage.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NoDownstream`] if nothing is linked, otherwise
    /// whatever the downstream stage returns.
    pub fn forward(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        let downstream = self.downstream().ok_or_else(|| ChainError::NoDownstream {
            stage: self.name.clone(),
        })?;
        downstream.accept(ctx, payload)
    }
}

impl fmt::Debug for StageBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageBase")
            .field("name", &self.name)
            .field("role", &self.role)
            .field(
                "downstream",
                &self.downstream.read().as_ref().map(|s| s.name().to_string()),
            )
            .finish_non_exhaustive()
    }
}

/// A unit of the event-processing chain.
pub trait Stage: Send + Sync + fmt::Debug {
    /// The embedded base.
    fn base(&self) -> &StageBase;

    /// Returns the name of the stage.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Returns the role of the stage.
    fn role(&self) -> StageRole {
        self.base().role()
    }

    /// Entry point for a `(context, payload)` pair.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by this stage or a stage after it.
    fn accept(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        self.do_work(ctx, payload)
    }

    /// Transforms the pair. Defaults to [`deliver`](Self::deliver).
    ///
    /// # Errors
    ///
    /// Propagates any error raised by this stage or a stage after it.
    fn do_work(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        self.deliver(ctx, payload)
    }

    /// Hands the pair on. Defaults to forwarding downstream.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by a stage after this one.
    fn deliver(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        self.base().forward(ctx, payload)
    }
}

/// Links `upstream` to forward into `downstream`.
pub fn link(upstream: &Arc<dyn Stage>, downstream: &Arc<dyn Stage>) {
    upstream.base().set_downstream(Arc::clone(downstream));
    downstream.base().set_upstream(upstream);
}

/// Typed, read-only configuration attached to a stage after construction.
///
/// An empty slot reads as "no configured value" for every key.
#[derive(Debug)]
pub struct MetaSlot<M> {
    meta: RwLock<Option<Arc<M>>>,
}

impl<M> Default for MetaSlot<M> {
    fn default() -> Self {
        Self {
            meta: RwLock::new(None),
        }
    }
}

impl<M> MetaSlot<M> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the meta.
    pub fn set(&self, meta: M) {
        *self.meta.write() = Some(Arc::new(meta));
    }

    /// Returns the meta, if set.
    #[must_use]
    pub fn get(&self) -> Option<Arc<M>> {
        self.meta.read().clone()
    }

    /// Returns true if meta was attached.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.meta.read().is_some()
    }
}

/// A link stage that forwards everything unchanged.
#[derive(Debug)]
pub struct PassthroughStage {
    base: StageBase,
}

impl PassthroughStage {
    /// Creates a passthrough stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: StageBase::new(name, StageRole::Link),
        }
    }
}

impl Stage for PassthroughStage {
    fn base(&self) -> &StageBase {
        &self.base
    }
}
