//! Chain assembly with validation.

use crate::codec::DecoderFactory;
use crate::errors::{AssemblyError, ChainResult};
use crate::observability::ChainLogger;
use crate::stages::{
    link, DecoderStage, DeliveryStage, EventQueue, GlobalEnrichStage, GlobalMeta,
    LocalEnrichStage, LocalMeta, SessionState, Stage, WatcherStage,
};
use crate::watch::Watcher;
use std::fmt;
use std::sync::Arc;

/// Builder for the five-stage file-input chain.
///
/// ```text
/// watcher -> decoder -> local_enrich -> global_enrich -> delivery
/// ```
#[derive(Default)]
pub struct ChainBuilder {
    watcher: Option<Arc<dyn Watcher>>,
    factory: Option<Arc<dyn DecoderFactory>>,
    queue: Option<Arc<dyn EventQueue>>,
    tail: Option<Arc<dyn Stage>>,
    logger: Option<Arc<dyn ChainLogger>>,
    local_meta: Option<LocalMeta>,
    global_meta: Option<GlobalMeta>,
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("has_watcher", &self.watcher.is_some())
            .field("has_factory", &self.factory.is_some())
            .field("has_queue", &self.queue.is_some())
            .field("tail", &self.tail.as_ref().map(|t| t.name().to_string()))
            .field("local_meta", &self.local_meta)
            .field("global_meta", &self.global_meta)
            .finish_non_exhaustive()
    }
}

impl ChainBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the watcher driving the head stage.
    #[must_use]
    pub fn with_watcher(mut self, watcher: Arc<dyn Watcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Sets the factory creating per-identity decoders.
    #[must_use]
    pub fn with_decoder_factory(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the destination queue.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn EventQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Replaces the delivery stage with a custom tail.
    #[must_use]
    pub fn with_tail(mut self, tail: Arc<dyn Stage>) -> Self {
        self.tail = Some(tail);
        self
    }

    /// Injects one logger into every stage.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn ChainLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the local enrichment settings.
    #[must_use]
    pub fn with_local_meta(mut self, meta: LocalMeta) -> Self {
        self.local_meta = Some(meta);
        self
    }

    /// Sets the global enrichment settings.
    #[must_use]
    pub fn with_global_meta(mut self, meta: GlobalMeta) -> Self {
        self.global_meta = Some(meta);
        self
    }

    /// Builds and links the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher, the decoder factory, or both the
    /// queue and a custom tail are missing.
    pub fn build(self) -> Result<Channel, AssemblyError> {
        let watcher = self.watcher.ok_or_else(AssemblyError::missing_watcher)?;
        let factory = self.factory.ok_or_else(AssemblyError::missing_decoder)?;
        let tail: Arc<dyn Stage> = match (self.tail, self.queue) {
            (Some(tail), _) => tail,
            (None, Some(queue)) => {
                let delivery = DeliveryStage::new();
                delivery.add_queue(queue);
                Arc::new(delivery)
            }
            (None, None) => return Err(AssemblyError::missing_queue()),
        };

        let watcher_stage = Arc::new(WatcherStage::new());
        watcher_stage.add_watcher(watcher);
        let decoder_stage = Arc::new(DecoderStage::new(factory));
        let local_stage = LocalEnrichStage::new();
        if let Some(meta) = self.local_meta {
            local_stage.accept_meta(meta);
        }
        let global_stage = GlobalEnrichStage::new();
        if let Some(meta) = self.global_meta {
            global_stage.accept_meta(meta);
        }

        let stages: Vec<Arc<dyn Stage>> = vec![
            watcher_stage.clone(),
            decoder_stage.clone(),
            Arc::new(local_stage),
            Arc::new(global_stage),
            tail,
        ];
        for pair in stages.windows(2) {
            link(&pair[0], &pair[1]);
        }
        if let Some(logger) = &self.logger {
            for stage in &stages {
                stage.base().set_logger(Arc::clone(logger));
            }
        }

        Ok(Channel {
            watcher_stage,
            decoder_stage,
            stages,
        })
    }
}

/// One assembled chain, fixed for the lifetime of a watch session.
#[derive(Debug)]
pub struct Channel {
    watcher_stage: Arc<WatcherStage>,
    decoder_stage: Arc<DecoderStage>,
    stages: Vec<Arc<dyn Stage>>,
}

impl Channel {
    /// The head stage notifications enter through.
    #[must_use]
    pub fn head(&self) -> Arc<dyn Stage> {
        self.watcher_stage.clone()
    }

    /// Every stage, head first.
    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Stage names, head first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// The head stage.
    #[must_use]
    pub fn watcher_stage(&self) -> &Arc<WatcherStage> {
        &self.watcher_stage
    }

    /// The decoding stage.
    #[must_use]
    pub fn decoder_stage(&self) -> &Arc<DecoderStage> {
        &self.decoder_stage
    }

    /// Number of identities with live decoder state.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.decoder_stage.identity_count()
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.watcher_stage.state()
    }

    /// Starts the head stage.
    ///
    /// # Errors
    ///
    /// Returns an error unless the chain is unstarted.
    pub fn start(&self) -> ChainResult<()> {
        self.watcher_stage.start()
    }

    /// Stops the watcher, then flushes every decoder through the chain.
    ///
    /// # Errors
    ///
    /// Returns the first flush or delivery error.
    pub fn stop(&self) -> ChainResult<()> {
        self.watcher_stage.stop();
        self.decoder_stage.stop()
    }
}
