//! Tail stage handing events to the destination queue.

use super::{Stage, StageBase, StageRole};
use crate::core::{Context, Event, Payload};
use crate::errors::{ChainError, ChainResult};
use crate::observability::attributes;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// The destination of finished events.
///
/// `push` blocks until the destination accepts the event; that wait is the
/// chain's only backpressure.
pub trait EventQueue: Send + Sync {
    /// Enqueues one event.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::QueueClosed`] if the receiving side is gone.
    fn push(&self, event: Event) -> ChainResult<()>;
}

/// Must not be called from inside an async runtime.
impl EventQueue for tokio::sync::mpsc::Sender<Event> {
    fn push(&self, event: Event) -> ChainResult<()> {
        self.blocking_send(event).map_err(|_| ChainError::QueueClosed)
    }
}

impl EventQueue for std::sync::mpsc::SyncSender<Event> {
    fn push(&self, event: Event) -> ChainResult<()> {
        self.send(event).map_err(|_| ChainError::QueueClosed)
    }
}

/// Tail stage enqueuing events.
///
/// Structural notifications that reach the tail are dropped.
pub struct DeliveryStage {
    base: StageBase,
    queue: RwLock<Option<Arc<dyn EventQueue>>>,
}

impl fmt::Debug for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryStage")
            .field("base", &self.base)
            .field("has_queue", &self.queue.read().is_some())
            .finish()
    }
}

impl Default for DeliveryStage {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStage {
    /// Creates a tail stage with no queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: StageBase::new("delivery", StageRole::Tail),
            queue: RwLock::new(None),
        }
    }

    /// Attaches the destination queue.
    pub fn add_queue(&self, queue: Arc<dyn EventQueue>) {
        *self.queue.write() = Some(queue);
    }

    /// Returns true if a queue is attached.
    #[must_use]
    pub fn has_queue(&self) -> bool {
        self.queue.read().is_some()
    }
}

impl Stage for DeliveryStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn deliver(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        let Some(event) = payload.into_event() else {
            let logger = self.base.logger();
            if logger.enabled(Level::DEBUG) {
                logger.debug(
                    "Dropping notification at tail",
                    attributes([
                        ("path", Value::String(ctx.path().to_string())),
                        ("action", Value::String(ctx.action().to_string())),
                    ]),
                );
            }
            return Ok(());
        };

        let queue = self
            .queue
            .read()
            .clone()
            .ok_or_else(|| ChainError::not_configured(self.name(), "queue"))?;
        queue.push(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Action;
    use crate::observability::CollectingLogger;
    use crate::testing::CollectingQueue;

    #[test]
    fn test_enqueues_events() {
        let queue = Arc::new(CollectingQueue::new());
        let stage = DeliveryStage::new();
        stage.add_queue(queue.clone());

        stage
            .accept(
                Context::new("/tmp/f", Action::Event),
                Payload::Event(Event::with_message("L1")),
            )
            .unwrap();

        assert_eq!(queue.messages(), vec!["L1"]);
    }

    #[test]
    fn test_drops_structural_notifications() {
        let queue = Arc::new(CollectingQueue::new());
        let logger = Arc::new(CollectingLogger::new());
        let stage = DeliveryStage::new();
        stage.add_queue(queue.clone());
        stage.base().set_logger(logger.clone());

        stage
            .accept(Context::new("/tmp/f", Action::Eof), Payload::Empty)
            .unwrap();

        assert!(queue.is_empty());
        assert_eq!(logger.trace_for(Level::DEBUG).len(), 1);
    }

    #[test]
    fn test_missing_queue_is_an_error() {
        let stage = DeliveryStage::new();
        let result = stage.accept(
            Context::new("/tmp/f", Action::Event),
            Payload::Event(Event::new()),
        );

        assert!(matches!(
            result,
            Err(ChainError::NotConfigured { collaborator: "queue", .. })
        ));
    }

    #[test]
    fn test_tokio_channel_queue() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(4);
        let stage = DeliveryStage::new();
        stage.add_queue(Arc::new(tx));

        stage
            .accept(
                Context::new("/tmp/f", Action::Event),
                Payload::Event(Event::with_message("L1")),
            )
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.get_str("message"), Some("L1"));
    }

    #[test]
    fn test_closed_queue_is_an_error() {
        let (tx, rx) = std::sync::mpsc::sync_channel::<Event>(1);
        drop(rx);
        let stage = DeliveryStage::new();
        stage.add_queue(Arc::new(tx));

        let result = stage.accept(
            Context::new("/tmp/f", Action::Event),
            Payload::Event(Event::new()),
        );
        assert!(matches!(result, Err(ChainError::QueueClosed)));
    }
}
