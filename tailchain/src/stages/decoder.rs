//! Identity-mapped decoding.
//!
//! One decoder instance exists per file identity. Decoders are created the
//! first time an identity produces a line and are flushed and dropped when
//! the watcher reports the file idle, or when the chain stops.

use super::{Stage, StageBase, StageRole};
use crate::codec::{Decoder, DecoderFactory};
use crate::core::{Action, Context, Event, IdentityKey, Payload};
use crate::errors::{ChainError, ChainResult, DecodeError};
use crate::observability::attributes;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

struct IdentitySlot {
    path: String,
    decoder: Box<dyn Decoder>,
}

/// Decoder instances keyed by file identity.
///
/// A decoder only runs while its shard entry is held, so one identity is
/// never decoded concurrently. Results are returned after the entry is
/// released.
pub struct DecoderRegistry {
    factory: Arc<dyn DecoderFactory>,
    slots: DashMap<IdentityKey, IdentitySlot>,
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("identities", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl DecoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(factory: Arc<dyn DecoderFactory>) -> Self {
        Self {
            factory,
            slots: DashMap::new(),
        }
    }

    /// Feeds a line to the decoder for `key`, creating it if needed.
    ///
    /// Returns the events completed by the line and whether a decoder was created.
    ///
    /// # Errors
    ///
    /// Propagates the decoder's error. The decoder stays registered.
    pub fn decode(
        &self,
        key: IdentityKey,
        path: &str,
        line: &str,
    ) -> Result<(Vec<Event>, bool), DecodeError> {
        let mut created = false;
        let mut slot = self.slots.entry(key).or_insert_with(|| {
            created = true;
            IdentitySlot {
                path: path.to_string(),
                decoder: self.factory.create(),
            }
        });
        let events = slot.decoder.decode(line)?;
        Ok((events, created))
    }

    /// Removes the decoder for `key` and returns its flushed output.
    ///
    /// Returns `Ok(None)` for an unknown identity.
    ///
    /// # Errors
    ///
    /// Propagates the flush error. The identity is removed either way.
    pub fn evict(&self, key: &IdentityKey) -> Result<Option<Vec<Event>>, DecodeError> {
        match self.slots.remove(key) {
            Some((_, mut slot)) => slot.decoder.flush().map(Some),
            None => Ok(None),
        }
    }

    /// Returns every registered identity with the path it was first seen on.
    #[must_use]
    pub fn identities(&self) -> Vec<(IdentityKey, String)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().path.clone()))
            .collect()
    }

    /// Returns true if a decoder exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of live identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no identity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Link stage routing lines through per-identity decoders.
#[derive(Debug)]
pub struct DecoderStage {
    base: StageBase,
    registry: DecoderRegistry,
}

impl DecoderStage {
    /// Creates a decoding stage.
    #[must_use]
    pub fn new(factory: Arc<dyn DecoderFactory>) -> Self {
        Self {
            base: StageBase::new("decoder", StageRole::Link),
            registry: DecoderRegistry::new(factory),
        }
    }

    /// The identity registry.
    #[must_use]
    pub const fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Number of identities with live decoder state.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.registry.len()
    }

    /// Flushes and evicts every identity, forwarding what the decoders held.
    ///
    /// # Errors
    ///
    /// Returns the first flush or downstream error. Identities after the
    /// failing one stay registered.
    pub fn stop(&self) -> ChainResult<()> {
        for (key, path) in self.registry.identities() {
            let mut ctx = Context::new(path, Action::Event);
            if let IdentityKey::File(identity) = &key {
                ctx = ctx.with_identity(*identity);
            }
            self.evict(&ctx, &key)?;
        }
        Ok(())
    }

    fn evict(&self, ctx: &Context, key: &IdentityKey) -> ChainResult<()> {
        let Some(events) = self.registry.evict(key)? else {
            return Ok(());
        };

        let logger = self.base.logger();
        if logger.enabled(Level::DEBUG) {
            logger.debug(
                "Evicted decoder",
                attributes([
                    ("identity", Value::String(key.to_string())),
                    ("flushed", Value::from(events.len())),
                ]),
            );
        }
        self.forward_events(ctx, events)
    }

    fn forward_events(&self, ctx: &Context, events: Vec<Event>) -> ChainResult<()> {
        for event in events {
            self.deliver(ctx.with_action(Action::Event), Payload::Event(event))?;
        }
        Ok(())
    }
}

impl Stage for DecoderStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn do_work(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        match ctx.action() {
            Action::Line => {
                let Payload::Line(line) = &payload else {
                    return Err(ChainError::UnexpectedPayload {
                        stage: self.name().to_string(),
                        action: ctx.action().to_string(),
                    });
                };
                let key = ctx.identity_key();
                let (events, created) = self.registry.decode(key.clone(), ctx.path(), line)?;
                if created {
                    let logger = self.base.logger();
                    if logger.enabled(Level::DEBUG) {
                        logger.debug(
                            "Created decoder",
                            attributes([
                                ("identity", Value::String(key.to_string())),
                                ("path", Value::String(ctx.path().to_string())),
                            ]),
                        );
                    }
                }
                self.forward_events(&ctx, events)
            }
            Action::TimedOut => {
                let key = ctx.identity_key();
                self.evict(&ctx, &key)
            }
            _ => self.deliver(ctx, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileIdentity;
    use crate::stages::link;
    use crate::testing::{RecordingStage, TracingDecoderFactory};
    use pretty_assertions::assert_eq;

    fn stage_with_sink(
        factory: Arc<TracingDecoderFactory>,
    ) -> (Arc<DecoderStage>, Arc<RecordingStage>) {
        let stage = Arc::new(DecoderStage::new(factory));
        let sink = Arc::new(RecordingStage::new("sink"));
        let stage_dyn: Arc<dyn Stage> = stage.clone();
        let sink_dyn: Arc<dyn Stage> = sink.clone();
        link(&stage_dyn, &sink_dyn);
        (stage, sink)
    }

    fn line(path: &str, text: &str) -> (Context, Payload) {
        (
            Context::new(path, Action::Line),
            Payload::Line(text.to_string()),
        )
    }

    #[test]
    fn test_line_creates_identity_and_forwards_event() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, sink) = stage_with_sink(factory.clone());

        let (ctx, payload) = line("/tmp/f", "L1");
        stage.accept(ctx, payload).unwrap();

        assert_eq!(stage.identity_count(), 1);
        assert_eq!(factory.created(), 1);

        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.action(), Action::Event);
        assert_eq!(calls[0].0.path(), "/tmp/f");
        assert_eq!(
            calls[0].1.as_event().and_then(|e| e.get_str("message")),
            Some("L1")
        );
    }

    #[test]
    fn test_one_decoder_per_identity() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, _sink) = stage_with_sink(factory.clone());

        for (path, text) in [("/a", "1"), ("/a", "2"), ("/b", "3")] {
            let (ctx, payload) = line(path, text);
            stage.accept(ctx, payload).unwrap();
        }

        assert_eq!(stage.identity_count(), 2);
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_file_identity_survives_rename() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, _sink) = stage_with_sink(factory.clone());
        let identity = FileIdentity::new(7, 8, 1);

        stage
            .accept(
                Context::new("/var/log/app.log", Action::Line).with_identity(identity),
                Payload::Line("a".to_string()),
            )
            .unwrap();
        stage
            .accept(
                Context::new("/var/log/app.log.1", Action::Line).with_identity(identity),
                Payload::Line("b".to_string()),
            )
            .unwrap();

        assert_eq!(stage.identity_count(), 1);
        assert!(stage.registry().contains(&IdentityKey::File(identity)));
    }

    #[test]
    fn test_timed_out_with_empty_flush_forwards_nothing() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, sink) = stage_with_sink(factory.clone());

        let (ctx, payload) = line("/tmp/f", "L1");
        stage.accept(ctx, payload).unwrap();
        sink.clear();

        stage
            .accept(Context::new("/tmp/f", Action::TimedOut), Payload::Empty)
            .unwrap();

        assert_eq!(stage.identity_count(), 0);
        assert_eq!(factory.flushes(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_timed_out_forwards_flush_output_as_event() {
        let factory = Arc::new(TracingDecoderFactory::new().with_flush_output(vec!["tail"]));
        let (stage, sink) = stage_with_sink(factory);

        let (ctx, payload) = line("/tmp/f", "L1");
        stage.accept(ctx, payload).unwrap();
        sink.clear();

        stage
            .accept(Context::new("/tmp/f", Action::TimedOut), Payload::Empty)
            .unwrap();

        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.action(), Action::Event);
        assert_eq!(
            calls[0].1.as_event().and_then(|e| e.get_str("message")),
            Some("tail")
        );
    }

    #[test]
    fn test_timed_out_for_unknown_identity_is_noop() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, sink) = stage_with_sink(factory.clone());

        stage
            .accept(Context::new("/never/seen", Action::TimedOut), Payload::Empty)
            .unwrap();

        assert_eq!(factory.flushes(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_each_timed_out_evicts_exactly_one_identity() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, sink) = stage_with_sink(factory.clone());
        let paths = ["/a", "/b", "/c", "/d"];

        for path in paths {
            let (ctx, payload) = line(path, "x");
            stage.accept(ctx, payload).unwrap();
        }
        assert_eq!(stage.identity_count(), paths.len());
        sink.clear();

        for (evicted, path) in paths.iter().enumerate() {
            stage
                .accept(Context::new("/never/seen", Action::TimedOut), Payload::Empty)
                .unwrap();
            assert_eq!(stage.identity_count(), paths.len() - evicted);

            stage
                .accept(Context::new(*path, Action::TimedOut), Payload::Empty)
                .unwrap();
            assert_eq!(stage.identity_count(), paths.len() - evicted - 1);
            assert!(!stage.registry().contains(&IdentityKey::Path((*path).to_string())));
        }

        assert_eq!(factory.flushes(), paths.len());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_structural_actions_forward_unchanged() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, sink) = stage_with_sink(factory.clone());

        for action in [Action::Created, Action::Eof, Action::Deleted] {
            stage
                .accept(Context::new("/tmp/f", action), Payload::Empty)
                .unwrap();
        }

        let actions: Vec<Action> = sink.calls().iter().map(|(c, _)| c.action()).collect();
        assert_eq!(actions, vec![Action::Created, Action::Eof, Action::Deleted]);
        assert_eq!(stage.identity_count(), 0);
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_line_without_text_is_rejected() {
        let factory = Arc::new(TracingDecoderFactory::new());
        let (stage, _sink) = stage_with_sink(factory);

        let result = stage.accept(Context::new("/tmp/f", Action::Line), Payload::Empty);
        assert!(matches!(
            result,
            Err(ChainError::UnexpectedPayload { ref action, .. }) if action == "line"
        ));
    }

    #[test]
    fn test_decoder_errors_propagate() {
        let factory = Arc::new(TracingDecoderFactory::new().failing_on("boom"));
        let (stage, sink) = stage_with_sink(factory);

        let (ctx, payload) = line("/tmp/f", "boom");
        let result = stage.accept(ctx, payload);

        assert!(matches!(result, Err(ChainError::Decode(_))));
        assert!(sink.is_empty());
        assert_eq!(stage.identity_count(), 1);
    }

    #[test]
    fn test_stop_flushes_every_identity() {
        let factory = Arc::new(TracingDecoderFactory::new().with_flush_output(vec!["rest"]));
        let (stage, sink) = stage_with_sink(factory.clone());

        for path in ["/a", "/b", "/c"] {
            let (ctx, payload) = line(path, "x");
            stage.accept(ctx, payload).unwrap();
        }
        sink.clear();

        stage.stop().unwrap();

        assert_eq!(stage.identity_count(), 0);
        assert_eq!(factory.flushes(), 3);

        let mut paths: Vec<String> = sink
            .calls()
            .iter()
            .map(|(c, _)| c.path().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
    }
}
