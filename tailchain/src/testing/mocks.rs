//! Test doubles for chain collaborators.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::codec::{Decoder, DecoderFactory};
use crate::core::{Action, Context, Event, Payload};
use crate::errors::{ChainResult, DecodeError};
use crate::stages::{EventQueue, Stage, StageBase, StageRole};
use crate::watch::Watcher;

/// A tail stage that records every call it receives.
#[derive(Debug)]
pub struct RecordingStage {
    base: StageBase,
    calls: Mutex<Vec<(Context, Payload)>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: StageBase::new(name, StageRole::Tail),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<(Context, Payload)> {
        self.calls.lock().clone()
    }

    /// Returns the actions of every recorded call.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.calls.lock().iter().map(|(ctx, _)| ctx.action()).collect()
    }

    /// Returns the event payloads, skipping other calls.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(_, payload)| payload.as_event().cloned())
            .collect()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Forgets recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Stage for RecordingStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn deliver(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        self.calls.lock().push((ctx, payload));
        Ok(())
    }
}

/// An [`EventQueue`] that keeps events in memory.
#[derive(Debug, Default)]
pub struct CollectingQueue {
    events: Mutex<Vec<Event>>,
}

impl CollectingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every enqueued event.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Returns the `message` of every enqueued event.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.get_str("message").map(str::to_string))
            .collect()
    }

    /// Returns the number of enqueued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was enqueued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventQueue for CollectingQueue {
    fn push(&self, event: Event) -> ChainResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// A watcher that replays a fixed list of notifications on subscribe.
#[derive(Debug, Default)]
pub struct ScriptedWatcher {
    script: Mutex<Vec<(Context, Payload)>>,
    tailed: Mutex<Vec<String>>,
    quits: AtomicUsize,
}

impl ScriptedWatcher {
    /// Creates a watcher with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a structural notification.
    #[must_use]
    pub fn notify(self, path: &str, action: Action) -> Self {
        self.script
            .lock()
            .push((Context::new(path, action), Payload::Empty));
        self
    }

    /// Appends a line notification.
    #[must_use]
    pub fn line(self, path: &str, text: &str) -> Self {
        self.script.lock().push((
            Context::new(path, Action::Line),
            Payload::Line(text.to_string()),
        ));
        self
    }

    /// Appends an arbitrary notification.
    #[must_use]
    pub fn push(self, ctx: Context, payload: Payload) -> Self {
        self.script.lock().push((ctx, payload));
        self
    }

    /// Returns the paths passed to `tail`.
    #[must_use]
    pub fn tailed(&self) -> Vec<String> {
        self.tailed.lock().clone()
    }

    /// Returns how many times `quit` was called.
    #[must_use]
    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

impl Watcher for ScriptedWatcher {
    fn tail(&self, path: &str) -> ChainResult<()> {
        self.tailed.lock().push(path.to_string());
        Ok(())
    }

    fn subscribe(&self, head: Arc<dyn Stage>) -> ChainResult<()> {
        let script = std::mem::take(&mut *self.script.lock());
        for (ctx, payload) in script {
            head.accept(ctx, payload)?;
        }
        Ok(())
    }

    fn quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct DecoderTrace {
    created: AtomicUsize,
    flushes: AtomicUsize,
    lines: Mutex<Vec<String>>,
}

/// A decoder emitting one event per line and recording what it saw.
#[derive(Debug)]
pub struct TracingDecoder {
    trace: Arc<DecoderTrace>,
    flush_output: Vec<String>,
    fail_on: Option<String>,
}

impl Decoder for TracingDecoder {
    fn decode(&mut self, line: &str) -> Result<Vec<Event>, DecodeError> {
        self.trace.lines.lock().push(line.to_string());
        if self.fail_on.as_deref() == Some(line) {
            return Err(DecodeError::Other(format!("refusing to decode '{line}'")));
        }
        Ok(vec![Event::with_message(line)])
    }

    fn flush(&mut self) -> Result<Vec<Event>, DecodeError> {
        self.trace.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(self.flush_output.iter().map(Event::with_message).collect())
    }
}

/// Factory for [`TracingDecoder`]s sharing one call trace.
#[derive(Debug, Default)]
pub struct TracingDecoderFactory {
    trace: Arc<DecoderTrace>,
    flush_output: Vec<String>,
    fail_on: Option<String>,
}

impl TracingDecoderFactory {
    /// Creates a factory whose decoders flush nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every decoder emit these messages when flushed.
    #[must_use]
    pub fn with_flush_output<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flush_output = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Makes decoders fail on this exact line.
    #[must_use]
    pub fn failing_on(mut self, line: impl Into<String>) -> Self {
        self.fail_on = Some(line.into());
        self
    }

    /// Number of decoders created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.trace.created.load(Ordering::SeqCst)
    }

    /// Number of flushes across all decoders.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.trace.flushes.load(Ordering::SeqCst)
    }

    /// Every line decoded, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.trace.lines.lock().clone()
    }
}

impl DecoderFactory for TracingDecoderFactory {
    fn create(&self) -> Box<dyn Decoder> {
        self.trace.created.fetch_add(1, Ordering::SeqCst);
        Box::new(TracingDecoder {
            trace: Arc::clone(&self.trace),
            flush_output: self.flush_output.clone(),
            fail_on: self.fail_on.clone(),
        })
    }
}
