//! Testing utilities for tailchain chains.
//!
//! This module provides:
//! - A recording tail stage and an in-memory queue
//! - A scripted watcher that replays notifications
//! - A decoder factory that records what its decoders saw
//! - Assertions for recorded calls and events

mod assertions;
mod mocks;

pub use assertions::{
    assert_actions, assert_event_field, assert_has_tag, assert_messages,
};
pub use mocks::{
    CollectingQueue, RecordingStage, ScriptedWatcher, TracingDecoder, TracingDecoderFactory,
};
