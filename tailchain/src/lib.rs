//! # Tailchain
//!
//! The event-processing chain behind a log-shipping file input.
//!
//! A watcher reports file activity (created, line, eof, timed out, deleted)
//! and tailchain turns it into decorated events on a destination queue:
//!
//! - **Stage protocol**: single-responsibility stages linked head to tail
//! - **Identity-mapped decoding**: one stateful decoder per file, evicted when idle
//! - **Enrichment**: host and path locally, type, fields and tags globally
//! - **Delivery**: blocking handoff, so a slow consumer slows the watcher
//! - **Lifecycle**: start and stop of the watcher, with decoder flush on stop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tailchain::prelude::*;
//!
//! let mut input = FileInput::new(FileInputConfig::new(["/var/log/app/*.log"]));
//! input.register(&SincedbEnv::from_process())?;
//!
//! // Blocks until the watcher quits.
//! input.run(watcher, Arc::new(queue_sender))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod codec;
pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod watch;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{Decoder, DecoderFactory, DecoderKind, MultilineConfig};
    pub use crate::config::{FileInputConfig, SinceDbEntry, SincedbEnv, StartPosition, TailSettings};
    pub use crate::core::{Action, Context, Event, FileIdentity, Payload};
    pub use crate::errors::{AssemblyError, ChainError, ChainResult, ConfigError, DecodeError};
    pub use crate::observability::{init_tracing, ChainLogger, LogFormat, TracingLogger};
    pub use crate::pipeline::{ChainBuilder, Channel, FileInput, WatchSession};
    pub use crate::stages::{EventQueue, GlobalMeta, LocalMeta, SessionState, Stage};
    pub use crate::watch::Watcher;
}
