//! Chain assembly and execution.
//!
//! This module provides:
//! - The chain builder and the assembled channel
//! - Watch sessions with their lifecycle
//! - The file input tying configuration to sessions

mod builder;
mod input;
mod session;

#[cfg(test)]
mod integration_tests;

pub use builder::{ChainBuilder, Channel};
pub use input::{FileInput, DEFAULT_PLUGIN_NAME};
pub use session::WatchSession;
