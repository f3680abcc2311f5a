//! Core domain model types for tailchain.
//!
//! This module contains the values that travel through a chain:
//! - Notification actions and per-notification contexts
//! - File identities used to key decoder state
//! - Events and the payload wrapper
//! - Field and tag decorators shared by the enrichment stages

mod action;
mod context;
pub mod decorators;
mod event;
mod payload;

pub use action::Action;
pub use context::{Context, FileIdentity, IdentityKey};
pub use event::{Event, MESSAGE_FIELD, METADATA_FIELD, TAGS_FIELD, TIMESTAMP_FIELD};
pub use payload::Payload;

use chrono::{SecondsFormat, Utc};

/// Returns the current UTC time as an ISO 8601 string with millisecond precision.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
