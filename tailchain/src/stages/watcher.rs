//! Head stage receiving notifications from the external watcher.

use super::{Stage, StageBase, StageRole};
use crate::core::{Context, Payload};
use crate::errors::{ChainError, ChainResult};
use crate::observability::attributes;
use crate::watch::Watcher;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// Lifecycle of a watch session.
///
/// `Unstarted -> Running -> Stopped`; there is no way back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Built but not started.
    #[default]
    Unstarted,
    /// Receiving notifications.
    Running,
    /// Stopped; notifications are discarded.
    Stopped,
}

impl SessionState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point of the chain, owning start and stop of the watcher.
///
/// Each notification holds a read guard on the state until the rest of the
/// chain has returned, and [`stop`](Self::stop) takes the write guard. Once
/// `stop` returns, no notification is in flight and none is forwarded again.
pub struct WatcherStage {
    base: StageBase,
    watcher: RwLock<Option<Arc<dyn Watcher>>>,
    state: RwLock<SessionState>,
}

impl fmt::Debug for WatcherStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherStage")
            .field("base", &self.base)
            .field("has_watcher", &self.watcher.read().is_some())
            .field("state", &*self.state.read_recursive())
            .finish()
    }
}

impl Default for WatcherStage {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherStage {
    /// Creates an unstarted head stage with no watcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: StageBase::new("watcher", StageRole::Head),
            watcher: RwLock::new(None),
            state: RwLock::new(SessionState::Unstarted),
        }
    }

    /// Attaches the watcher this stage starts and stops.
    pub fn add_watcher(&self, watcher: Arc<dyn Watcher>) {
        *self.watcher.write() = Some(watcher);
    }

    /// The attached watcher.
    #[must_use]
    pub fn watcher(&self) -> Option<Arc<dyn Watcher>> {
        self.watcher.read().clone()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read_recursive()
    }

    /// Moves the stage to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NotConfigured`] without a watcher, or
    /// [`ChainError::Lifecycle`] unless the stage is unstarted.
    pub fn start(&self) -> ChainResult<()> {
        if self.watcher.read().is_none() {
            return Err(ChainError::not_configured(self.name(), "watcher"));
        }
        let mut state = self.state.write();
        if *state != SessionState::Unstarted {
            return Err(ChainError::lifecycle(*state, SessionState::Running));
        }
        *state = SessionState::Running;
        Ok(())
    }

    /// Stops the watcher. A no-op unless running.
    ///
    /// Waits for the notification in flight, if any, to leave the chain. Must
    /// not be called from inside the chain.
    pub fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state != SessionState::Running {
                return;
            }
            *state = SessionState::Stopped;
        }
        if let Some(watcher) = self.watcher() {
            watcher.quit();
        }
    }
}

impl Stage for WatcherStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn do_work(&self, ctx: Context, payload: Payload) -> ChainResult<()> {
        let state = self.state.read();
        if *state == SessionState::Stopped {
            return Ok(());
        }

        let logger = self.base.logger();
        if ctx.is_line() && logger.enabled(Level::DEBUG) {
            logger.debug(
                "Received line",
                attributes([
                    ("path", Value::String(ctx.path().to_string())),
                    ("text", Value::String(payload.as_line().unwrap_or_default().to_string())),
                ]),
            );
        }
        self.deliver(ctx, payload)
    }
}
