//! One watch session over an assembled chain.

use super::Channel;
use crate::errors::ChainResult;
use crate::stages::SessionState;
use tracing::Span;
use uuid::Uuid;

/// A chain bound to a watcher for one run.
///
/// Every lifecycle call is recorded inside a `watch_session` span carrying
/// the session id.
#[derive(Debug)]
pub struct WatchSession {
    id: Uuid,
    channel: Channel,
    span: Span,
}

impl WatchSession {
    /// Wraps an assembled chain.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("watch_session", session_id = %id);
        Self { id, channel, span }
    }

    /// The session id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The chain.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.channel.state()
    }

    /// Asks the watcher to tail each path.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the watcher.
    pub fn tail<S: AsRef<str>>(&self, paths: &[S]) -> ChainResult<()> {
        let _enter = self.span.enter();
        let watcher = self.channel.watcher_stage().watcher();
        for path in paths {
            let path = path.as_ref();
            if let Some(watcher) = &watcher {
                watcher.tail(path)?;
            }
            tracing::debug!(path, "Tailing path");
        }
        Ok(())
    }

    /// Starts the session.
    ///
    /// # Errors
    ///
    /// Returns an error unless the session is unstarted.
    pub fn start(&self) -> ChainResult<()> {
        let _enter = self.span.enter();
        self.channel.start()?;
        tracing::info!("Watch session started");
        Ok(())
    }

    /// Starts the session and drives notifications until the watcher quits.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error, or the first error raised while driving
    /// the chain.
    pub fn run(&self) -> ChainResult<()> {
        self.start()?;
        let _enter = self.span.enter();
        match self.channel.watcher_stage().watcher() {
            Some(watcher) => watcher.subscribe(self.channel.head()),
            None => Ok(()),
        }
    }

    /// Stops the watcher and flushes every decoder. A no-op unless running.
    ///
    /// # Errors
    ///
    /// Returns the first flush or delivery error.
    pub fn stop(&self) -> ChainResult<()> {
        let _enter = self.span.enter();
        if self.state() != SessionState::Running {
            return Ok(());
        }
        let identities = self.channel.identity_count();
        self.channel.stop()?;
        tracing::info!(flushed_identities = identities, "Watch session stopped");
        Ok(())
    }
}
