//! The boundary to the external file watcher.
//!
//! Discovery, polling and rotation detection live outside this crate. A
//! watcher only has to turn file activity into `(context, payload)` calls
//! on the chain head it was subscribed with.

use crate::errors::ChainResult;
use crate::stages::Stage;
use std::sync::Arc;

/// A source of file notifications.
#[cfg_attr(test, mockall::automock)]
pub trait Watcher: Send + Sync {
    /// Starts watching a path or glob.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot track the path.
    fn tail(&self, path: &str) -> ChainResult<()>;

    /// Drives notifications into `head` until [`quit`](Self::quit) is called.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the chain or the watcher itself.
    fn subscribe(&self, head: Arc<dyn Stage>) -> ChainResult<()>;

    /// Persists positions and forgets every file.
    fn quit(&self);
}
