//! The file input: configuration, registration and session management.

use super::{ChainBuilder, WatchSession};
use crate::codec::DecoderFactory;
use crate::config::{FileInputConfig, SincedbEnv, TailSettings};
use crate::errors::{ChainError, ChainResult, ConfigError};
use crate::observability::ChainLogger;
use crate::stages::EventQueue;
use crate::watch::Watcher;
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Plugin name additions are attributed to unless overridden.
pub const DEFAULT_PLUGIN_NAME: &str = "file";

/// Turns watched files into events for one configuration.
///
/// Call [`register`](Self::register) once, then [`run`](Self::run) for each
/// watch session. Running again stops the previous session first.
pub struct FileInput {
    config: FileInputConfig,
    plugin_name: String,
    logger: Option<Arc<dyn ChainLogger>>,
    factory: Option<Arc<dyn DecoderFactory>>,
    settings: Option<TailSettings>,
    session: Mutex<Option<Arc<WatchSession>>>,
}

impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInput")
            .field("config", &self.config)
            .field("plugin_name", &self.plugin_name)
            .field("registered", &self.factory.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FileInput {
    /// Creates an unregistered input.
    #[must_use]
    pub fn new(config: FileInputConfig) -> Self {
        Self {
            config,
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            logger: None,
            factory: None,
            settings: None,
            session: Mutex::new(None),
        }
    }

    /// Sets the plugin name additions are attributed to.
    #[must_use]
    pub fn with_plugin_name(mut self, plugin_name: impl Into<String>) -> Self {
        self.plugin_name = plugin_name.into();
        self
    }

    /// Injects a logger into every stage of every session.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn ChainLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &FileInputConfig {
        &self.config
    }

    /// The position database location, once registered.
    #[must_use]
    pub fn sincedb_path(&self) -> Option<&Path> {
        self.settings
            .as_ref()
            .map(|settings| settings.sincedb_path.as_path())
    }

    /// Validates the configuration and resolves the position database.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn register(&mut self, env: &SincedbEnv) -> Result<(), ConfigError> {
        self.config.validate()?;
        let factory = self.config.codec.build_factory()?;
        let sincedb_path = self.config.resolve_sincedb_path(env)?;

        tracing::info!(
            paths = ?self.config.path,
            sincedb_path = %sincedb_path.display(),
            "Registering file input"
        );
        let settings = self.config.watcher_settings(sincedb_path)?;
        self.factory = Some(factory);
        self.settings = Some(settings);
        Ok(())
    }

    /// Settings for the external watcher, once registered.
    #[must_use]
    pub fn watcher_settings(&self) -> Option<TailSettings> {
        self.settings.clone()
    }

    /// The current session, if one is running.
    #[must_use]
    pub fn session(&self) -> Option<Arc<WatchSession>> {
        self.session.lock().clone()
    }

    /// Builds a fresh chain and drives it until the watcher quits.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not registered, the previous session
    /// fails to stop, or the chain fails while running.
    pub fn run(&self, watcher: Arc<dyn Watcher>, queue: Arc<dyn EventQueue>) -> ChainResult<()> {
        let factory = self
            .factory
            .clone()
            .ok_or_else(|| ChainError::not_configured(&self.plugin_name, "registration"))?;

        let previous = self.session.lock().take();
        if let Some(previous) = previous {
            previous.stop()?;
        }

        let mut builder = ChainBuilder::new()
            .with_watcher(watcher)
            .with_decoder_factory(factory)
            .with_queue(queue)
            .with_local_meta(self.config.local_meta())
            .with_global_meta(self.config.global_meta(&self.plugin_name));
        if let Some(logger) = &self.logger {
            builder = builder.with_logger(Arc::clone(logger));
        }

        let session = Arc::new(WatchSession::new(builder.build()?));
        *self.session.lock() = Some(Arc::clone(&session));

        session.tail(self.config.path.as_slice())?;
        session.run()
    }

    /// Stops the current session, flushing every decoder.
    ///
    /// # Errors
    ///
    /// Returns the first flush or delivery error.
    pub fn stop(&self) -> ChainResult<()> {
        let session = self.session.lock().take();
        match session {
            Some(session) => session.stop(),
            None => Ok(()),
        }
    }
}
