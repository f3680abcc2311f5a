//! File input configuration.
//!
//! [`FileInputConfig`] is what an operator writes. It is validated once at
//! registration; the chain only ever sees the [`LocalMeta`] and
//! [`GlobalMeta`] derived from it, and the watcher only sees
//! [`TailSettings`].

mod sincedb;

pub use sincedb::SinceDbEntry;

use crate::codec::DecoderKind;
use crate::errors::ConfigError;
use crate::stages::{GlobalMeta, LocalMeta};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the single-database file used before per-input databases.
pub const LEGACY_SINCEDB: &str = ".sincedb";

/// Where a newly discovered file is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Read existing content.
    Beginning,
    /// Only read what is appended from now on.
    #[default]
    End,
}

/// Configuration for one file input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInputConfig {
    /// Absolute paths or globs to watch.
    pub path: Vec<String>,
    /// Filename globs to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Seconds between checks of watched files.
    #[serde(default = "default_stat_interval")]
    pub stat_interval: f64,
    /// Seconds between glob expansions.
    #[serde(default = "default_discover_interval")]
    pub discover_interval: f64,
    /// Explicit position database location.
    #[serde(default)]
    pub sincedb_path: Option<PathBuf>,
    /// Seconds between position database writes.
    #[serde(default = "default_sincedb_write_interval")]
    pub sincedb_write_interval: f64,
    /// Where to start reading new files.
    #[serde(default)]
    pub start_position: StartPosition,
    /// Line separator.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Skip files last modified longer ago than this, in seconds.
    #[serde(default = "default_ignore_older")]
    pub ignore_older: f64,
    /// Close files idle longer than this, in seconds.
    #[serde(default = "default_close_older")]
    pub close_older: f64,
    /// Host name for events; the machine name when unset.
    #[serde(default)]
    pub host: Option<String>,
    /// Event type.
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    /// Fields merged into every event.
    #[serde(default)]
    pub add_field: Map<String, Value>,
    /// Tags appended to every event.
    #[serde(default)]
    pub tags: Vec<String>,
    /// How lines become events.
    #[serde(default)]
    pub codec: DecoderKind,
}

fn default_stat_interval() -> f64 {
    1.0
}

fn default_discover_interval() -> f64 {
    15.0
}

fn default_sincedb_write_interval() -> f64 {
    15.0
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_ignore_older() -> f64 {
    24.0 * 60.0 * 60.0
}

fn default_close_older() -> f64 {
    60.0 * 60.0
}

impl FileInputConfig {
    /// Creates a configuration watching `paths` with every other setting defaulted.
    #[must_use]
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: paths.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
            stat_interval: default_stat_interval(),
            discover_interval: default_discover_interval(),
            sincedb_path: None,
            sincedb_write_interval: default_sincedb_write_interval(),
            start_position: StartPosition::default(),
            delimiter: default_delimiter(),
            ignore_older: default_ignore_older(),
            close_older: default_close_older(),
            host: None,
            event_type: None,
            add_field: Map::new(),
            tags: Vec::new(),
            codec: DecoderKind::default(),
        }
    }

    /// Sets the host name.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the event type.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Adds a field overlay.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_field.insert(field.into(), value.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: DecoderKind) -> Self {
        self.codec = codec;
        self
    }

    /// Sets an explicit position database location.
    #[must_use]
    pub fn with_sincedb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sincedb_path = Some(path.into());
        self
    }

    /// Sets the start position.
    #[must_use]
    pub const fn with_start_position(mut self, start_position: StartPosition) -> Self {
        self.start_position = start_position;
        self
    }

    /// Checks everything that can be checked without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty path list, a relative path, an interval
    /// that is not a valid duration, or a multiline pattern that does not
    /// compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::EmptyPaths);
        }
        if let Some(relative) = self.path.iter().find(|p| !Path::new(p).is_absolute()) {
            return Err(ConfigError::RelativePath(relative.clone()));
        }
        self.stat_interval()?;
        self.discover_interval()?;
        self.sincedb_write_interval()?;
        self.ignore_older()?;
        self.close_older()?;
        self.codec.build_factory()?;
        Ok(())
    }

    /// Gets the stat interval as Duration.
    pub fn stat_interval(&self) -> Result<Duration, ConfigError> {
        seconds("stat_interval", self.stat_interval)
    }

    /// Gets the discover interval as Duration.
    pub fn discover_interval(&self) -> Result<Duration, ConfigError> {
        seconds("discover_interval", self.discover_interval)
    }

    /// Gets the sincedb write interval as Duration.
    pub fn sincedb_write_interval(&self) -> Result<Duration, ConfigError> {
        seconds("sincedb_write_interval", self.sincedb_write_interval)
    }

    /// Gets the ignore-older threshold as Duration.
    pub fn ignore_older(&self) -> Result<Duration, ConfigError> {
        seconds("ignore_older", self.ignore_older)
    }

    /// Gets the close-older threshold as Duration.
    pub fn close_older(&self) -> Result<Duration, ConfigError> {
        seconds("close_older", self.close_older)
    }

    /// Decides where positions are persisted.
    ///
    /// Without an explicit `sincedb_path` the database lives in
    /// `SINCEDB_DIR` (or `HOME`) under a name derived from the watched
    /// paths, and a legacy `.sincedb` there is moved to that name.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is available, the legacy file
    /// cannot be renamed, or the resolved path is a directory.
    pub fn resolve_sincedb_path(&self, env: &SincedbEnv) -> Result<PathBuf, ConfigError> {
        let path = match &self.sincedb_path {
            Some(path) => path.clone(),
            None => {
                let dir = env.dir().ok_or_else(|| ConfigError::NoSincedbDir {
                    paths: self.path.clone(),
                })?;
                let path = dir.join(sincedb_file_name(&self.path));
                tracing::info!(
                    path = %path.display(),
                    "No sincedb_path set, generating one based on the file path"
                );

                let legacy = dir.join(LEGACY_SINCEDB);
                if legacy.is_file() {
                    tracing::info!(
                        old = %legacy.display(),
                        new = %path.display(),
                        "Renaming old sincedb to new one"
                    );
                    std::fs::rename(&legacy, &path)?;
                }
                path
            }
        };

        if path.is_dir() {
            return Err(ConfigError::SincedbIsDirectory(path));
        }
        Ok(path)
    }

    /// Builds the settings handed to the watcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInterval`] for an interval that is not a
    /// valid duration.
    pub fn watcher_settings(&self, sincedb_path: PathBuf) -> Result<TailSettings, ConfigError> {
        Ok(TailSettings {
            paths: self.path.clone(),
            exclude: self.exclude.clone(),
            stat_interval: self.stat_interval()?,
            discover_interval: self.discover_interval()?,
            sincedb_path,
            sincedb_write_interval: self.sincedb_write_interval()?,
            start_position: self.start_position,
            delimiter: self.delimiter.clone(),
            ignore_older: self.ignore_older()?,
            close_older: self.close_older()?,
        })
    }

    /// The configured host, or the machine name.
    #[must_use]
    pub fn resolved_host(&self) -> String {
        if let Some(host) = &self.host {
            return host.clone();
        }
        let name = gethostname::gethostname().to_string_lossy().into_owned();
        if name.is_empty() {
            "localhost".to_string()
        } else {
            name
        }
    }

    /// Settings for the local enrichment stage.
    #[must_use]
    pub fn local_meta(&self) -> LocalMeta {
        LocalMeta::with_host(self.resolved_host())
    }

    /// Settings for the global enrichment stage.
    #[must_use]
    pub fn global_meta(&self, plugin_name: impl Into<String>) -> GlobalMeta {
        GlobalMeta {
            event_type: self.event_type.clone(),
            add_field: self.add_field.clone(),
            tags: self.tags.clone(),
            plugin_name: plugin_name.into(),
        }
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidInterval { field, value })
}

/// File name of the position database for a set of watched paths.
#[must_use]
pub fn sincedb_file_name(paths: &[String]) -> String {
    let digest = Md5::digest(paths.join(",").as_bytes());
    format!(".sincedb_{}", hex::encode(digest))
}

/// Environment consulted when no explicit sincedb path is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SincedbEnv {
    /// Value of `SINCEDB_DIR`.
    pub sincedb_dir: Option<PathBuf>,
    /// Value of `HOME`.
    pub home: Option<PathBuf>,
}

impl SincedbEnv {
    /// Reads `SINCEDB_DIR` and `HOME` from the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            sincedb_dir: std::env::var_os("SINCEDB_DIR").map(PathBuf::from),
            home: std::env::var_os("HOME").map(PathBuf::from),
        }
    }

    /// Uses `dir` as `SINCEDB_DIR`.
    #[must_use]
    pub fn with_sincedb_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            sincedb_dir: Some(dir.into()),
            home: None,
        }
    }

    /// The directory to keep the database in.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.sincedb_dir.as_deref().or(self.home.as_deref())
    }
}

/// Everything the external watcher needs to tail one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailSettings {
    /// Paths or globs to tail.
    pub paths: Vec<String>,
    /// Filename globs to skip.
    pub exclude: Vec<String>,
    /// Interval between file checks.
    pub stat_interval: Duration,
    /// Interval between glob expansions.
    pub discover_interval: Duration,
    /// Position database location.
    pub sincedb_path: PathBuf,
    /// Interval between database writes.
    pub sincedb_write_interval: Duration,
    /// Where new files are read from.
    pub start_position: StartPosition,
    /// Line separator.
    pub delimiter: String,
    /// Age after which files are skipped.
    pub ignore_older: Duration,
    /// Idle time after which files are closed.
    pub close_older: Duration,
}
