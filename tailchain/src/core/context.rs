//! Per-notification context and file identity.

use super::Action;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable identity for a watched file.
///
/// Matches the first three columns of a sincedb record: the inode plus the
/// major and minor numbers of the device holding it. Unlike the path, it
/// survives renames, so rotated files keep their decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Inode number (or platform equivalent).
    pub inode: u64,
    /// Major device number.
    pub dev_major: u64,
    /// Minor device number.
    pub dev_minor: u64,
}

impl FileIdentity {
    /// Creates a file identity.
    #[must_use]
    pub const fn new(inode: u64, dev_major: u64, dev_minor: u64) -> Self {
        Self {
            inode,
            dev_major,
            dev_minor,
        }
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.inode, self.dev_major, self.dev_minor)
    }
}

/// Key under which per-file decoder state is stored.
///
/// Watchers that know the file identity supply it; otherwise the path is
/// the best identity available.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Keyed by inode and device.
    File(FileIdentity),
    /// Keyed by path.
    Path(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(identity) => write!(f, "{identity}"),
            Self::Path(path) => f.write_str(path),
        }
    }
}

/// The metadata accompanying a payload through the chain.
///
/// Contexts are values: a stage that needs a different context for what it
/// forwards builds a new one (see [`Context::with_action`]) instead of
/// changing one another holder may still reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    path: String,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<FileIdentity>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Context {
    /// Creates a context for a notification about `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, action: Action) -> Self {
        Self {
            path: path.into(),
            action,
            identity: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Sets the stable file identity.
    #[must_use]
    pub fn with_identity(mut self, identity: FileIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Adds a field for stages further down the chain.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns a copy of this context carrying a different action.
    #[must_use]
    pub fn with_action(&self, action: Action) -> Self {
        Self {
            action,
            ..self.clone()
        }
    }

    /// The path being reported on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The notification action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// The stable file identity, when the watcher supplied one.
    #[must_use]
    pub const fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    /// The key used for per-file decoder state.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        self.identity
            .map_or_else(|| IdentityKey::Path(self.path.clone()), IdentityKey::File)
    }

    /// Returns an extra field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Returns true if the action is [`Action::Line`].
    #[must_use]
    pub fn is_line(&self) -> bool {
        self.action == Action::Line
    }
}
