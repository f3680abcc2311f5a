//! Notification actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a notification reports about a watched file.
///
/// The first five variants come from the external watcher. `Event` is
/// produced by the decoding stage once raw lines have become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A new file is being watched.
    Created,
    /// A line of text is available.
    Line,
    /// The reader caught up with the end of the file.
    Eof,
    /// The file has been idle long enough to be closed.
    TimedOut,
    /// The file was removed.
    Deleted,
    /// A decoded record.
    Event,
}

impl Action {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Line => "line",
            Self::Eof => "eof",
            Self::TimedOut => "timed_out",
            Self::Deleted => "deleted",
            Self::Event => "event",
        }
    }

    /// Returns true for actions that carry no data of their own.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Created | Self::Eof | Self::Deleted)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "line" => Ok(Self::Line),
            "eof" => Ok(Self::Eof),
            "timed_out" => Ok(Self::TimedOut),
            "deleted" => Ok(Self::Deleted),
            "event" => Ok(Self::Event),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display() {
        assert_eq!(Action::TimedOut.to_string(), "timed_out");
        assert_eq!(Action::Line.to_string(), "line");
        assert_eq!(Action::Event.to_string(), "event");
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("eof".parse::<Action>(), Ok(Action::Eof));
        assert_eq!("timed_out".parse::<Action>(), Ok(Action::TimedOut));
        assert!("rotated".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_structural() {
        assert!(Action::Created.is_structural());
        assert!(Action::Deleted.is_structural());
        assert!(!Action::Line.is_structural());
        assert!(!Action::TimedOut.is_structural());
    }

    #[test]
    fn test_action_serialize() {
        let json = serde_json::to_string(&Action::TimedOut).unwrap();
        assert_eq!(json, r#""timed_out""#);

        let action: Action = serde_json::from_str(r#""deleted""#).unwrap();
        assert_eq!(action, Action::Deleted);
    }
}
