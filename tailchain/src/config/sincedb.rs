//! Position records shared with watchers.
//!
//! The chain never reads or writes the position database itself; watchers
//! use these helpers so that the identity they persist is the same
//! [`FileIdentity`] the decoding stage keys on.

use crate::core::FileIdentity;
use crate::errors::SinceDbError;
use std::fmt;
use std::str::FromStr;

/// One line of the position database: `<inode> <major> <minor> <offset>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinceDbEntry {
    /// The file identity.
    pub identity: FileIdentity,
    /// Bytes already read.
    pub offset: u64,
}

impl SinceDbEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(identity: FileIdentity, offset: u64) -> Self {
        Self { identity, offset }
    }

    /// Parses one record.
    ///
    /// # Errors
    ///
    /// Returns an error unless the line holds exactly four unsigned integers.
    pub fn parse(line: &str) -> Result<Self, SinceDbError> {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [inode, major, minor, offset] = columns.as_slice() else {
            return Err(SinceDbError::new(
                line,
                format!("expected 4 columns, found {}", columns.len()),
            ));
        };

        let number = |column: &str, name: &str| {
            column
                .parse::<u64>()
                .map_err(|e| SinceDbError::new(line, format!("invalid {name}: {e}")))
        };

        Ok(Self {
            identity: FileIdentity::new(
                number(*inode, "inode")?,
                number(*major, "major device")?,
                number(*minor, "minor device")?,
            ),
            offset: number(*offset, "offset")?,
        })
    }

    /// Parses a whole database, skipping blank lines.
    ///
    /// # Errors
    ///
    /// Returns the first malformed record.
    pub fn parse_all(text: &str) -> Result<Vec<Self>, SinceDbError> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Formats entries as a database, one per line.
    #[must_use]
    pub fn format_all(entries: &[Self]) -> String {
        entries.iter().map(|entry| format!("{entry}\n")).collect()
    }
}

impl FromStr for SinceDbEntry {
    type Err = SinceDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SinceDbEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.identity, self.offset)
    }
}
