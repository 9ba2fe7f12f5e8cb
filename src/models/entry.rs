//! Query log entries.
//!
//! Entries are rendered as `[<timestamp>] <query>`, one per line. The
//! timestamp is UTC in ISO-8601 with microsecond precision and a trailing `Z`.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use super::CanonicalQuery;

/// Separator between the timestamp prefix and the query text.
pub const ENTRY_DELIMITER: &str = "] ";

/// A single line of the query log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the batch containing this query was captured.
    pub timestamp: DateTime<Utc>,
    /// The captured query.
    pub query: CanonicalQuery,
}

impl LogEntry {
    /// Creates a new entry.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, query: CanonicalQuery) -> Self {
        Self { timestamp, query }
    }

    /// Extracts the query portion of a log line.
    ///
    /// The line is trimmed first. Blank lines yield `None`. If the line
    /// contains the `"] "` delimiter, everything up to and including its
    /// first occurrence is dropped; otherwise the whole line is the query.
    /// The timestamp itself is never validated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use querytrail::LogEntry;
    ///
    /// let query = LogEntry::query_portion("[2024-01-01T00:00:00Z] SELECT 1").unwrap();
    /// assert_eq!(query.as_str(), "SELECT 1");
    /// assert!(LogEntry::query_portion("   ").is_none());
    /// ```
    #[must_use]
    pub fn query_portion(line: &str) -> Option<CanonicalQuery> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let text = line
            .split_once(ENTRY_DELIMITER)
            .map_or(line, |(_, query)| query);
        Some(CanonicalQuery::from_log(text))
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}{ENTRY_DELIMITER}{}",
            format_timestamp(&self.timestamp),
            self.query
        )
    }
}

/// Formats a capture timestamp the way it appears in the log.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
