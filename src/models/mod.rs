//! Data models for querytrail.
//!
//! This module contains the query and log entry types shared by the poller,
//! the deduplication set and the query log.

mod entry;
mod query;

pub use entry::{ENTRY_DELIMITER, LogEntry, format_timestamp};
pub use query::CanonicalQuery;
