//! Append-only query log.
//!
//! The log is the only durable state: one `[<timestamp>] <query>` line per
//! captured query, never rewritten. It is read once at startup to seed the
//! seen set and appended to after every tick that found something new.

use crate::models::{CanonicalQuery, ENTRY_DELIMITER, LogEntry, format_timestamp};
use crate::services::SeenSet;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Plain-text, line-oriented query log.
///
/// Only one process may append to a given log at a time. This is not
/// enforced; two writers can interleave lines.
#[derive(Debug, Clone)]
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    /// Creates a handle for the log at `path`. Nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the log and returns every query it records.
    ///
    /// A missing file yields an empty set. Blank lines are skipped and the
    /// timestamp prefix is stripped from the rest (see
    /// [`LogEntry::query_portion`]). Reading the same file twice yields the
    /// same set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not
    /// valid UTF-8.
    #[instrument(skip(self), fields(operation = "load_seen", path = %self.path.display()))]
    pub fn load_seen(&self) -> Result<SeenSet> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Query log does not exist yet");
                return Ok(SeenSet::new());
            },
            Err(e) => return Err(io_error("open_query_log", &self.path, &e)),
        };

        let mut seen = SeenSet::new();
        let mut lines = 0_usize;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_error("read_query_log", &self.path, &e))?;
            lines += 1;
            if let Some(query) = LogEntry::query_portion(&line) {
                seen.insert(query);
            }
        }

        tracing::debug!(lines, distinct = seen.len(), "Loaded query log");
        Ok(seen)
    }

    /// Appends a batch of queries sharing one timestamp.
    ///
    /// An empty batch is a no-op and does not touch the file. Otherwise the
    /// file (and any missing parent directories) is created if needed and
    /// all lines are written with a single append, then flushed. Returns the
    /// number of lines written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, written or flushed.
    #[instrument(
        skip(self, batch),
        fields(operation = "append", path = %self.path.display(), batch_size = batch.len())
    )]
    pub fn append(&self, batch: &[CanonicalQuery], timestamp: DateTime<Utc>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let stamp = format_timestamp(&timestamp);
        let mut buf = String::with_capacity(batch.iter().map(|q| q.as_str().len() + 40).sum());
        for query in batch {
            // Writing into a String cannot fail.
            let _ = writeln!(buf, "[{stamp}{ENTRY_DELIMITER}{query}");
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error("create_query_log_dir", parent, &e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error("open_query_log", &self.path, &e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| io_error("append_query_log", &self.path, &e))?;
        file.flush()
            .map_err(|e| io_error("flush_query_log", &self.path, &e))?;

        Ok(batch.len())
    }
}

fn io_error(operation: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("{}: {}", path.display(), e),
    }
}
