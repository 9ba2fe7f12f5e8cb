//! # Querytrail
//!
//! Captures the distinct queries a PostgreSQL user runs into an append-only log.
//!
//! Querytrail polls `pg_stat_activity` on a fixed interval, canonicalizes the
//! query text of every non-idle backend owned by the target user, and appends
//! each query it has never seen before to a plain-text log exactly once.
//!
//! ## Features
//!
//! - Whitespace-insensitive deduplication against the whole log history
//! - Restart-safe: the log is re-read at startup and is the only state
//! - Layered configuration (defaults, TOML file, `.env`, environment, CLI)
//! - Cooperative shutdown on Ctrl-C with guaranteed connection release
//!
//! ## Example
//!
//! ```rust,ignore
//! use querytrail::services::{Collector, Poller};
//! use querytrail::storage::{PgActivitySource, QueryLog};
//!
//! let source = PgActivitySource::connect(&config.database, config.max_query_len).await?;
//! let log = QueryLog::new(&config.log_file);
//! let seen = log.load_seen()?;
//! let mut collector = Collector::new(Poller::new(source, &config.target_user), log, seen);
//! collector.run(config.poll_interval, &cancel).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CollectorConfig, ConnectionConfig};
pub use models::{CanonicalQuery, LogEntry};
pub use services::{Collector, Poller, RunSummary, SeenSet, TickReport};
pub use storage::{ActivitySource, PgActivitySource, QueryLog};

/// Error type for querytrail operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `MissingConfiguration` | Host, database, user or password empty, or port zero |
/// | `InvalidConfiguration` | Unparseable numbers, non-positive interval, bad config file |
/// | `Connection` | The PostgreSQL connection cannot be established |
/// | `Query` | The activity query fails or the connection drops mid-poll |
/// | `OperationFailed` | Log file I/O fails, logging cannot be initialized |
///
/// Only the interrupt signal is handled gracefully; every variant here ends
/// the process.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Required connection parameters are missing.
    ///
    /// Carries the environment variable names of every missing value so the
    /// operator can fix them all at once.
    #[error("missing configuration values: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connecting to the database failed.
    #[error("connection failed: {cause}")]
    Connection {
        /// The underlying cause.
        cause: String,
    },

    /// Querying the activity view failed.
    #[error("activity query failed: {cause}")]
    Query {
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - The query log cannot be read, created or appended to
    /// - The query log contains invalid UTF-8
    /// - The tracing subscriber cannot be installed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for querytrail operations.
pub type Result<T> = std::result::Result<T, Error>;
