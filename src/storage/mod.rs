//! Storage layer.
//!
//! Two very different stores live here:
//! - **Activity source**: the read-only view of what the target user is
//!   running right now (`pg_stat_activity`)
//! - **Query log**: the append-only file recording every query ever captured

pub mod postgresql;
pub mod query_log;
pub mod traits;

pub use postgresql::PgActivitySource;
pub use query_log::QueryLog;
pub use traits::{ActivityRow, ActivitySource};
