//! Activity poller.

use crate::Result;
use crate::storage::{ActivityRow, ActivitySource};
use tracing::instrument;

/// Polls an activity source for the target user's running queries.
///
/// The poller holds no state beyond its source and target; every call is an
/// independent read.
pub struct Poller<S> {
    source: S,
    target: String,
}

impl<S: ActivitySource> Poller<S> {
    /// Creates a poller for `target` over `source`.
    #[must_use]
    pub fn new(source: S, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
        }
    }

    /// Returns the target identity.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Fetches the raw rows for one tick.
    ///
    /// # Errors
    ///
    /// Propagates any error from the source unchanged.
    #[instrument(skip(self), fields(operation = "poll", user = %self.target))]
    pub async fn poll(&mut self) -> Result<Vec<ActivityRow>> {
        let rows = self.source.fetch_active(&self.target).await?;
        tracing::trace!(rows = rows.len(), "Polled activity");
        Ok(rows)
    }

    /// Returns the underlying source, e.g. to close its connection.
    pub fn into_source(self) -> S {
        self.source
    }
}
