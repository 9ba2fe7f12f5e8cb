//! Activity source trait.

use crate::Result;
use std::future::Future;

/// One polled row: the (possibly truncated) query text, or `None` for NULL.
pub type ActivityRow = Option<String>;

/// Trait for sources of currently running queries.
///
/// An activity source answers one read-only question: which distinct,
/// non-idle queries is the target identity running right now. Filtering by
/// owner, idle state, NULL content, self-exclusion and truncation all happen
/// inside the source. Row order is unspecified and may change between calls.
pub trait ActivitySource: Send {
    /// Fetches the active queries owned by `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Query`] if the source cannot be queried.
    fn fetch_active(&mut self, target: &str)
    -> impl Future<Output = Result<Vec<ActivityRow>>> + Send;
}
