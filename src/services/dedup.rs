//! Seen-set deduplication.
//!
//! Tracks every canonical query already present in the query log and filters
//! freshly polled rows down to the ones never recorded before.

use crate::models::CanonicalQuery;
use std::collections::HashSet;
use std::collections::hash_set;
use tracing::instrument;

/// The set of canonical queries already recorded.
///
/// The set only ever grows. It is seeded from the query log at startup and
/// every novel query is inserted before it is written, so the set is always
/// a superset of the distinct queries in the log.
///
/// # Example
///
/// ```rust
/// use querytrail::SeenSet;
///
/// let mut seen = SeenSet::new();
/// let novel = seen.reconcile([Some("SELECT  1"), None, Some("SELECT 1"), Some("")]);
/// assert_eq!(novel.len(), 1);
/// assert_eq!(novel[0].as_str(), "SELECT 1");
/// assert!(seen.reconcile([Some("SELECT\n1")]).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    queries: HashSet<CanonicalQuery>,
}

impl SeenSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct queries seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` if nothing has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Returns `true` if the canonical query has been seen.
    #[must_use]
    pub fn contains(&self, query: &CanonicalQuery) -> bool {
        self.queries.contains(query)
    }

    /// Records a query, returning `true` if it was not seen before.
    pub fn insert(&mut self, query: CanonicalQuery) -> bool {
        self.queries.insert(query)
    }

    /// Iterates over the seen queries in no particular order.
    pub fn iter(&self) -> hash_set::Iter<'_, CanonicalQuery> {
        self.queries.iter()
    }

    /// Filters a polled batch down to its novel canonical queries.
    ///
    /// Rows that are `None`, empty, or whitespace-only are skipped. Each
    /// remaining row is canonicalized; if the result is unseen it is recorded
    /// immediately and returned, so a query repeated within one batch is
    /// returned at most once. Novel queries keep their encounter order.
    #[instrument(skip_all, fields(operation = "reconcile"))]
    pub fn reconcile<I, S>(&mut self, batch: I) -> Vec<CanonicalQuery>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut novel = Vec::new();
        let mut polled = 0_usize;

        for raw in batch.into_iter().flatten() {
            polled += 1;
            let raw = raw.as_ref();
            if raw.is_empty() {
                continue;
            }

            let query = CanonicalQuery::canonicalize(raw);
            if query.is_empty() || self.queries.contains(&query) {
                continue;
            }

            self.queries.insert(query.clone());
            novel.push(query);
        }

        tracing::debug!(
            polled,
            novel = novel.len(),
            total_seen = self.queries.len(),
            "Reconciled batch"
        );
        novel
    }
}

impl FromIterator<CanonicalQuery> for SeenSet {
    fn from_iter<T: IntoIterator<Item = CanonicalQuery>>(iter: T) -> Self {
        Self {
            queries: iter.into_iter().collect(),
        }
    }
}

impl Extend<CanonicalQuery> for SeenSet {
    fn extend<T: IntoIterator<Item = CanonicalQuery>>(&mut self, iter: T) {
        self.queries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a SeenSet {
    type Item = &'a CanonicalQuery;
    type IntoIter = hash_set::Iter<'a, CanonicalQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(queries: &[CanonicalQuery]) -> Vec<&str> {
        queries.iter().map(CanonicalQuery::as_str).collect()
    }

    #[test]
    fn test_reconcile_skips_null_and_empty() {
        let mut seen = SeenSet::new();
        let novel = seen.reconcile(vec![None, Some(String::new()), Some("SELECT 1".to_string())]);

        assert_eq!(texts(&novel), vec!["SELECT 1"]);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_reconcile_skips_whitespace_only() {
        let mut seen = SeenSet::new();
        let novel = seen.reconcile([Some(" \n\t ")]);

        assert!(novel.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn test_reconcile_dedups_within_batch() {
        let mut seen = SeenSet::new();
        let novel = seen.reconcile([
            Some("SELECT 1"),
            Some("SELECT\n  1"),
            Some("SELECT 2"),
            Some("  SELECT 1  "),
        ]);

        assert_eq!(texts(&novel), vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_reconcile_keeps_encounter_order() {
        let mut seen = SeenSet::new();
        let novel = seen.reconcile([Some("c"), Some("a"), Some("b")]);

        assert_eq!(texts(&novel), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reconcile_filters_previously_seen() {
        let mut seen: SeenSet = [CanonicalQuery::from_log("SELECT 1")].into_iter().collect();
        let novel = seen.reconcile([Some("SELECT 1"), Some("SELECT 2")]);

        assert_eq!(texts(&novel), vec!["SELECT 2"]);
        assert!(seen.contains(&CanonicalQuery::canonicalize("SELECT 2")));
    }

    #[test]
    fn test_reconcile_is_case_sensitive() {
        let mut seen = SeenSet::new();
        let novel = seen.reconcile([Some("select 1"), Some("SELECT 1")]);

        assert_eq!(novel.len(), 2);
    }

    #[test]
    fn test_set_never_shrinks() {
        let mut seen = SeenSet::new();
        seen.reconcile([Some("a"), Some("b")]);
        let before = seen.len();
        seen.reconcile(Vec::<Option<&str>>::new());
        seen.reconcile([Some("a")]);

        assert_eq!(seen.len(), before);
    }

    #[test]
    fn test_insert_and_extend() {
        let mut seen = SeenSet::new();
        assert!(seen.insert(CanonicalQuery::from_log("a")));
        assert!(!seen.insert(CanonicalQuery::from_log("a")));
        seen.extend([CanonicalQuery::from_log("b"), CanonicalQuery::from_log("a")]);

        assert_eq!(seen.len(), 2);
        assert_eq!((&seen).into_iter().count(), 2);
    }
}
