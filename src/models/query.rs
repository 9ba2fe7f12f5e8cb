//! Canonical query text.

use std::fmt;

/// Query text in canonical form.
///
/// Canonical form collapses every run of whitespace (spaces, tabs, newlines
/// and other Unicode whitespace) into a single space and trims both ends.
/// Two queries are the same query iff their canonical forms are byte-equal,
/// so comparison stays case-sensitive.
///
/// # Example
///
/// ```rust
/// use querytrail::CanonicalQuery;
///
/// let query = CanonicalQuery::canonicalize("SELECT   1\n  FROM\tfoo");
/// assert_eq!(query.as_str(), "SELECT 1 FROM foo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalQuery(String);

impl CanonicalQuery {
    /// Canonicalizes raw query text.
    #[must_use]
    pub fn canonicalize(raw: &str) -> Self {
        let mut out = String::with_capacity(raw.len());
        for word in raw.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        Self(out)
    }

    /// Wraps text read back from the query log.
    ///
    /// Log lines are written canonical, so the text is kept verbatim. Lines
    /// edited by hand are not re-canonicalized either; they only ever match a
    /// polled query if they happen to be canonical already.
    #[must_use]
    pub fn from_log(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if nothing but whitespace was canonicalized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the query and returns the canonical text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
