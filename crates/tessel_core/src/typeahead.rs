//! Typeahead search over a registry snapshot
//!
//! Keystrokes accumulate in a [`TypeaheadBuffer`]. Every keystroke pushes the
//! expiry out again; once a full timeout passes with no key the next
//! keystroke starts a fresh query. Repeating one character does not cycle
//! through matches, the query simply grows ("j", "jj", ...).

use std::time::{Duration, Instant};

use crate::registry::{Descendant, DescendantId, Labeled};

/// Idle time after which the query resets
pub const DEFAULT_TYPEAHEAD_TIMEOUT: Duration = Duration::from_millis(1000);

/// Buffered, case-folded typeahead query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeaheadBuffer {
    query: String,
    last_key_at: Option<Instant>,
    timeout: Duration,
}

impl Default for TypeaheadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TYPEAHEAD_TIMEOUT)
    }
}

impl TypeaheadBuffer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            query: String::new(),
            last_key_at: None,
            timeout,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// When the current query expires, if there is one
    pub fn expires_at(&self) -> Option<Instant> {
        if self.query.is_empty() {
            return None;
        }
        self.last_key_at.map(|at| at + self.timeout)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|deadline| now >= deadline)
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.last_key_at = None;
    }

    /// Drop the query if it has expired, returns whether it was cleared
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_expired(now) {
            self.clear();
            true
        } else {
            false
        }
    }

    /// Append a keystroke, starting over if the previous query expired
    pub fn push(&mut self, key: char, now: Instant) -> &str {
        self.poll(now);
        self.query.extend(key.to_lowercase());
        self.last_key_at = Some(now);
        &self.query
    }

    /// Push a keystroke and search `records` with the updated query
    pub fn feed<H, M: Labeled>(
        &mut self,
        key: char,
        now: Instant,
        records: &[Descendant<H, M>],
    ) -> Option<DescendantId> {
        self.push(key, now);
        let found = find_match(&self.query, records);
        tracing::trace!(query = %self.query, matched = found.is_some(), "typeahead");
        found
    }
}

/// First enabled record whose label starts with `query`, ignoring case
pub fn find_match<H, M: Labeled>(query: &str, records: &[Descendant<H, M>]) -> Option<DescendantId> {
    if query.is_empty() {
        return None;
    }
    let query = query.to_lowercase();
    records
        .iter()
        .filter(|record| !record.disabled)
        .find(|record| record.meta.label().to_lowercase().starts_with(&query))
        .map(|record| record.id)
}
