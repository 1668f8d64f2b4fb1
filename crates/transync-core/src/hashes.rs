//! Content-hash store
//!
//! Remembers, per task and reference kind, which URL was last resolved and
//! the hash of the text it produced. Change detection compares against
//! these entries; a merge that adopts a fresh record drops them.

use crate::types::{RefKind, TaskId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use transync_content::{Clock, ContentHash, SystemClock};

/// Last resolution of one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContent {
    /// URL that was resolved
    pub url: String,
    /// Hash of the resolved text
    pub hash: ContentHash,
    /// When it was resolved
    pub resolved_at: DateTime<Utc>,
}

/// Concurrent `(task, kind) → ResolvedContent` map
#[derive(Debug, Clone)]
pub struct ContentHashStore {
    entries: Arc<DashMap<(TaskId, RefKind), ResolvedContent>>,
    clock: Arc<dyn Clock>,
}

impl Default for ContentHashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHashStore {
    /// Create empty store on the wall clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create empty store on an injected clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Record the text resolved from `url`
    pub fn record(&self, id: TaskId, kind: RefKind, url: &str, text: &str) -> ContentHash {
        let hash = ContentHash::of_text(text);
        self.entries.insert(
            (id, kind),
            ResolvedContent {
                url: url.trim().to_string(),
                hash,
                resolved_at: self.clock.now(),
            },
        );
        hash
    }

    /// Last resolution for `(id, kind)`
    #[must_use]
    pub fn get(&self, id: TaskId, kind: RefKind) -> Option<ResolvedContent> {
        self.entries.get(&(id, kind)).map(|e| e.value().clone())
    }

    /// Drop every entry of a task
    pub fn invalidate_task(&self, id: TaskId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(task, _), _| *task != id);
        before.saturating_sub(self.entries.len())
    }

    /// True if the stored entry matches both `url` and `hash`
    #[must_use]
    pub fn is_authoritative(&self, id: TaskId, kind: RefKind, url: &str, hash: &ContentHash) -> bool {
        self.entries
            .get(&(id, kind))
            .is_some_and(|e| e.url == url.trim() && e.hash == *hash)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_authority() {
        let store = ContentHashStore::new();
        let hash = store.record(TaskId(1), RefKind::Source, " https://a ", "text");
        assert!(store.is_authoritative(TaskId(1), RefKind::Source, "https://a", &hash));
        assert!(!store.is_authoritative(TaskId(1), RefKind::Source, "https://b", &hash));
        assert!(!store.is_authoritative(
            TaskId(1),
            RefKind::Source,
            "https://a",
            &ContentHash::of_text("other")
        ));
    }

    #[test]
    fn invalidate_task_only_drops_that_task() {
        let store = ContentHashStore::new();
        store.record(TaskId(1), RefKind::Source, "u", "a");
        store.record(TaskId(1), RefKind::Context, "u", "b");
        store.record(TaskId(2), RefKind::Source, "u", "c");

        assert_eq!(store.invalidate_task(TaskId(1)), 2);
        assert!(store.get(TaskId(1), RefKind::Source).is_none());
        assert!(store.get(TaskId(2), RefKind::Source).is_some());
    }
}
