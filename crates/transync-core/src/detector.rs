//! Change detection
//!
//! Two granularities:
//! - **directory**: re-fetch bypassing the cache and compare row by row
//! - **task**: scalars, then core references, then content hashes
//!
//! A task whose references have no recorded hash counts as unchanged.
//! Field comparison always runs first, so a new or edited reference is
//! still caught before hashes are consulted.

use crate::directory::{directory_differs, DirectoryFetcher};
use crate::error::SyncResult;
use crate::hashes::ContentHashStore;
use crate::types::{RefKind, TaskRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use transync_content::{ContentHash, ContentResolver};

/// Compares known task data against fresh data
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    directory: DirectoryFetcher,
    resolver: ContentResolver,
    hashes: ContentHashStore,
}

impl ChangeDetector {
    /// Create detector
    #[must_use]
    pub fn new(directory: DirectoryFetcher, resolver: ContentResolver, hashes: ContentHashStore) -> Self {
        Self {
            directory,
            resolver,
            hashes,
        }
    }

    /// Hash store consulted for content comparison
    #[inline]
    #[must_use]
    pub fn hashes(&self) -> &ContentHashStore {
        &self.hashes
    }

    /// True if the directory now differs from `last_known`
    ///
    /// # Errors
    /// Propagates the directory fetch failure.
    pub async fn has_directory_changed(&self, last_known: &[TaskRecord]) -> SyncResult<bool> {
        Ok(self.compare_directory(last_known).await?.0)
    }

    /// Re-fetch the directory and compare it with `last_known`
    ///
    /// Returns the verdict along with the fresh records. Cache freshness is
    /// bypassed; origin pacing is not.
    ///
    /// # Errors
    /// Propagates the directory fetch failure.
    pub async fn compare_directory(&self, last_known: &[TaskRecord]) -> SyncResult<(bool, Vec<TaskRecord>)> {
        let fresh = self.directory.fetch_uncached().await?;
        let changed = directory_differs(last_known, &fresh);
        tracing::debug!(known = last_known.len(), fresh = fresh.len(), changed, "directory compared");
        Ok((changed, fresh))
    }

    /// True if `fresh` differs from `existing`
    ///
    /// Resolution failures while hashing count as "no determinable change".
    pub async fn has_task_changed(&self, existing: &TaskRecord, fresh: &TaskRecord) -> bool {
        if let Some(field) = existing.first_scalar_difference(fresh) {
            tracing::debug!(task = %existing.id, field, "scalar field changed");
            return true;
        }
        if let Some(kind) = existing.refs.first_core_difference(&fresh.refs) {
            tracing::debug!(task = %existing.id, %kind, "content reference changed");
            return true;
        }

        let mut checks: FuturesUnordered<_> = RefKind::CORE
            .into_iter()
            .map(|kind| self.content_changed(existing, kind))
            .collect();
        while let Some(changed) = checks.next().await {
            if changed {
                return true;
            }
        }
        false
    }

    async fn content_changed(&self, task: &TaskRecord, kind: RefKind) -> bool {
        let url = task.refs.get(kind).trim();
        if url.is_empty() {
            return false;
        }
        let Some(stored) = self.hashes.get(task.id, kind).filter(|s| s.url == url) else {
            return false;
        };

        match self.resolver.resolve_cached(url, true).await {
            Ok(text) => {
                let changed = ContentHash::of_text(&text) != stored.hash;
                if changed {
                    tracing::debug!(task = %task.id, %kind, was = %stored.hash.short(), "content hash changed");
                }
                changed
            }
            Err(err) => {
                tracing::debug!(task = %task.id, %kind, error = %err, "content unavailable for hashing");
                false
            }
        }
    }
}
