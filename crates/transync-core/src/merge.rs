//! Merge/protection engine
//!
//! Combines the known task list with a fresh directory fetch, one task at
//! a time:
//!
//! ```text
//! protection(local signals)
//!   ├─ submitted            → keep existing (force ignored)
//!   ├─ in-progress, !force  → keep existing
//!   └─ otherwise            → has_task_changed ? adopt fresh : keep existing
//! ```
//!
//! Each task's decision is computed by a single future, so no two merges
//! of the same task interleave. Tasks only present locally survive when
//! protected. Local signals are read once per merge; decisions and the
//! final protection check use that snapshot.

use crate::detector::ChangeDetector;
use crate::error::{SyncError, SyncResult};
use crate::hashes::ContentHashStore;
use crate::state::{LocalSignals, StateStore};
use crate::status::protection_state;
use crate::types::{ProtectionState, TaskId, TaskRecord};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Per-task outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    /// Kept because of local work
    Protected(ProtectionState),
    /// Replaced by the fresh record
    Updated,
    /// Kept; nothing changed
    Unchanged,
    /// New in the directory
    Added,
    /// Gone from the directory and unprotected
    Removed,
}

/// Counts of merge decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Tasks kept because of local work
    pub protected: usize,
    /// Tasks replaced by fresh data
    pub updated: usize,
    /// Tasks kept unchanged
    pub unchanged: usize,
    /// Tasks new in the directory
    pub added: usize,
    /// Tasks dropped from the directory
    pub removed: usize,
}

impl MergeSummary {
    fn count(&mut self, decision: MergeDecision) {
        match decision {
            MergeDecision::Protected(_) => self.protected += 1,
            MergeDecision::Updated => self.updated += 1,
            MergeDecision::Unchanged => self.unchanged += 1,
            MergeDecision::Added => self.added += 1,
            MergeDecision::Removed => self.removed += 1,
        }
    }

    /// True if the merged list differs from the existing one
    #[inline]
    #[must_use]
    pub fn changed_anything(&self) -> bool {
        self.updated + self.added + self.removed > 0
    }
}

/// Result of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged tasks, in fresh order, then retained local-only tasks
    pub tasks: Vec<TaskRecord>,
    /// Decision per task id
    pub decisions: Vec<(TaskId, MergeDecision)>,
    /// Decision counts
    pub summary: MergeSummary,
}

/// Merges existing and fresh task lists
#[derive(Debug, Clone)]
pub struct MergeEngine {
    detector: ChangeDetector,
    state: Arc<dyn StateStore>,
    hashes: ContentHashStore,
    max_concurrent: usize,
}

impl MergeEngine {
    /// Create engine
    #[must_use]
    pub fn new(detector: ChangeDetector, state: Arc<dyn StateStore>, max_concurrent: usize) -> Self {
        let hashes = detector.hashes().clone();
        Self {
            detector,
            state,
            hashes,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Change detector driving the decisions
    #[inline]
    #[must_use]
    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Protection state of a task from local signals
    #[must_use]
    pub fn protection_of(&self, id: TaskId) -> ProtectionState {
        protection_state(&LocalSignals::load(self.state.as_ref(), id))
    }

    /// Merge `fresh` into `existing`
    ///
    /// # Errors
    /// Returns [`SyncError::ProtectionViolation`] if a submitted task came
    /// out altered, which indicates a bug in the engine.
    pub async fn merge(
        &self,
        existing: &[TaskRecord],
        fresh: Vec<TaskRecord>,
        force: bool,
    ) -> SyncResult<MergeOutcome> {
        let known: HashMap<TaskId, &TaskRecord> = existing.iter().map(|t| (t.id, t)).collect();
        let fresh_ids: HashSet<TaskId> = fresh.iter().map(|t| t.id).collect();
        let protections = self.snapshot_protection(existing);

        let decided: Vec<(TaskRecord, MergeDecision)> = stream::iter(fresh)
            .map(|task| {
                let prior = known.get(&task.id).map(|t| (*t, protection_in(&protections, t.id)));
                self.decide(prior, task, force)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut outcome = MergeOutcome {
            tasks: Vec::with_capacity(decided.len()),
            decisions: Vec::with_capacity(decided.len()),
            summary: MergeSummary::default(),
        };
        for (task, decision) in decided {
            outcome.summary.count(decision);
            outcome.decisions.push((task.id, decision));
            outcome.tasks.push(task);
        }

        for task in existing.iter().filter(|t| !fresh_ids.contains(&t.id)) {
            let decision = match protection_in(&protections, task.id) {
                ProtectionState::Unprotected => {
                    self.hashes.invalidate_task(task.id);
                    MergeDecision::Removed
                }
                state => {
                    outcome.tasks.push(task.clone());
                    MergeDecision::Protected(state)
                }
            };
            outcome.summary.count(decision);
            outcome.decisions.push((task.id, decision));
        }

        check_protection(existing, &outcome.tasks, &protections)?;

        let s = outcome.summary;
        tracing::info!(
            force,
            protected = s.protected,
            updated = s.updated,
            unchanged = s.unchanged,
            added = s.added,
            removed = s.removed,
            "merge complete"
        );
        Ok(outcome)
    }

    fn snapshot_protection(&self, tasks: &[TaskRecord]) -> HashMap<TaskId, ProtectionState> {
        tasks.iter().map(|t| (t.id, self.protection_of(t.id))).collect()
    }

    async fn decide(
        &self,
        prior: Option<(&TaskRecord, ProtectionState)>,
        fresh: TaskRecord,
        force: bool,
    ) -> (TaskRecord, MergeDecision) {
        let Some((existing, protection)) = prior else {
            return (fresh, MergeDecision::Added);
        };

        if !protection.allows_overwrite(force) {
            tracing::debug!(task = %existing.id, ?protection, "task protected, keeping local copy");
            return (existing.clone(), MergeDecision::Protected(protection));
        }

        if self.detector.has_task_changed(existing, &fresh).await {
            let dropped = self.hashes.invalidate_task(existing.id);
            tracing::debug!(task = %existing.id, dropped, "task updated");
            (fresh, MergeDecision::Updated)
        } else {
            let mut kept = existing.clone();
            if let Some(field) = kept.first_advisory_difference(&fresh) {
                tracing::debug!(task = %existing.id, field, "advisory fields refreshed");
                kept.adopt_advisory(&fresh);
            }
            (kept, MergeDecision::Unchanged)
        }
    }

    /// Check that every submitted task in `existing` is present and
    /// identical in `merged`
    ///
    /// # Errors
    /// Returns [`SyncError::ProtectionViolation`] for the first offender.
    pub fn verify_protection(&self, existing: &[TaskRecord], merged: &[TaskRecord]) -> SyncResult<()> {
        check_protection(existing, merged, &self.snapshot_protection(existing))
    }
}

fn protection_in(snapshot: &HashMap<TaskId, ProtectionState>, id: TaskId) -> ProtectionState {
    snapshot.get(&id).copied().unwrap_or(ProtectionState::Unprotected)
}

fn check_protection(
    existing: &[TaskRecord],
    merged: &[TaskRecord],
    protections: &HashMap<TaskId, ProtectionState>,
) -> SyncResult<()> {
    let merged: HashMap<TaskId, &TaskRecord> = merged.iter().map(|t| (t.id, t)).collect();
    for task in existing {
        if protections.get(&task.id) != Some(&ProtectionState::Submitted) {
            continue;
        }
        if merged.get(&task.id).copied() != Some(task) {
            tracing::error!(task = %task.id, "submitted task altered by merge");
            return Err(SyncError::ProtectionViolation { task_id: task.id });
        }
    }
    Ok(())
}
