//! Sync service
//!
//! `refresh(force)` runs one cycle:
//!
//! ```text
//! ChangeDetector::compare_directory ─► [changed | forced] MergeEngine
//!                                                  │
//!                              derive_status ◄─────┘  (every cycle)
//! ```
//!
//! The last merged list lives in memory and in the state store, so a new
//! process merges against it rather than treating every row as new. A
//! failed directory fetch leaves the previous list in place. Manual and
//! scheduled refreshes share one gate: a scheduled tick that finds it held
//! is skipped, not queued.

use crate::config::SyncConfig;
use crate::detector::ChangeDetector;
use crate::directory::DirectoryFetcher;
use crate::error::SyncResult;
use crate::hashes::ContentHashStore;
use crate::loader::TaskContentLoader;
use crate::merge::{MergeEngine, MergeSummary};
use crate::state::{load_task_list, save_task_list, LocalSignals, StateStore};
use crate::status::{derive_status, protection_state};
use crate::types::{EffectiveStatus, ProtectionState, TaskId, TaskRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use transync_content::{Clock, ContentResolver, HttpClient, ResponseCache, SheetsBackend, SystemClock};

/// A task with its derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedTask {
    /// Task record
    pub record: TaskRecord,
    /// Effective status
    pub status: EffectiveStatus,
    /// Protection state
    pub protection: ProtectionState,
}

/// Result of a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskList {
    /// Annotated tasks
    pub tasks: Vec<AnnotatedTask>,
    /// Merge counts; all zero when no merge ran
    pub summary: MergeSummary,
    /// True if a merge ran this cycle
    pub merged: bool,
    /// When the cycle finished
    pub refreshed_at: DateTime<Utc>,
}

impl TaskList {
    /// Task by id
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&AnnotatedTask> {
        self.tasks.iter().find(|t| t.record.id == id)
    }

    /// Plain records
    #[must_use]
    pub fn records(&self) -> Vec<TaskRecord> {
        self.tasks.iter().map(|t| t.record.clone()).collect()
    }
}

/// Owns the current task list and runs refresh cycles
#[derive(Debug)]
pub struct TaskSync {
    directory: DirectoryFetcher,
    engine: MergeEngine,
    state: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<TaskList>>,
    gate: tokio::sync::Mutex<()>,
}

impl TaskSync {
    /// Create service
    #[must_use]
    pub fn new(directory: DirectoryFetcher, engine: MergeEngine, state: Arc<dyn StateStore>) -> Self {
        Self {
            directory,
            engine,
            state,
            clock: Arc::new(SystemClock),
            current: RwLock::new(None),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// With injected clock for `refreshed_at`
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Last successfully merged list
    #[must_use]
    pub fn current(&self) -> Option<TaskList> {
        self.current.read().clone()
    }

    /// Run a refresh cycle, waiting for any cycle in flight
    ///
    /// # Errors
    /// Returns the directory or merge failure; the current list is kept.
    pub async fn refresh(&self, force: bool) -> SyncResult<TaskList> {
        let _guard = self.gate.lock().await;
        self.run_cycle(force).await
    }

    /// Run an unforced cycle unless one is already in flight
    ///
    /// Returns `None` when skipped.
    pub async fn refresh_scheduled(&self) -> Option<SyncResult<TaskList>> {
        let Ok(_guard) = self.gate.try_lock() else {
            return None;
        };
        Some(self.run_cycle(false).await)
    }

    /// Annotate records with status and protection from local signals
    #[must_use]
    pub fn annotate(&self, records: Vec<TaskRecord>) -> Vec<AnnotatedTask> {
        records
            .into_iter()
            .map(|record| {
                let signals = LocalSignals::load(self.state.as_ref(), record.id);
                AnnotatedTask {
                    status: derive_status(&record, &signals),
                    protection: protection_state(&signals),
                    record,
                }
            })
            .collect()
    }

    /// Last merged records, from memory or else from the state store
    fn known_records(&self) -> Option<Vec<TaskRecord>> {
        if let Some(list) = self.current.read().as_ref() {
            return Some(list.records());
        }
        let stored = load_task_list(self.state.as_ref())?;
        tracing::debug!(tasks = stored.len(), "resuming from stored task list");
        Some(stored)
    }

    async fn run_cycle(&self, force: bool) -> SyncResult<TaskList> {
        let known = self.known_records();
        let checked = match &known {
            Some(known) if !force => self.engine.detector().compare_directory(known).await,
            _ => self.directory.fetch(force).await.map(|fresh| (true, fresh)),
        };
        let (changed, fresh) = match checked {
            Ok(checked) => checked,
            Err(err) => {
                tracing::warn!(error = %err, force, "directory fetch failed, keeping previous list");
                return Err(err);
            }
        };

        let (records, summary, merged) = match known {
            Some(known) if !changed => {
                tracing::debug!(tasks = known.len(), "directory unchanged, merge skipped");
                (known, MergeSummary::default(), false)
            }
            known => {
                let known = known.unwrap_or_default();
                let outcome = self.engine.merge(&known, fresh, force).await?;
                (outcome.tasks, outcome.summary, true)
            }
        };

        if let Err(err) = save_task_list(self.state.as_ref(), &records) {
            tracing::warn!(error = %err, "could not store task list");
        }

        let list = TaskList {
            tasks: self.annotate(records),
            summary,
            merged,
            refreshed_at: self.clock.now(),
        };
        *self.current.write() = Some(list.clone());
        tracing::info!(tasks = list.tasks.len(), force, merged, "refresh complete");
        Ok(list)
    }
}

/// Fully wired sync stack sharing one clock and one hash store
#[derive(Debug, Clone)]
pub struct SyncServices {
    /// Sync service
    pub sync: Arc<TaskSync>,
    /// Content loader for on-demand resolution
    pub loader: TaskContentLoader,
    /// Resolver shared by the loader and the change detector
    pub resolver: ContentResolver,
}

impl SyncServices {
    /// Wire every component from configuration and ports
    #[must_use]
    pub fn build(
        config: &SyncConfig,
        http: Arc<dyn HttpClient>,
        sheets: Arc<dyn SheetsBackend>,
        state: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = ContentResolver::new(
            http,
            ResponseCache::with_clock(config.cache, clock.clone()),
            config.resolver.clone(),
        )
        .with_sheets(sheets.clone());
        let directory = DirectoryFetcher::new(
            sheets,
            ResponseCache::with_clock(config.cache, clock.clone()),
            config.directory.clone(),
        );
        let hashes = ContentHashStore::with_clock(clock.clone());
        let detector = ChangeDetector::new(directory.clone(), resolver.clone(), hashes.clone());
        let engine = MergeEngine::new(detector, state.clone(), config.resolver.max_concurrent);
        let sync = TaskSync::new(directory, engine, state).with_clock(clock);

        Self {
            sync: Arc::new(sync),
            loader: TaskContentLoader::new(resolver.clone(), hashes),
            resolver,
        }
    }
}
