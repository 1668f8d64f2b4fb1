//! Local persisted state
//!
//! The presentation layer writes progress markers, submissions and draft
//! prompts under per-task keys; the sync core reads them back as
//! [`LocalSignals`]. Values are JSON documents, except that a progress
//! marker may also be a bare string.
//!
//! The last merged task list is kept under [`TASK_LIST_KEY`] so that a
//! new process merges against it instead of starting empty.
//!
//! Reading never fails a sync: missing, unreadable or malformed values are
//! logged and treated as absent.

use crate::error::StateError;
use crate::types::{TaskId, TaskRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// String key/value store
pub trait StateStore: Debug + Send + Sync {
    /// Value for `key`
    ///
    /// # Errors
    /// Returns [`StateError`] when the backing storage fails.
    fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Store `value` under `key`
    ///
    /// # Errors
    /// Returns [`StateError`] when the backing storage fails.
    fn set(&self, key: &str, value: String) -> Result<(), StateError>;

    /// Delete `key`
    ///
    /// # Errors
    /// Returns [`StateError`] when the backing storage fails.
    fn remove(&self, key: &str) -> Result<(), StateError>;
}

/// Key of the progress marker for a task
#[must_use]
pub fn progress_key(id: TaskId) -> String {
    format!("task_progress_{id}")
}

/// Key of the submission record for a task
#[must_use]
pub fn submission_key(id: TaskId) -> String {
    format!("submission_{id}")
}

/// Key of the draft prompt for a task
#[must_use]
pub fn draft_key(id: TaskId) -> String {
    format!("draft_prompt_{id}")
}

/// Key of the last merged task list
pub const TASK_LIST_KEY: &str = "task_list";

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StateError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StateError> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Store backed by one JSON object on disk
///
/// The whole document is held in memory and rewritten through a
/// temporary file and rename on every change.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileStateStore {
    /// Open `path`; a missing file is an empty store
    ///
    /// # Errors
    /// Returns [`StateError::Io`] if the file cannot be read and
    /// [`StateError::Encoding`] if it is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| StateError::Encoding {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StateError::io(path.display().to_string(), e)),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StateError> {
        let display = self.path.display().to_string();
        let body = serde_json::to_string_pretty(values).map_err(|e| StateError::Encoding {
            path: display.clone(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(&display, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| StateError::io(&display, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StateError::io(&display, e))
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StateError> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StateError> {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

/// A finished submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionRecord {
    /// When it was submitted
    pub submitted_at: Option<DateTime<Utc>>,
    /// Who submitted it
    pub submitted_by: String,
    /// Submitted translation
    pub translation: String,
}

/// Prompt text drafted locally for a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPrompt {
    /// Edited guide prompt
    pub guide_prompt: String,
    /// Edited basecamp prompt
    pub basecamp_prompt: String,
    /// Free-form additions
    pub custom_prompt: String,
}

impl DraftPrompt {
    /// True if any field has visible text
    #[must_use]
    pub fn has_content(&self) -> bool {
        [&self.guide_prompt, &self.basecamp_prompt, &self.custom_prompt]
            .iter()
            .any(|s| !s.trim().is_empty())
    }
}

/// Local signals for one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSignals {
    /// Submission record, if any
    pub submission: Option<SubmissionRecord>,
    /// Explicit progress marker, if any
    pub progress_marker: Option<String>,
    /// Draft prompt, if any
    pub draft: Option<DraftPrompt>,
}

impl LocalSignals {
    /// No local signals
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// With submission
    #[must_use]
    pub fn with_submission(mut self, record: SubmissionRecord) -> Self {
        self.submission = Some(record);
        self
    }

    /// With progress marker
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.progress_marker = Some(marker.into());
        self
    }

    /// With draft
    #[must_use]
    pub fn with_draft(mut self, draft: DraftPrompt) -> Self {
        self.draft = Some(draft);
        self
    }

    /// True if a draft with visible text exists
    #[must_use]
    pub fn has_draft(&self) -> bool {
        self.draft.as_ref().is_some_and(DraftPrompt::has_content)
    }

    /// Read every signal of `id` from `store`
    #[must_use]
    pub fn load(store: &dyn StateStore, id: TaskId) -> Self {
        Self {
            submission: read_json(store, &submission_key(id)),
            progress_marker: read_marker(store, &progress_key(id)),
            draft: read_json(store, &draft_key(id)),
        }
    }
}

fn read_raw(store: &dyn StateStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(err) => {
            tracing::warn!(key, error = %err, "local state unreadable, ignoring");
            None
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    let raw = read_raw(store, key)?;
    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key, error = %err, "malformed local state, treating as absent");
            None
        }
    }
}

fn read_marker(store: &dyn StateStore, key: &str) -> Option<String> {
    let raw = read_raw(store, key)?;
    let raw = raw.trim();
    let marker = if raw.starts_with('"') {
        match serde_json::from_str::<String>(raw) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(key, error = %err, "malformed progress marker, treating as absent");
                return None;
            }
        }
    } else {
        raw.to_string()
    };
    let marker = marker.trim();
    (!marker.is_empty()).then(|| marker.to_string())
}

/// Store a progress marker for `id`
///
/// # Errors
/// Returns [`StateError`] when the store fails.
pub fn save_marker(store: &dyn StateStore, id: TaskId, marker: &str) -> Result<(), StateError> {
    store.set(&progress_key(id), encode(&marker.to_string())?)
}

/// Store a submission record for `id`
///
/// # Errors
/// Returns [`StateError`] when the store fails.
pub fn save_submission(store: &dyn StateStore, id: TaskId, record: &SubmissionRecord) -> Result<(), StateError> {
    store.set(&submission_key(id), encode(record)?)
}

/// Store a draft prompt for `id`
///
/// # Errors
/// Returns [`StateError`] when the store fails.
pub fn save_draft(store: &dyn StateStore, id: TaskId, draft: &DraftPrompt) -> Result<(), StateError> {
    store.set(&draft_key(id), encode(draft)?)
}

/// Last merged task list, if one was stored and parses
#[must_use]
pub fn load_task_list(store: &dyn StateStore) -> Option<Vec<TaskRecord>> {
    read_json(store, TASK_LIST_KEY)
}

/// Store the merged task list
///
/// # Errors
/// Returns [`StateError`] when the store fails.
pub fn save_task_list(store: &dyn StateStore, tasks: &[TaskRecord]) -> Result<(), StateError> {
    store.set(TASK_LIST_KEY, encode(&tasks)?)
}

fn encode<T: Serialize>(value: &T) -> Result<String, StateError> {
    serde_json::to_string(value).map_err(|e| StateError::Encoding {
        path: "<value>".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: TaskId = TaskId(5);

    #[test]
    fn missing_keys_mean_no_signals() {
        let store = MemoryStateStore::new();
        assert_eq!(LocalSignals::load(&store, ID), LocalSignals::none());
    }

    #[test]
    fn bare_and_quoted_markers_are_read() {
        let store = MemoryStateStore::new();
        store.set(&progress_key(ID), "진행중".into()).unwrap();
        assert_eq!(LocalSignals::load(&store, ID).progress_marker.as_deref(), Some("진행중"));

        store.set(&progress_key(ID), "\"제출 완료\"".into()).unwrap();
        assert_eq!(LocalSignals::load(&store, ID).progress_marker.as_deref(), Some("제출 완료"));
    }

    #[test]
    fn malformed_json_is_absent() {
        let store = MemoryStateStore::new();
        store.set(&submission_key(ID), "{not json".into()).unwrap();
        store.set(&draft_key(ID), "[1,2".into()).unwrap();
        store.set(&progress_key(ID), "\"unterminated".into()).unwrap();
        assert_eq!(LocalSignals::load(&store, ID), LocalSignals::none());
    }

    #[test]
    fn null_submission_is_absent() {
        let store = MemoryStateStore::new();
        store.set(&submission_key(ID), "null".into()).unwrap();
        assert!(LocalSignals::load(&store, ID).submission.is_none());
    }

    #[test]
    fn partial_submission_object_is_present() {
        let store = MemoryStateStore::new();
        store.set(&submission_key(ID), r#"{"translation":"done"}"#.into()).unwrap();
        let signals = LocalSignals::load(&store, ID);
        assert_eq!(signals.submission.map(|s| s.translation).as_deref(), Some("done"));
    }

    #[test]
    fn blank_draft_has_no_content() {
        let draft = DraftPrompt {
            guide_prompt: "   ".into(),
            ..DraftPrompt::default()
        };
        assert!(!LocalSignals::none().with_draft(draft).has_draft());
    }

    #[test]
    fn task_list_survives_a_reopened_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let tasks = vec![TaskRecord::new(ID, "Ep 5").with_status("진행중")];

        let store = FileStateStore::open(&path).unwrap();
        assert_eq!(load_task_list(&store), None);
        save_task_list(&store, &tasks).unwrap();

        let reopened = FileStateStore::open(&path).unwrap();
        assert_eq!(load_task_list(&reopened), Some(tasks));

        reopened.set(TASK_LIST_KEY, "[{\"id\":".into()).unwrap();
        assert_eq!(load_task_list(&reopened), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("local.json");

        let store = FileStateStore::open(&path).unwrap();
        save_marker(&store, ID, "진행중").unwrap();
        save_draft(
            &store,
            ID,
            &DraftPrompt {
                custom_prompt: "keep honorifics".into(),
                ..DraftPrompt::default()
            },
        )
        .unwrap();
        drop(store);

        let reopened = FileStateStore::open(&path).unwrap();
        let signals = LocalSignals::load(&reopened, ID);
        assert_eq!(signals.progress_marker.as_deref(), Some("진행중"));
        assert!(signals.has_draft());
    }

    #[test]
    fn file_store_rejects_garbage_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStateStore::open(&path), Err(StateError::Encoding { .. })));
    }
}
