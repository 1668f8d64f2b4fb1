//! Core types for the task directory
//!
//! Defines:
//! - Task identifiers and records
//! - Content reference kinds
//! - Effective status and protection state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task identifier, unique within one directory fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source and target language
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Source language
    pub source: String,
    /// Target language
    pub target: String,
}

impl LanguagePair {
    /// Create pair
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.source, self.target)
    }
}

/// Kind of content reference on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// Source text
    Source,
    /// Baseline translation
    BaselineTranslation,
    /// Translation settings
    Settings,
    /// Story context
    Context,
    /// Guide prompt
    GuidePrompt,
    /// Basecamp prompt
    BasecampPrompt,
}

impl RefKind {
    /// Every kind, in column order of the record
    pub const ALL: [Self; 6] = [
        Self::Source,
        Self::BaselineTranslation,
        Self::Settings,
        Self::Context,
        Self::GuidePrompt,
        Self::BasecampPrompt,
    ];

    /// Kinds compared by change detection
    pub const CORE: [Self; 4] = [
        Self::Source,
        Self::BaselineTranslation,
        Self::Settings,
        Self::Context,
    ];

    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::BaselineTranslation => "baseline_translation",
            Self::Settings => "settings",
            Self::Context => "context",
            Self::GuidePrompt => "guide_prompt",
            Self::BasecampPrompt => "basecamp_prompt",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content references of a task; empty string means "none"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRefs {
    /// Source text reference
    pub source: String,
    /// Baseline translation reference
    pub baseline_translation: String,
    /// Settings reference
    pub settings: String,
    /// Context reference
    pub context: String,
    /// Guide prompt reference
    pub guide_prompt: String,
    /// Basecamp prompt reference
    pub basecamp_prompt: String,
}

impl ContentRefs {
    /// Reference for `kind`
    #[must_use]
    pub fn get(&self, kind: RefKind) -> &str {
        match kind {
            RefKind::Source => &self.source,
            RefKind::BaselineTranslation => &self.baseline_translation,
            RefKind::Settings => &self.settings,
            RefKind::Context => &self.context,
            RefKind::GuidePrompt => &self.guide_prompt,
            RefKind::BasecampPrompt => &self.basecamp_prompt,
        }
    }

    /// Replace reference for `kind`
    pub fn set(&mut self, kind: RefKind, url: impl Into<String>) {
        let slot = match kind {
            RefKind::Source => &mut self.source,
            RefKind::BaselineTranslation => &mut self.baseline_translation,
            RefKind::Settings => &mut self.settings,
            RefKind::Context => &mut self.context,
            RefKind::GuidePrompt => &mut self.guide_prompt,
            RefKind::BasecampPrompt => &mut self.basecamp_prompt,
        };
        *slot = url.into();
    }

    /// Non-empty references
    pub fn present(&self) -> impl Iterator<Item = (RefKind, &str)> + '_ {
        RefKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind).trim()))
            .filter(|(_, url)| !url.is_empty())
    }

    /// First core kind whose reference differs
    #[must_use]
    pub fn first_core_difference(&self, other: &Self) -> Option<RefKind> {
        RefKind::CORE
            .into_iter()
            .find(|kind| self.get(*kind).trim() != other.get(*kind).trim())
    }

    /// True if every reference is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// One row of the task directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Identifier
    pub id: TaskId,
    /// Sheet row number (1-based) the record came from
    pub row: usize,
    /// Title
    pub title: String,
    /// Episode label
    pub episode: String,
    /// Phase, 1–4
    pub step_order: u8,
    /// Languages
    pub language_pair: LanguagePair,
    /// Deadline as written in the sheet
    pub deadline: String,
    /// Priority as written in the sheet
    pub priority: String,
    /// Content references
    pub refs: ContentRefs,
    /// Backend-declared status, advisory only
    pub status: String,
}

impl TaskRecord {
    /// Create record with defaults for everything but id and title
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            row: 0,
            title: title.into(),
            episode: String::new(),
            step_order: 1,
            language_pair: LanguagePair::default(),
            deadline: String::new(),
            priority: String::new(),
            refs: ContentRefs::default(),
            status: String::new(),
        }
    }

    /// With reference for `kind`
    #[must_use]
    pub fn with_ref(mut self, kind: RefKind, url: impl Into<String>) -> Self {
        self.refs.set(kind, url);
        self
    }

    /// With backend status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Name of the first differing scalar field
    #[must_use]
    pub fn first_scalar_difference(&self, other: &Self) -> Option<&'static str> {
        if self.title.trim() != other.title.trim() {
            Some("title")
        } else if self.episode.trim() != other.episode.trim() {
            Some("episode")
        } else if self.step_order != other.step_order {
            Some("step_order")
        } else if self.language_pair != other.language_pair {
            Some("language_pair")
        } else if self.deadline.trim() != other.deadline.trim() {
            Some("deadline")
        } else if self.priority.trim() != other.priority.trim() {
            Some("priority")
        } else {
            None
        }
    }

    /// Name of the first differing advisory field
    ///
    /// Advisory fields are the row position, the backend status and the
    /// two prompt references. They are refreshed on merge without
    /// counting as a change to the task.
    #[must_use]
    pub fn first_advisory_difference(&self, other: &Self) -> Option<&'static str> {
        if self.row != other.row {
            Some("row")
        } else if self.status.trim() != other.status.trim() {
            Some("status")
        } else if self.refs.guide_prompt.trim() != other.refs.guide_prompt.trim() {
            Some("guide_prompt")
        } else if self.refs.basecamp_prompt.trim() != other.refs.basecamp_prompt.trim() {
            Some("basecamp_prompt")
        } else {
            None
        }
    }

    /// Take the advisory fields from `fresh`
    pub fn adopt_advisory(&mut self, fresh: &Self) {
        self.row = fresh.row;
        self.status.clone_from(&fresh.status);
        self.refs.guide_prompt.clone_from(&fresh.refs.guide_prompt);
        self.refs.basecamp_prompt.clone_from(&fresh.refs.basecamp_prompt);
    }
}

/// Status after local signals are applied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    /// Not started
    Waiting,
    /// Work under way
    InProgress,
    /// Submitted or finished
    Complete,
    /// Any other label, passed through verbatim
    Custom(String),
}

impl EffectiveStatus {
    /// Backend label for waiting
    pub const WAITING_LABEL: &'static str = "대기";
    /// Backend label for in progress
    pub const IN_PROGRESS_LABEL: &'static str = "진행중";
    /// Backend label for complete
    pub const COMPLETE_LABEL: &'static str = "완료";
    /// Local marker label for submitted
    pub const SUBMITTED_LABEL: &'static str = "제출 완료";

    /// Map a label to a status; unknown labels become `Custom`
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "" | Self::WAITING_LABEL => Self::Waiting,
            Self::IN_PROGRESS_LABEL => Self::InProgress,
            Self::COMPLETE_LABEL | Self::SUBMITTED_LABEL => Self::Complete,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Display label
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Waiting => Self::WAITING_LABEL,
            Self::InProgress => Self::IN_PROGRESS_LABEL,
            Self::Complete => Self::COMPLETE_LABEL,
            Self::Custom(label) => label,
        }
    }
}

impl fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a refresh may overwrite a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionState {
    /// A submission exists; never overwritten
    Submitted,
    /// Local work exists; overwritten only when forced
    InProgress,
    /// Free to overwrite
    Unprotected,
}

impl ProtectionState {
    /// True unless unprotected
    #[inline]
    #[must_use]
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Unprotected)
    }

    /// True if a refresh with the given force flag may replace the task
    #[inline]
    #[must_use]
    pub fn allows_overwrite(self, force: bool) -> bool {
        match self {
            Self::Submitted => false,
            Self::InProgress => force,
            Self::Unprotected => true,
        }
    }
}
