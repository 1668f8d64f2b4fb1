//! Effective status and protection
//!
//! Precedence, highest first:
//! 1. submission record
//! 2. explicit progress marker
//! 3. draft prompt with visible text
//! 4. backend-declared status
//!
//! Both functions are pure; they are re-run on every directory load.

use crate::state::LocalSignals;
use crate::types::{EffectiveStatus, ProtectionState, TaskRecord};

/// Effective status of a task
#[must_use]
pub fn derive_status(task: &TaskRecord, signals: &LocalSignals) -> EffectiveStatus {
    if signals.submission.is_some() {
        return EffectiveStatus::Complete;
    }
    if let Some(marker) = signals.progress_marker.as_deref() {
        return marker_status(marker);
    }
    if signals.has_draft() {
        return EffectiveStatus::InProgress;
    }
    EffectiveStatus::from_label(&task.status)
}

/// Status named by an explicit progress marker
///
/// `제출 완료` means complete; anything else passes through verbatim.
#[must_use]
pub fn marker_status(marker: &str) -> EffectiveStatus {
    match marker.trim() {
        EffectiveStatus::SUBMITTED_LABEL => EffectiveStatus::Complete,
        EffectiveStatus::WAITING_LABEL => EffectiveStatus::Waiting,
        EffectiveStatus::IN_PROGRESS_LABEL => EffectiveStatus::InProgress,
        other => EffectiveStatus::Custom(other.to_string()),
    }
}

/// Protection state from local signals
///
/// The backend status never protects a task.
#[must_use]
pub fn protection_state(signals: &LocalSignals) -> ProtectionState {
    if signals.submission.is_some() {
        return ProtectionState::Submitted;
    }
    if let Some(marker) = signals.progress_marker.as_deref() {
        return match marker_status(marker) {
            EffectiveStatus::Complete => ProtectionState::Submitted,
            EffectiveStatus::Waiting => ProtectionState::Unprotected,
            EffectiveStatus::InProgress | EffectiveStatus::Custom(_) => ProtectionState::InProgress,
        };
    }
    if signals.has_draft() {
        return ProtectionState::InProgress;
    }
    ProtectionState::Unprotected
}
