//! Error types for the sync core
//!
//! - `SyncError`: anything that aborts or invalidates a sync cycle
//! - `StateError`: local persisted state I/O and encoding
//! - `TranslateError`: failures of the opaque translation function

use crate::types::TaskId;
use transync_content::ContentError;

/// Sync cycle error
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Directory grid does not have the expected shape
    #[error("malformed directory: {reason}")]
    MalformedDirectory {
        /// What was wrong
        reason: String,
    },

    /// A protected task would have been overwritten
    #[error("protection violation on task {task_id}")]
    ProtectionViolation {
        /// Offending task
        task_id: TaskId,
    },

    /// Upstream content or directory fetch failed
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// Local state could not be read or written
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create malformed-directory error
    #[inline]
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDirectory {
            reason: reason.into(),
        }
    }

    /// Check if the sync cycle must be abandoned, keeping the previous list
    #[inline]
    #[must_use]
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, Self::MalformedDirectory { .. } | Self::Content(_) | Self::Config(_))
    }

    /// Check if the caller should wait before retrying
    #[inline]
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Content(e) if e.is_throttled())
    }
}

/// Local state error
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// File could not be read or written
    #[error("state file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Stored document is not valid JSON
    #[error("state file {path} is not valid json: {message}")]
    Encoding {
        /// File path
        path: String,
        /// Parser message
        message: String,
    },
}

impl StateError {
    /// Create I/O error
    #[must_use]
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Translation failure, classified for user-facing messaging
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    /// Credentials missing or rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Usage quota exhausted
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Request never completed
    #[error("network error: {0}")]
    Network(String),

    /// Anything else
    #[error("translation failed: {0}")]
    Other(String),
}

impl TranslateError {
    /// Check if retrying later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Quota(_) | Self::Network(_))
    }

    /// Short message for the user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Auth(_) => "Sign in again to use translation.",
            Self::Quota(_) => "Translation quota is used up; try again later.",
            Self::Network(_) => "Network problem while translating; check the connection.",
            Self::Other(_) => "Translation failed.",
        }
    }
}

/// Result alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_directory_aborts_cycle() {
        let err = SyncError::malformed("only 1 row");
        assert!(err.aborts_cycle());
        assert!(err.to_string().contains("only 1 row"));
    }

    #[test]
    fn protection_violation_does_not_abort() {
        let err = SyncError::ProtectionViolation { task_id: TaskId(5) };
        assert!(!err.aborts_cycle());
        assert_eq!(err.to_string(), "protection violation on task 5");
    }

    #[test]
    fn throttled_content_is_detected() {
        let err = SyncError::from(ContentError::OriginThrottled {
            key: "directory".to_string(),
            retry_after: std::time::Duration::from_millis(200),
        });
        assert!(err.is_throttled());
    }

    #[test]
    fn translate_retryability() {
        assert!(TranslateError::Network("reset".into()).is_retryable());
        assert!(!TranslateError::Auth("expired".into()).is_retryable());
    }
}
