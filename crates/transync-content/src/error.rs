//! Error types for content resolution
//!
//! Provides error handling for:
//! - Origin calls (HTTP transport, status codes, timeouts)
//! - Content resolution (strategy exhaustion)
//! - Throttling of origin calls per cache key

use std::time::Duration;

/// Errors raised by a single call to an upstream origin
#[derive(Debug, Clone, thiserror::Error)]
pub enum OriginError {
    /// Origin answered with a 5xx status
    #[error("origin server error {status} for {url}")]
    ServerError { status: u16, url: String },

    /// Origin answered with a non-success, non-5xx status
    #[error("origin returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Connection, TLS or protocol failure
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Attempt exceeded the per-attempt timeout
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// Body could not be decoded into the expected shape
    #[error("decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl OriginError {
    /// Classify an HTTP status into an origin error
    ///
    /// Returns `None` for 2xx statuses.
    #[must_use]
    pub fn from_status(status: u16, url: impl Into<String>) -> Option<Self> {
        match status {
            200..=299 => None,
            500..=599 => Some(Self::ServerError {
                status,
                url: url.into(),
            }),
            _ => Some(Self::Status {
                status,
                url: url.into(),
            }),
        }
    }

    /// Create transport error for url
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create decode error for url
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Check if the origin reported a 5xx
    #[inline]
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ServerError { .. })
    }
}

/// Errors surfaced by the content layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentError {
    /// Every resolution strategy was attempted without a plausible result
    #[error("unresolvable content at {url} after {attempts} attempts")]
    UnresolvableContent { url: String, attempts: usize },

    /// Calling the origin now would violate the minimum call interval
    #[error("origin throttled for key '{key}', retry after {retry_after:?}")]
    OriginThrottled { key: String, retry_after: Duration },

    /// Origin call failed
    #[error("origin error: {0}")]
    Origin(#[from] OriginError),
}

impl ContentError {
    /// Create unresolvable content error
    pub fn unresolvable(url: impl Into<String>, attempts: usize) -> Self {
        Self::UnresolvableContent {
            url: url.into(),
            attempts,
        }
    }

    /// Check if the error is the strategy-exhaustion case
    #[inline]
    #[must_use]
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Self::UnresolvableContent { .. })
    }

    /// Check if the caller should wait before calling again
    #[inline]
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::OriginThrottled { .. })
    }

    /// How long to wait before calling again, if throttled
    #[inline]
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::OriginThrottled { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Check if the underlying origin reported a 5xx
    #[inline]
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Origin(e) if e.is_server_error())
    }
}

/// Result type alias for content operations
pub type ContentResult<T> = Result<T, ContentError>;
