//! Fetch channel: direct requests or relay rotation

use crate::decode::decode_body;
use crate::origin::HttpClient;
use crate::relay::RelayEndpoint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How origin requests leave the process
#[derive(Debug, Clone)]
pub struct FetchChannel {
    http: Arc<dyn HttpClient>,
    privileged: bool,
    relays: Vec<RelayEndpoint>,
    attempt_timeout: Duration,
}

impl FetchChannel {
    /// Create channel
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpClient>,
        privileged: bool,
        relays: Vec<RelayEndpoint>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            http,
            privileged,
            relays,
            attempt_timeout,
        }
    }

    /// Underlying HTTP client
    #[must_use]
    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Fetch `url` and decode the body into text
    ///
    /// Direct when privileged; otherwise each relay is tried in order
    /// until one returns a usable body. Every request increments
    /// `attempts`.
    pub async fn fetch_text(&self, url: &str, attempts: &AtomicUsize) -> Option<String> {
        if self.privileged {
            let body = self.get_once(url, attempts).await?;
            return decode_body(&body);
        }

        for relay in &self.relays {
            let Some(body) = self.get_once(&relay.wrap(url), attempts).await else {
                continue;
            };
            let Some(inner) = relay.unwrap_body(body) else {
                tracing::debug!(relay = %relay.name, "relay envelope carried no body");
                continue;
            };
            match decode_body(&inner) {
                Some(text) if !text.trim().is_empty() => return Some(text),
                _ => tracing::debug!(relay = %relay.name, "relay body empty or binary"),
            }
        }
        None
    }

    async fn get_once(&self, url: &str, attempts: &AtomicUsize) -> Option<Vec<u8>> {
        attempts.fetch_add(1, Ordering::SeqCst);
        match tokio::time::timeout(self.attempt_timeout, self.http.get(url)).await {
            Ok(Ok(response)) if response.is_success() => Some(response.body),
            Ok(Ok(response)) => {
                tracing::debug!(url, status = response.status, "origin returned non-success");
                None
            }
            Ok(Err(err)) => {
                tracing::debug!(url, error = %err, "origin request failed");
                None
            }
            Err(_) => {
                tracing::warn!(url, timeout = ?self.attempt_timeout, "origin attempt timed out");
                None
            }
        }
    }
}
