//! Content resolver
//!
//! Turns a document reference into plain text by folding over an ordered
//! strategy chain and stopping at the first plausible result.
//!
//! # Flow
//!
//! ```text
//! url → classify → (drive-file? look up name → route) → chain_for(class)
//!     → strategy 1 → strategy 2 → … → raw url → UnresolvableContent
//! ```
//!
//! Every step of a chain targets a *different* endpoint; nothing here
//! retries the same call.

pub mod classify;
pub mod strategy;
pub mod transport;

pub use classify::{classify, route_by_name, Endpoint, RefClass};
pub use strategy::{chain_for, BodyFormat, EndpointStrategy, ResolveContext, SpreadsheetTabsStrategy, Strategy};
pub use transport::FetchChannel;

use crate::cache::ResponseCache;
use crate::error::{ContentError, ContentResult};
use crate::html::{extract_title, is_plausible};
use crate::origin::HttpClient;
use crate::relay::{default_relays, RelayEndpoint};
use crate::sheets::SheetsBackend;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

/// Resolver tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Texts must be longer than this many characters to count
    pub min_text_len: usize,
    /// Per-request timeout, in seconds
    pub attempt_timeout_secs: u64,
    /// Upper bound on concurrent resolutions
    pub max_concurrent: usize,
    /// Whether requests may go to origins directly
    pub privileged: bool,
    /// Relay ranking used when not privileged
    pub relays: Vec<RelayEndpoint>,
}

impl ResolverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With plausibility threshold
    #[inline]
    #[must_use]
    pub fn with_min_text_len(mut self, len: usize) -> Self {
        self.min_text_len = len;
        self
    }

    /// With per-request timeout
    #[inline]
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Relay-only channel with the given ranking
    #[inline]
    #[must_use]
    pub fn with_relays(mut self, relays: Vec<RelayEndpoint>) -> Self {
        self.privileged = false;
        self.relays = relays;
        self
    }

    /// Per-request timeout as a duration
    #[inline]
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_text_len: 20,
            attempt_timeout_secs: 20,
            max_concurrent: 6,
            privileged: true,
            relays: default_relays(),
        }
    }
}

/// Cache key for resolved text of a URL
#[inline]
#[must_use]
pub fn content_cache_key(url: &str) -> String {
    format!("content:{}", url.trim())
}

/// Reference-to-text resolver
#[derive(Debug, Clone)]
pub struct ContentResolver {
    channel: FetchChannel,
    sheets: Option<Arc<dyn SheetsBackend>>,
    cache: ResponseCache<String>,
    config: ResolverConfig,
}

impl ContentResolver {
    /// Create resolver
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>, cache: ResponseCache<String>, config: ResolverConfig) -> Self {
        let channel = FetchChannel::new(
            http,
            config.privileged,
            config.relays.clone(),
            config.attempt_timeout(),
        );
        Self {
            channel,
            sheets: None,
            cache,
            config,
        }
    }

    /// With spreadsheet backend for tab enumeration
    #[must_use]
    pub fn with_sheets(mut self, sheets: Arc<dyn SheetsBackend>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Shared response cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ResponseCache<String> {
        &self.cache
    }

    /// Resolve a reference, bypassing the cache
    ///
    /// # Errors
    /// Returns [`ContentError::UnresolvableContent`] once every strategy
    /// for the reference's class has been tried.
    pub async fn resolve(&self, url: &str) -> ContentResult<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ContentError::unresolvable(url, 0));
        }

        let attempts = AtomicUsize::new(0);
        let mut class = classify(url);
        if let RefClass::DriveFile { file_id } = &class {
            class = self.route_drive_file(url, file_id, &attempts).await;
        }

        let ctx = ResolveContext::new(url, &class, &self.channel, self.sheets.as_ref(), &attempts);
        for strategy in chain_for(&class) {
            match strategy.attempt(&ctx).await {
                Some(text) if is_plausible(&text, self.config.min_text_len) => {
                    tracing::debug!(
                        url,
                        class = %class,
                        strategy = strategy.name(),
                        attempts = ctx.attempts(),
                        "content resolved"
                    );
                    return Ok(text.trim().to_string());
                }
                Some(text) => tracing::debug!(
                    url,
                    strategy = strategy.name(),
                    chars = text.chars().count(),
                    "implausible result, falling through"
                ),
                None => tracing::debug!(url, strategy = strategy.name(), "strategy failed"),
            }
        }

        let attempts = ctx.attempts();
        tracing::warn!(url, class = %class, attempts, "all strategies exhausted");
        Err(ContentError::unresolvable(url, attempts))
    }

    /// Resolve through the response cache
    ///
    /// `force` skips a fresh cache entry but still respects the per-key
    /// origin pacing. A throttled call with nothing stored waits out the
    /// interval once and tries again.
    ///
    /// # Errors
    /// Returns `UnresolvableContent`, or `OriginThrottled` if the second
    /// try is throttled too.
    pub async fn resolve_cached(&self, url: &str, force: bool) -> ContentResult<String> {
        let key = content_cache_key(url);
        match self.cache.fetch(&key, force, || self.resolve(url)).await {
            Err(err) if err.is_throttled() => {
                let wait = err.retry_after().unwrap_or_default();
                tracing::debug!(url, ?wait, "throttled, waiting once");
                tokio::time::sleep(wait).await;
                self.cache.fetch(&key, force, || self.resolve(url)).await
            }
            other => other,
        }
    }

    /// Resolve many references with bounded concurrency
    ///
    /// Results come back in input order.
    pub async fn resolve_many(&self, urls: &[String], force: bool) -> Vec<ContentResult<String>> {
        stream::iter(urls.iter())
            .map(|url| self.resolve_cached(url, force))
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await
    }

    /// Look up a file's name and pick the class that can read it
    async fn route_drive_file(&self, url: &str, file_id: &str, attempts: &AtomicUsize) -> RefClass {
        let view_class = RefClass::DriveFile {
            file_id: file_id.to_string(),
        };
        let Some(view_url) = Endpoint::DriveView.url(url, &view_class) else {
            return view_class;
        };

        let routed = match self.channel.fetch_text(&view_url, attempts).await {
            Some(page) => match extract_title(&page) {
                Some(title) => route_by_name(file_id, classify::file_name_from_title(&title)),
                None => RefClass::DriveText {
                    file_id: file_id.to_string(),
                },
            },
            None => RefClass::DriveText {
                file_id: file_id.to_string(),
            },
        };
        tracing::debug!(url, routed = %routed, "drive file routed");
        routed
    }
}
