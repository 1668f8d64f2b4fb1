//! Time-boxed response cache with a per-key origin throttle
//!
//! Two independent clocks run per cache key:
//! - **freshness**: how long a stored payload may be reused (TTL)
//! - **origin pacing**: how soon the origin may be hit again for the key
//!
//! A forced fetch bypasses freshness but never pacing. Concurrent fetches
//! of one key take turns on a per-key gate, so callers that arrive while
//! an origin call is in flight are served its result.

use crate::clock::{elapsed_between, Clock, SystemClock};
use crate::error::{ContentError, ContentResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Cache tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a served payload, in seconds
    pub ttl_secs: u64,
    /// Minimum spacing between origin calls for one key, in milliseconds
    pub min_call_interval_ms: u64,
    /// Delay before the single retry after a 5xx, in milliseconds
    pub server_error_backoff_ms: u64,
    /// Maximum number of stored entries
    pub max_capacity: u64,
}

impl CacheConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With time-to-live
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// With minimum origin call interval
    #[inline]
    #[must_use]
    pub fn with_min_call_interval(mut self, interval: Duration) -> Self {
        self.min_call_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With 5xx retry backoff
    #[inline]
    #[must_use]
    pub fn with_server_error_backoff(mut self, backoff: Duration) -> Self {
        self.server_error_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Time-to-live as a duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Minimum call interval as a duration
    #[inline]
    #[must_use]
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    /// Retry backoff as a duration
    #[inline]
    #[must_use]
    pub fn server_error_backoff(&self) -> Duration {
        Duration::from_millis(self.server_error_backoff_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            min_call_interval_ms: 1_000,
            server_error_backoff_ms: 3_000,
            max_capacity: 10_000,
        }
    }
}

/// Stored payload with its write time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value
    pub payload: V,
    /// When the value was last written
    pub stored_at: DateTime<Utc>,
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Approximate number of stored entries
    pub entry_count: u64,
    /// Number of keys with a recorded origin call
    pub tracked_keys: usize,
}

/// Response cache keyed by string
///
/// Shared by every concurrent resolution; moka and dashmap both lock per
/// shard, so there is no cross-key coordination.
#[derive(Debug, Clone)]
pub struct ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<String, Arc<CacheEntry<V>>>,
    last_origin_call: Arc<DashMap<String, DateTime<Utc>>>,
    gates: Arc<DashMap<String, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create cache on the wall clock
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create cache on an injected clock
    #[must_use]
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::new(config.max_capacity),
            last_origin_call: Arc::new(DashMap::new()),
            gates: Arc::new(DashMap::new()),
            clock,
            config,
        }
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fresh payload for `key`, or `None`
    ///
    /// Entries older than the TTL are evicted on read.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key).await?;
        if elapsed_between(entry.stored_at, self.clock.now()) < self.config.ttl() {
            Some(entry.payload.clone())
        } else {
            self.entries.invalidate(key).await;
            None
        }
    }

    /// Store payload, resetting its timestamp
    pub async fn put(&self, key: &str, payload: V) {
        let entry = CacheEntry {
            payload,
            stored_at: self.clock.now(),
        };
        self.entries.insert(key.to_string(), Arc::new(entry)).await;
    }

    /// Drop one entry
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Drop every entry; pacing state is kept
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// True if the origin was called for `key` less than the minimum
    /// interval ago
    #[must_use]
    pub fn should_throttle(&self, key: &str) -> bool {
        self.throttle_remaining(key).is_some()
    }

    /// Time left before the origin may be called again for `key`
    #[must_use]
    pub fn throttle_remaining(&self, key: &str) -> Option<Duration> {
        let last = *self.last_origin_call.get(key)?;
        let elapsed = elapsed_between(last, self.clock.now());
        self.config.min_call_interval().checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Note that the origin was just called for `key`
    pub fn record_origin_call(&self, key: &str) {
        self.last_origin_call.insert(key.to_string(), self.clock.now());
    }

    fn gate(&self, key: &str) -> Arc<Mutex<()>> {
        self.gates.entry(key.to_string()).or_default().clone()
    }

    /// Read through the cache
    ///
    /// - `force = false`: a fresh entry is returned without touching the origin
    /// - one origin call per key at a time; later callers wait for it and
    ///   are then served the stored result
    /// - throttled: a fresh entry is returned if present, otherwise
    ///   [`ContentError::OriginThrottled`]
    /// - a 5xx from `origin` is retried once after the configured backoff
    ///
    /// Successful origin results always update both the entry and the
    /// pacing timestamp.
    ///
    /// # Errors
    /// Returns the origin failure, or `OriginThrottled`.
    pub async fn fetch<F, Fut>(&self, key: &str, force: bool, mut origin: F) -> ContentResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ContentResult<V>>,
    {
        if !force {
            if let Some(hit) = self.get(key).await {
                tracing::debug!(key, "cache hit");
                return Ok(hit);
            }
        }

        let gate = self.gate(key);
        let _turn = gate.lock().await;

        if !force {
            if let Some(hit) = self.get(key).await {
                tracing::debug!(key, "cache filled while waiting");
                return Ok(hit);
            }
        }

        if let Some(retry_after) = self.throttle_remaining(key) {
            if let Some(hit) = self.get(key).await {
                tracing::debug!(key, ?retry_after, "origin throttled, serving cached entry");
                return Ok(hit);
            }
            return Err(ContentError::OriginThrottled {
                key: key.to_string(),
                retry_after,
            });
        }

        self.record_origin_call(key);
        let result = match origin().await {
            Err(err) if err.is_server_error() => {
                let backoff = self.config.server_error_backoff();
                tracing::warn!(key, error = %err, ?backoff, "origin 5xx, retrying once");
                tokio::time::sleep(backoff).await;
                self.record_origin_call(key);
                origin().await
            }
            other => other,
        };

        let payload = result?;
        self.put(key, payload.clone()).await;
        self.record_origin_call(key);
        Ok(payload)
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.entry_count(),
            tracked_keys: self.last_origin_call.len(),
        }
    }
}
