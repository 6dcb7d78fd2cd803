//! In-process cache backend.
//!
//! [`MokaCacheBackend`] implements [`CacheBackend`] on top of moka's async
//! cache.
//!
//! # Expiry
//!
//! Every entry carries its own TTL. Moka evicts it through a per-entry
//! [`Expiry`] policy, and every read also checks the entry's deadline
//! against the injected [`Clock`]. The second check is what makes expiry
//! exact at the boundary and lets a [`ManualClock`](crate::ManualClock)
//! drive expiry in tests.
//!
//! # Populate
//!
//! `get_or_populate` first tries a plain read. On a miss it falls back to
//! moka's `and_try_compute_with`, which runs compute operations for the
//! same key one at a time. The first caller runs the populate future and
//! stores its result; callers queued behind it find a live entry and
//! return it without populating.
//!
//! # Prefix counting
//!
//! `count_by_prefix` walks every entry. That is O(entries); a distributed
//! backend would use its own key scan.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde_json::Value;

use super::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::{Result, SmartCacheError};

/// Configuration for the in-process cache.
///
/// ```rust
/// # use smartcache::CacheConfig;
/// let config = CacheConfig::new().max_entries(50_000);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 100,000.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }
}

#[derive(Clone, Debug)]
struct CachedEntry {
    value: Value,
    ttl: Duration,
    expires_at: DateTime<Utc>,
}

impl CachedEntry {
    fn new(value: Value, ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .map(|ttl| now + ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            value,
            ttl,
            expires_at,
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

struct EntryExpiry;

impl Expiry<String, CachedEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

fn minutes(ttl_minutes: u32) -> Duration {
    Duration::from_secs(u64::from(ttl_minutes) * 60)
}

/// In-memory [`CacheBackend`].
///
/// Thread-safe (moka handles concurrent access internally); share it
/// behind an `Arc`.
pub struct MokaCacheBackend {
    cache: Cache<String, CachedEntry>,
    clock: Arc<dyn Clock>,
}

impl MokaCacheBackend {
    /// Create a cache on the system clock.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache that judges expiry by `clock`.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(EntryExpiry)
            .build();
        Self { cache, clock }
    }

    async fn live_entry(&self, key: &str) -> Option<CachedEntry> {
        let now = self.clock.now();
        self.cache.get(key).await.filter(|e| e.is_live(now))
    }
}

impl Default for MokaCacheBackend {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.live_entry(key).await.map(|e| e.value))
    }

    async fn get_or_populate(
        &self,
        key: &str,
        ttl_minutes: u32,
        populate: BoxFuture<'_, Result<Value>>,
    ) -> Result<Value> {
        if let Some(entry) = self.live_entry(key).await {
            return Ok(entry.value);
        }

        let clock = Arc::clone(&self.clock);
        let ttl = minutes(ttl_minutes);
        let outcome = self
            .cache
            .entry_by_ref(key)
            .and_try_compute_with(|existing| async move {
                if let Some(existing) = existing {
                    if existing.value().is_live(clock.now()) {
                        return Ok(Op::Nop);
                    }
                }
                let value = populate.await?;
                Ok::<_, SmartCacheError>(Op::Put(CachedEntry::new(value, ttl, clock.now())))
            })
            .await?;

        match outcome {
            CompResult::Inserted(entry)
            | CompResult::ReplacedWith(entry)
            | CompResult::Unchanged(entry) => Ok(entry.into_value().value),
            CompResult::StillNone(_) | CompResult::Removed(_) => Err(SmartCacheError::Cache(
                format!("populate left no entry for key '{key}'"),
            )),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl_minutes: u32) -> Result<()> {
        let entry = CachedEntry::new(value, minutes(ttl_minutes), self.clock.now());
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn set_expiration(&self, key: &str, ttl_minutes: u32) -> Result<()> {
        if let Some(entry) = self.live_entry(key).await {
            let entry = CachedEntry::new(entry.value, minutes(ttl_minutes), self.clock.now());
            self.cache.insert(key.to_string(), entry).await;
        }
        Ok(())
    }

    async fn get_expiration(&self, key: &str) -> Result<Duration> {
        let now = self.clock.now();
        Ok(self
            .live_entry(key)
            .await
            .map(|e| e.remaining(now))
            .unwrap_or(Duration::ZERO))
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<usize> {
        let now = self.clock.now();
        Ok(self
            .cache
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .count())
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<()> {
        let keys: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.cache.invalidate(key.as_str()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_liveness_is_exclusive_at_deadline() {
        let now = Utc::now();
        let entry = CachedEntry::new(Value::Null, minutes(1), now);
        assert!(entry.is_live(now + chrono::Duration::seconds(59)));
        assert!(!entry.is_live(now + chrono::Duration::minutes(1)));
    }

    #[test]
    fn remaining_never_negative() {
        let now = Utc::now();
        let entry = CachedEntry::new(Value::Null, minutes(1), now);
        assert_eq!(entry.remaining(now + chrono::Duration::hours(1)), Duration::ZERO);
        assert_eq!(entry.remaining(now), Duration::from_secs(60));
    }

    #[test]
    fn config_builder_pattern() {
        let config = CacheConfig::new().max_entries(500);
        assert_eq!(config.max_entries, 500);
    }
}
