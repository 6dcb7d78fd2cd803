//! Key-value cache abstraction.
//!
//! Everything the manager stores goes through [`CacheBackend`]: cached
//! search results, resolved settings, and (for the cache-backed history
//! tracker) the auto-expiring request markers.
//!
//! - [`CacheBackend`]: async, object-safe contract over JSON payloads with
//!   per-entry TTLs in minutes, prefix counting and a get-or-populate
//!   primitive that runs at most one populate per key at a time.
//!
//! - [`MokaCacheBackend`]: the in-process implementation. A distributed
//!   backend (e.g. redis) implements the same trait and is injected through
//!   [`SmartCacheBuilder::cache()`](crate::SmartCacheBuilder::cache).

pub mod memory;

pub use memory::{CacheConfig, MokaCacheBackend};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;

/// Async key-value cache with expiring entries.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a live entry.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Return the live entry at `key`, or run `populate` and store its
    /// output for `ttl_minutes`.
    ///
    /// Concurrent callers for the same key must not run `populate` more than
    /// once: later callers wait and receive the stored value. A failed
    /// populate stores nothing and its error is returned to that caller.
    async fn get_or_populate(
        &self,
        key: &str,
        ttl_minutes: u32,
        populate: BoxFuture<'_, Result<Value>>,
    ) -> Result<Value>;

    /// Store `value` for `ttl_minutes`, replacing any existing entry.
    async fn set(&self, key: &str, value: Value, ttl_minutes: u32) -> Result<()>;

    /// Reset the remaining lifetime of an existing entry. Missing keys are ignored.
    async fn set_expiration(&self, key: &str, ttl_minutes: u32) -> Result<()>;

    /// Remaining lifetime of an entry; zero when absent.
    async fn get_expiration(&self, key: &str) -> Result<Duration>;

    /// Number of live entries whose key starts with `prefix`.
    async fn count_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Remove every entry whose key starts with `prefix`.
    async fn remove_by_prefix(&self, prefix: &str) -> Result<()>;
}

/// Clamp signed minutes into a backend TTL; negatives become `0`.
pub(crate) fn ttl_minutes(minutes: i64) -> u32 {
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// Typed [`CacheBackend::get`].
pub async fn get_typed<T>(cache: &dyn CacheBackend, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match cache.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Typed [`CacheBackend::get_or_populate`].
pub async fn get_or_populate_typed<T, F, Fut>(
    cache: &dyn CacheBackend,
    key: &str,
    ttl_minutes: u32,
    populate: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned + Send,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    let populate = async move {
        let value = populate().await?;
        Ok(serde_json::to_value(value)?)
    };
    let value = cache
        .get_or_populate(key, ttl_minutes, Box::pin(populate))
        .await?;
    Ok(serde_json::from_value(value)?)
}
