//! Incoming/outgoing request history.
//!
//! The manager records every search it receives (incoming) and every
//! upstream call it makes (outgoing). From that history it asks two
//! questions: how many searches per minute does a history bucket receive,
//! and has a supplier exhausted its upstream limit.
//!
//! Two interchangeable trackers implement [`SearchHistory`]:
//!
//! - [`CacheSearchHistory`] — writes auto-expiring marker entries into the
//!   [`CacheBackend`](crate::cache::CacheBackend) and counts them by prefix.
//!   The window slides by TTL eviction.
//!
//! - [`DatabaseSearchHistory`] — appends rows to an append-only log in a
//!   [`GenericStore`](crate::store::GenericStore) and range-counts them.

pub mod cache;
pub mod database;

pub use cache::CacheSearchHistory;
pub use database::DatabaseSearchHistory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{Result, SmartCacheError};

/// Request history tracker.
///
/// `prefix` is the caller-built pattern identifying a history bucket
/// (incoming) or a supplier (outgoing); `supplier_type` selects settings.
#[async_trait]
pub trait SearchHistory: Send + Sync {
    /// Record one search.
    async fn add_incoming(&self, prefix: &str, supplier_type: &str) -> Result<()>;

    /// Record one upstream call.
    async fn add_outgoing(&self, prefix: &str, supplier_type: &str) -> Result<()>;

    /// Searches per minute over the configured RPM window.
    async fn rpm(&self, prefix: &str, supplier_type: &str) -> Result<f64>;

    /// Whether any enabled limit rule has been met or exceeded.
    async fn is_limitation_reached(&self, prefix: &str, supplier_type: &str) -> Result<bool>;
}

/// Locale-independent 64-bit digest of a prefix.
///
/// The first eight bytes of SHA-256, little endian. Identical strings hash
/// identically across processes and platforms; collisions only blur
/// RPM/limit counts.
pub fn invariant_hash(value: &str) -> i64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(bytes)
}

fn check_args(prefix: &str, supplier_type: &str) -> Result<()> {
    if prefix.trim().is_empty() {
        return Err(SmartCacheError::InvalidInput(
            "history prefix must not be empty".into(),
        ));
    }
    if supplier_type.trim().is_empty() {
        return Err(SmartCacheError::InvalidInput(
            "supplier type must not be empty".into(),
        ));
    }
    Ok(())
}

fn rpm_from_count(count: usize, rpm_duration_minutes: i64) -> Result<f64> {
    if rpm_duration_minutes <= 0 {
        return Err(SmartCacheError::Configuration(format!(
            "rpm duration must be positive, got {rpm_duration_minutes}"
        )));
    }
    Ok(count as f64 / rpm_duration_minutes as f64)
}
