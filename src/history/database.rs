//! Store-backed history tracker.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::{SearchHistory, check_args, invariant_hash, rpm_from_count};
use crate::{Result, SmartCacheError};
use crate::clock::Clock;
use crate::lock::AsyncLock;
use crate::settings::{CacheSettingService, LimitSettingService};
use crate::store::{GenericStore, IncomingRequest, OutgoingRequest};

/// Tracks history as rows in an append-only log.
///
/// Rows carry `hash_code = invariant_hash(prefix)` so every search sharing a
/// bucket lands in the same count. Rows are never updated or deleted here;
/// counts only consider rows inside the window. Every write and range count
/// runs under the [`AsyncLock`].
pub struct DatabaseSearchHistory {
    incoming: Arc<dyn GenericStore<IncomingRequest>>,
    outgoing: Arc<dyn GenericStore<OutgoingRequest>>,
    cache_settings: Arc<CacheSettingService>,
    limit_settings: Arc<LimitSettingService>,
    clock: Arc<dyn Clock>,
    lock: AsyncLock,
}

impl DatabaseSearchHistory {
    pub fn new(
        incoming: Arc<dyn GenericStore<IncomingRequest>>,
        outgoing: Arc<dyn GenericStore<OutgoingRequest>>,
        cache_settings: Arc<CacheSettingService>,
        limit_settings: Arc<LimitSettingService>,
        clock: Arc<dyn Clock>,
        lock: AsyncLock,
    ) -> Self {
        Self {
            incoming,
            outgoing,
            cache_settings,
            limit_settings,
            clock,
            lock,
        }
    }
}

/// Start of a counting window of length `window` ending at `now`.
fn window_start(now: DateTime<Utc>, window: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window).ok_or_else(|| {
        SmartCacheError::Configuration(format!(
            "window of {window} reaches before the earliest date"
        ))
    })
}

#[async_trait]
impl SearchHistory for DatabaseSearchHistory {
    async fn add_incoming(&self, prefix: &str, supplier_type: &str) -> Result<()> {
        check_args(prefix, supplier_type)?;
        let row = IncomingRequest {
            id: 0,
            created_at: self.clock.now(),
            supplier_type: supplier_type.to_string(),
            key_prefix: prefix.to_string(),
            hash_code: invariant_hash(prefix),
        };

        let _guard = self.lock.lock().await;
        self.incoming.add(row).await?;
        Ok(())
    }

    async fn add_outgoing(&self, prefix: &str, supplier_type: &str) -> Result<()> {
        check_args(prefix, supplier_type)?;
        let row = OutgoingRequest {
            id: 0,
            created_at: self.clock.now(),
            supplier_type: supplier_type.to_string(),
            key_prefix: prefix.to_string(),
            hash_code: invariant_hash(prefix),
        };

        let _guard = self.lock.lock().await;
        self.outgoing.add(row).await?;
        Ok(())
    }

    async fn rpm(&self, prefix: &str, supplier_type: &str) -> Result<f64> {
        check_args(prefix, supplier_type)?;
        let setting = self.cache_settings.get(supplier_type).await?;

        let hash_code = invariant_hash(prefix);
        let window = TimeDelta::try_minutes(setting.rpm_duration_minutes).ok_or_else(|| {
            SmartCacheError::Configuration(format!(
                "rpm_duration_minutes {} is out of range",
                setting.rpm_duration_minutes
            ))
        })?;
        let since = window_start(self.clock.now(), window)?;
        let count = {
            let _guard = self.lock.lock().await;
            self.incoming
                .count_where(&|r: &IncomingRequest| r.hash_code == hash_code && r.created_at >= since)
                .await?
        };
        let rpm = rpm_from_count(count, setting.rpm_duration_minutes)?;

        debug!(prefix, hash_code, count, rpm, "current rpm");
        Ok(rpm)
    }

    async fn is_limitation_reached(&self, prefix: &str, supplier_type: &str) -> Result<bool> {
        check_args(prefix, supplier_type)?;
        let rules = self.limit_settings.get(supplier_type).await?;

        let hash_code = invariant_hash(prefix);
        for rule in &rules {
            let since = window_start(self.clock.now(), rule.limit_duration()?)?;
            let count = {
                let _guard = self.lock.lock().await;
                self.outgoing
                    .count_where(&|r: &OutgoingRequest| {
                        r.hash_code == hash_code && r.created_at >= since
                    })
                    .await?
            };
            if count as i64 >= rule.request_limit {
                debug!(
                    prefix,
                    hash_code,
                    count,
                    rule_id = rule.id,
                    request_limit = rule.request_limit,
                    "outgoing limitation reached"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}
