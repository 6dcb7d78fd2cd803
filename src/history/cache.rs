//! Cache-backed history tracker.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{SearchHistory, check_args, rpm_from_count};
use crate::Result;
use crate::cache::{CacheBackend, ttl_minutes};
use crate::settings::{CacheSettingService, LimitSettingService};

/// Tracks history as marker entries in the cache.
///
/// Each event is a uniquely named entry whose only meaning is its
/// existence; it expires after the window it counts towards. Incoming
/// markers are `<prefix>-<id>`; outgoing markers are
/// `<prefix><rule id>_<id>`, one per applicable limit rule, each living for
/// that rule's window.
pub struct CacheSearchHistory {
    cache: Arc<dyn CacheBackend>,
    cache_settings: Arc<CacheSettingService>,
    limit_settings: Arc<LimitSettingService>,
}

impl CacheSearchHistory {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        cache_settings: Arc<CacheSettingService>,
        limit_settings: Arc<LimitSettingService>,
    ) -> Self {
        Self {
            cache,
            cache_settings,
            limit_settings,
        }
    }
}

fn marker_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn incoming_marker_prefix(prefix: &str) -> String {
    format!("{prefix}-")
}

fn outgoing_marker_prefix(prefix: &str, rule_id: i64) -> String {
    format!("{prefix}{rule_id}_")
}

#[async_trait]
impl SearchHistory for CacheSearchHistory {
    async fn add_incoming(&self, prefix: &str, supplier_type: &str) -> Result<()> {
        check_args(prefix, supplier_type)?;
        let setting = self.cache_settings.get(supplier_type).await?;

        let key = format!("{}{}", incoming_marker_prefix(prefix), marker_id());
        self.cache
            .set(&key, Value::Null, ttl_minutes(setting.rpm_duration_minutes))
            .await
    }

    async fn add_outgoing(&self, prefix: &str, supplier_type: &str) -> Result<()> {
        check_args(prefix, supplier_type)?;
        let rules = self.limit_settings.get(supplier_type).await?;

        for rule in &rules {
            let key = format!("{}{}", outgoing_marker_prefix(prefix, rule.id), marker_id());
            let minutes = rule.limit_duration()?.num_minutes();
            self.cache
                .set(&key, Value::Null, ttl_minutes(minutes))
                .await?;
        }
        Ok(())
    }

    async fn rpm(&self, prefix: &str, supplier_type: &str) -> Result<f64> {
        check_args(prefix, supplier_type)?;
        let setting = self.cache_settings.get(supplier_type).await?;

        let count = self
            .cache
            .count_by_prefix(&incoming_marker_prefix(prefix))
            .await?;
        let rpm = rpm_from_count(count, setting.rpm_duration_minutes)?;

        debug!(prefix, count, rpm, "current rpm");
        Ok(rpm)
    }

    async fn is_limitation_reached(&self, prefix: &str, supplier_type: &str) -> Result<bool> {
        check_args(prefix, supplier_type)?;
        let rules = self.limit_settings.get(supplier_type).await?;

        for rule in &rules {
            let count = self
                .cache
                .count_by_prefix(&outgoing_marker_prefix(prefix, rule.id))
                .await?;
            if count as i64 >= rule.request_limit {
                debug!(
                    prefix,
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
