//! Row models persisted through [`GenericStore`](super::GenericStore).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::{Result, SmartCacheError};

/// Tunable TTL bounds for one supplier type.
///
/// The row with `supplier_type == None` is the global default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSetting {
    pub id: i64,
    pub supplier_type: Option<String>,
    /// Searches at most this many hours away get `min_cache_minutes`.
    pub min_search_diff_hours: i64,
    /// Searches at least this many hours away get `max_cache_minutes`.
    pub max_search_diff_hours: i64,
    /// Searches further away than this are not cached at all.
    pub over_search_diff_hours: i64,
    pub min_cache_minutes: i64,
    pub max_cache_minutes: i64,
    /// RPM at which the date-based TTL is kept as is.
    pub recent_search_minimum_rpm: i64,
    /// RPM at which the TTL drops to `min_cache_minutes`.
    pub recent_search_maximum_rpm: i64,
    /// Length of the RPM measurement window.
    pub rpm_duration_minutes: i64,
}

impl CacheSetting {
    /// The global row seeded into an empty store.
    pub fn global_default() -> Self {
        Self {
            id: 0,
            supplier_type: None,
            min_search_diff_hours: 24,
            max_search_diff_hours: 30 * 24,
            over_search_diff_hours: 90 * 24,
            min_cache_minutes: 5,
            max_cache_minutes: 24 * 60,
            recent_search_minimum_rpm: 1,
            recent_search_maximum_rpm: 20,
            rpm_duration_minutes: 2,
        }
    }

    pub fn with_supplier_type(mut self, supplier_type: impl Into<String>) -> Self {
        self.supplier_type = Some(supplier_type.into());
        self
    }
}

impl Entity for CacheSetting {
    const TABLE: &'static str = "CacheSetting";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Upstream rate-limit rule for one supplier type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSetting {
    pub id: i64,
    pub supplier_type: Option<String>,
    /// Maximum outgoing calls inside the window.
    pub request_limit: i64,
    pub enabled: bool,
    pub limit_duration_hours: i64,
    /// Reserved extension of the window; not consulted by the limiter.
    pub extended_time_hours: i64,
}

impl LimitSetting {
    pub fn new(request_limit: i64, limit_duration_hours: i64) -> Self {
        Self {
            id: 0,
            supplier_type: None,
            request_limit,
            enabled: true,
            limit_duration_hours,
            extended_time_hours: 0,
        }
    }

    pub fn with_supplier_type(mut self, supplier_type: impl Into<String>) -> Self {
        self.supplier_type = Some(supplier_type.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Window this rule counts over.
    ///
    /// Fails with [`SmartCacheError::Configuration`] when the hours do not
    /// fit a [`TimeDelta`].
    pub fn limit_duration(&self) -> Result<TimeDelta> {
        TimeDelta::try_hours(self.limit_duration_hours).ok_or_else(|| {
            SmartCacheError::Configuration(format!(
                "limit setting {}: limit_duration_hours {} is out of range",
                self.id, self.limit_duration_hours
            ))
        })
    }
}

impl Entity for LimitSetting {
    const TABLE: &'static str = "LimitSetting";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// One recorded search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub supplier_type: String,
    pub key_prefix: String,
    pub hash_code: i64,
}

impl Entity for IncomingRequest {
    const TABLE: &'static str = "IncomingRequest";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRequest {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub supplier_type: String,
    pub key_prefix: String,
    pub hash_code: i64,
}

impl Entity for OutgoingRequest {
    const TABLE: &'static str = "OutgoingRequest";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
