//! Per-supplier settings resolution.
//!
//! Both services resolve a supplier type to its settings rows, falling back
//! to a clone of the global row (`supplier_type == None`) stamped with the
//! requested supplier type. The clone lives only in the cache; nothing is
//! written back to the store.
//!
//! Resolved values are cached under `<Table>_BySupplierType-<supplier>` for
//! [`DEFAULT_SETTINGS_CACHE_MINUTES`]. Cold-cache store reads run under an
//! [`AsyncLock`] to keep concurrent misses from all hitting the store.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{self, CacheBackend};
use crate::lock::AsyncLock;
use crate::store::{CacheSetting, Entity, GenericStore, LimitSetting};
use crate::{Result, SmartCacheError};

/// How long resolved settings stay cached (one day).
pub const DEFAULT_SETTINGS_CACHE_MINUTES: u32 = 1440;

/// Cache key for a table's rows resolved for `supplier_type`.
pub fn settings_cache_key<T: Entity>(supplier_type: &str) -> String {
    format!("{}_BySupplierType-{supplier_type}", T::TABLE)
}

fn check_supplier_type(supplier_type: &str) -> Result<()> {
    if supplier_type.trim().is_empty() {
        return Err(SmartCacheError::InvalidInput(
            "supplier type must not be empty".into(),
        ));
    }
    Ok(())
}

/// Resolves [`CacheSetting`] per supplier type.
pub struct CacheSettingService {
    store: Arc<dyn GenericStore<CacheSetting>>,
    cache: Arc<dyn CacheBackend>,
    lock: AsyncLock,
    cache_minutes: u32,
}

impl CacheSettingService {
    pub fn new(
        store: Arc<dyn GenericStore<CacheSetting>>,
        cache: Arc<dyn CacheBackend>,
        lock: AsyncLock,
    ) -> Self {
        Self {
            store,
            cache,
            lock,
            cache_minutes: DEFAULT_SETTINGS_CACHE_MINUTES,
        }
    }

    /// Override how long resolved settings stay cached.
    pub fn cache_minutes(mut self, minutes: u32) -> Self {
        self.cache_minutes = minutes;
        self
    }

    /// Settings for `supplier_type`, or the global row cloned for it.
    ///
    /// Fails with [`SmartCacheError::Configuration`] when neither a
    /// supplier row nor a global row exists, or when either is duplicated.
    pub async fn get(&self, supplier_type: &str) -> Result<CacheSetting> {
        check_supplier_type(supplier_type)?;
        let key = settings_cache_key::<CacheSetting>(supplier_type);

        let setting = cache::get_or_populate_typed(
            self.cache.as_ref(),
            &key,
            self.cache_minutes,
            || self.load(supplier_type),
        )
        .await?;

        debug!(
            supplier_type,
            setting_id = setting.id,
            min_cache_minutes = setting.min_cache_minutes,
            max_cache_minutes = setting.max_cache_minutes,
            rpm_duration_minutes = setting.rpm_duration_minutes,
            "cache setting resolved"
        );
        Ok(setting)
    }

    async fn load(&self, supplier_type: &str) -> Result<CacheSetting> {
        let _guard = self.lock.lock().await;
        let rows = self.store.query().await?;

        if let Some(setting) = single(&rows, |r| r.supplier_type.as_deref() == Some(supplier_type))? {
            return Ok(setting.clone());
        }

        let global = single(&rows, |r| r.supplier_type.is_none())?.ok_or_else(|| {
            SmartCacheError::Configuration("no global cache setting".into())
        })?;
        Ok(global.clone().with_supplier_type(supplier_type))
    }
}

/// Resolves the enabled [`LimitSetting`] rules per supplier type.
pub struct LimitSettingService {
    store: Arc<dyn GenericStore<LimitSetting>>,
    cache: Arc<dyn CacheBackend>,
    lock: AsyncLock,
    cache_minutes: u32,
}

impl LimitSettingService {
    pub fn new(
        store: Arc<dyn GenericStore<LimitSetting>>,
        cache: Arc<dyn CacheBackend>,
        lock: AsyncLock,
    ) -> Self {
        Self {
            store,
            cache,
            lock,
            cache_minutes: DEFAULT_SETTINGS_CACHE_MINUTES,
        }
    }

    /// Override how long resolved settings stay cached.
    pub fn cache_minutes(mut self, minutes: u32) -> Self {
        self.cache_minutes = minutes;
        self
    }

    /// Enabled rules for `supplier_type`.
    ///
    /// When the supplier has none, the enabled global rule (if any) is
    /// cloned for it. An empty list means no limit applies.
    pub async fn get(&self, supplier_type: &str) -> Result<Vec<LimitSetting>> {
        check_supplier_type(supplier_type)?;
        let key = settings_cache_key::<LimitSetting>(supplier_type);

        let rules: Vec<LimitSetting> = cache::get_or_populate_typed(
            self.cache.as_ref(),
            &key,
            self.cache_minutes,
            || self.load(supplier_type),
        )
        .await?;

        debug!(supplier_type, rules = rules.len(), "limit settings resolved");
        Ok(rules)
    }

    async fn load(&self, supplier_type: &str) -> Result<Vec<LimitSetting>> {
        let _guard = self.lock.lock().await;
        let rows = self.store.query().await?;

        let rules: Vec<LimitSetting> = rows
            .iter()
            .filter(|r| r.enabled && r.supplier_type.as_deref() == Some(supplier_type))
            .cloned()
            .collect();
        if !rules.is_empty() {
            return Ok(rules);
        }

        let global = single(&rows, |r| r.enabled && r.supplier_type.is_none())?;
        Ok(global
            .map(|rule| rule.clone().with_supplier_type(supplier_type))
            .into_iter()
            .collect())
    }
}

/// The only row matching `predicate`, if any; more than one is a
/// configuration error.
fn single<'a, T: Entity>(rows: &'a [T], predicate: impl Fn(&T) -> bool) -> Result<Option<&'a T>> {
    let mut matches = rows.iter().filter(|r| predicate(r));
    let first = matches.next();
    if matches.next().is_some() {
        return Err(SmartCacheError::Configuration(format!(
            "more than one matching {} row",
            T::TABLE
        )));
    }
    Ok(first)
}
