//! Builder for configuring manager instances

use std::any::type_name;
use std::sync::Arc;

use super::SmartCacheManager;
use crate::cache::{CacheBackend, CacheConfig, MokaCacheBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, HistoryBackend};
use crate::history::{CacheSearchHistory, DatabaseSearchHistory, SearchHistory};
use crate::lock::AsyncLock;
use crate::settings::{CacheSettingService, DEFAULT_SETTINGS_CACHE_MINUTES, LimitSettingService};
use crate::store::{
    CacheSetting, GenericStore, IncomingRequest, LimitSetting, MemoryStore, OutgoingRequest,
};
use crate::traits::SearchModel;
use crate::{Result, SmartCacheError};

/// Main entry point for creating manager instances.
pub struct SmartCache;

impl SmartCache {
    /// Create a new builder for configuring a manager.
    pub fn builder() -> SmartCacheBuilder {
        SmartCacheBuilder::new()
    }
}

/// Builder for configuring manager instances.
///
/// Every collaborator has an in-process default: a moka cache, a
/// settings store seeded with [`CacheSetting::global_default`], empty limit
/// and request stores, the system clock and the cache-backed history.
pub struct SmartCacheBuilder {
    cache: Option<Arc<dyn CacheBackend>>,
    cache_config: CacheConfig,
    clock: Option<Arc<dyn Clock>>,
    cache_settings_store: Option<Arc<dyn GenericStore<CacheSetting>>>,
    limit_settings_store: Option<Arc<dyn GenericStore<LimitSetting>>>,
    incoming_store: Option<Arc<dyn GenericStore<IncomingRequest>>>,
    outgoing_store: Option<Arc<dyn GenericStore<OutgoingRequest>>>,
    history_backend: HistoryBackend,
    thread_safety: bool,
    settings_cache_minutes: u32,
    namespace: Option<String>,
}

impl SmartCacheBuilder {
    pub fn new() -> Self {
        Self {
            cache: None,
            cache_config: CacheConfig::default(),
            clock: None,
            cache_settings_store: None,
            limit_settings_store: None,
            incoming_store: None,
            outgoing_store: None,
            history_backend: HistoryBackend::default(),
            thread_safety: false,
            settings_cache_minutes: DEFAULT_SETTINGS_CACHE_MINUTES,
            namespace: None,
        }
    }

    /// Apply a loaded [`Config`].
    pub fn config(mut self, config: &Config) -> Self {
        self.cache_config = CacheConfig::new().max_entries(config.cache.max_entries);
        self.history_backend = config.history.backend;
        self.thread_safety = config.history.thread_safety;
        self.settings_cache_minutes = config.settings.cache_minutes;
        self
    }

    /// Use an external cache instead of the in-process moka cache.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sizing for the in-process cache. Ignored when [`cache`](Self::cache) is set.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Time source for TTL computation, logical expiry and history windows.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_settings_store(mut self, store: Arc<dyn GenericStore<CacheSetting>>) -> Self {
        self.cache_settings_store = Some(store);
        self
    }

    pub fn limit_settings_store(mut self, store: Arc<dyn GenericStore<LimitSetting>>) -> Self {
        self.limit_settings_store = Some(store);
        self
    }

    /// Incoming request log for [`HistoryBackend::Database`].
    pub fn incoming_store(mut self, store: Arc<dyn GenericStore<IncomingRequest>>) -> Self {
        self.incoming_store = Some(store);
        self
    }

    /// Outgoing request log for [`HistoryBackend::Database`].
    pub fn outgoing_store(mut self, store: Arc<dyn GenericStore<OutgoingRequest>>) -> Self {
        self.outgoing_store = Some(store);
        self
    }

    pub fn history_backend(mut self, backend: HistoryBackend) -> Self {
        self.history_backend = backend;
        self
    }

    /// Serialize store access with a real lock (default: no-op).
    pub fn thread_safety(mut self, enabled: bool) -> Self {
        self.thread_safety = enabled;
        self
    }

    /// How long resolved settings stay cached (default: 1440).
    pub fn settings_cache_minutes(mut self, minutes: u32) -> Self {
        self.settings_cache_minutes = minutes;
        self
    }

    /// Override the key namespace (default: the search model's type name).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Build a manager for search model `S`.
    pub fn build<S: SearchModel>(self) -> Result<SmartCacheManager<S>> {
        if self.settings_cache_minutes == 0 {
            return Err(SmartCacheError::Configuration(
                "settings cache minutes must be positive".into(),
            ));
        }
        let namespace = match self.namespace {
            Some(ns) if ns.trim().is_empty() => {
                return Err(SmartCacheError::Configuration(
                    "namespace must not be empty".into(),
                ));
            }
            Some(ns) => ns,
            None => type_name::<S>().to_string(),
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache: Arc<dyn CacheBackend> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MokaCacheBackend::with_clock(
                &self.cache_config,
                Arc::clone(&clock),
            )),
        };
        let lock = AsyncLock::new(self.thread_safety);

        // =====================================================================
        // Settings
        // =====================================================================

        let cache_settings_store = self.cache_settings_store.unwrap_or_else(|| {
            Arc::new(MemoryStore::with_rows([CacheSetting::global_default()]))
        });
        let limit_settings_store = self
            .limit_settings_store
            .unwrap_or_else(|| Arc::new(MemoryStore::<LimitSetting>::new()));

        let cache_settings = Arc::new(
            CacheSettingService::new(cache_settings_store, Arc::clone(&cache), lock.clone())
                .cache_minutes(self.settings_cache_minutes),
        );
        let limit_settings = Arc::new(
            LimitSettingService::new(limit_settings_store, Arc::clone(&cache), lock.clone())
                .cache_minutes(self.settings_cache_minutes),
        );

        // =====================================================================
        // History
        // =====================================================================

        let history: Arc<dyn SearchHistory> = match self.history_backend {
            HistoryBackend::Cache => Arc::new(CacheSearchHistory::new(
                Arc::clone(&cache),
                Arc::clone(&cache_settings),
                limit_settings,
            )),
            HistoryBackend::Database => {
                let incoming = self
                    .incoming_store
                    .unwrap_or_else(|| Arc::new(MemoryStore::<IncomingRequest>::new()));
                let outgoing = self
                    .outgoing_store
                    .unwrap_or_else(|| Arc::new(MemoryStore::<OutgoingRequest>::new()));
                Arc::new(DatabaseSearchHistory::new(
                    incoming,
                    outgoing,
                    Arc::clone(&cache_settings),
                    limit_settings,
                    Arc::clone(&clock),
                    lock,
                ))
            }
        };

        Ok(SmartCacheManager::new(
            cache,
            cache_settings,
            history,
            clock,
            namespace,
        ))
    }
}

impl Default for SmartCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
