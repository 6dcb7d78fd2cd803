//! Adaptive cache orchestrator.
//!
//! [`SmartCacheManager::search_from_cache`] is the single entry point a
//! search domain calls. Per call it:
//!
//! 1. rejects a search date in the past before recording anything,
//! 2. records the search in the request history,
//! 3. computes cache minutes from the search date and the bucket's RPM,
//! 4. shortens the expiration of an existing entry when the new TTL is
//!    smaller (TTLs only ever move down),
//! 5. serves whatever is cached, without fetching, once the supplier's
//!    outgoing limit is reached,
//! 6. otherwise fetches: directly when the TTL is `0`, else through the
//!    cache's get-or-populate so concurrent misses share one fetch.

mod builder;

pub use builder::{SmartCache, SmartCacheBuilder};

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::cache::{self, CacheBackend, ttl_minutes};
use crate::clock::Clock;
use crate::history::SearchHistory;
use crate::settings::CacheSettingService;
use crate::telemetry;
use crate::traits::SearchModel;
use crate::ttl;
use crate::{Result, SmartCacheError};

const SEARCH_RESULT_KEY: &str = "SmartCacheManager_SearchResult";
const INCOMING_KEY: &str = "SmartCacheManager_Incoming";
const OUTGOING_KEY: &str = "SmartCacheManager_Outgoing";

/// Keys derived for one search.
///
/// All three are namespaced by the manager's namespace and supplier type,
/// so different search domains and suppliers can share one cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKeys {
    /// Where the search's result is cached.
    pub result: String,
    /// History bucket counted for RPM.
    pub incoming: String,
    /// Supplier-wide pattern counted for the outgoing limit.
    pub outgoing: String,
}

/// Cache-or-fetch orchestrator for one search domain.
///
/// Cheap to clone; clones share the cache, settings and history.
pub struct SmartCacheManager<S> {
    cache: Arc<dyn CacheBackend>,
    settings: Arc<CacheSettingService>,
    history: Arc<dyn SearchHistory>,
    clock: Arc<dyn Clock>,
    namespace: String,
    _model: PhantomData<fn(&S)>,
}

impl<S> Clone for SmartCacheManager<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            settings: Arc::clone(&self.settings),
            history: Arc::clone(&self.history),
            clock: Arc::clone(&self.clock),
            namespace: self.namespace.clone(),
            _model: PhantomData,
        }
    }
}

impl<S> fmt::Debug for SmartCacheManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartCacheManager")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn supplier_string(supplier_type: impl fmt::Display) -> Result<String> {
    let supplier = supplier_type.to_string();
    if supplier.trim().is_empty() {
        return Err(SmartCacheError::InvalidInput(
            "supplier type must not be empty".into(),
        ));
    }
    Ok(supplier)
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(SmartCacheError::Cancelled);
    }
    match cancel.run_until_cancelled(work).await {
        Some(result) => result,
        None => {
            debug!("operation cancelled");
            Err(SmartCacheError::Cancelled)
        }
    }
}

impl<S: SearchModel> SmartCacheManager<S> {
    pub(crate) fn new(
        cache: Arc<dyn CacheBackend>,
        settings: Arc<CacheSettingService>,
        history: Arc<dyn SearchHistory>,
        clock: Arc<dyn Clock>,
        namespace: String,
    ) -> Self {
        Self {
            cache,
            settings,
            history,
            clock,
            namespace,
            _model: PhantomData,
        }
    }

    /// Namespace prefixed to every key this manager derives.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive the result, incoming and outgoing keys for a search.
    pub fn search_keys(&self, model: &S, supplier_type: impl fmt::Display) -> Result<SearchKeys> {
        let supplier = supplier_string(supplier_type)?;
        Ok(self.keys(model, &supplier))
    }

    fn keys(&self, model: &S, supplier: &str) -> SearchKeys {
        let ns = &self.namespace;
        SearchKeys {
            result: format!("{SEARCH_RESULT_KEY}_{ns}_{supplier}_{}", model.result_key()),
            incoming: format!("{INCOMING_KEY}_{ns}_{supplier}_{}", model.history_key()),
            outgoing: format!("{OUTGOING_KEY}_{ns}_{supplier}_"),
        }
    }

    /// Return the cached result for a search, or fetch it.
    ///
    /// `fetch` runs at most once per call, and only when the supplier's
    /// outgoing limit has not been reached. Returns `Ok(None)` only when the
    /// limit is reached and nothing is cached for this search.
    #[instrument(skip_all, fields(supplier_type = %supplier_type, operation = "search_from_cache"))]
    pub async fn search_from_cache<T, F, Fut>(
        &self,
        model: &S,
        supplier_type: impl fmt::Display,
        fetch: F,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let supplier = supplier_string(supplier_type).map_err(|e| e.log_once("search_from_cache"))?;
        cancellable(cancel, self.search(model, &supplier, fetch))
            .await
            .map_err(|e| match e {
                SmartCacheError::Cancelled => e,
                e => e.log_once("search_from_cache"),
            })
    }

    async fn search<T, F, Fut>(&self, model: &S, supplier: &str, fetch: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        metrics::counter!(telemetry::SEARCHES_TOTAL, "supplier" => supplier.to_string())
            .increment(1);
        let keys = self.keys(model, supplier);

        let search_date = model.search_date();
        if search_date < self.clock.now() {
            return Err(SmartCacheError::InvalidInput(format!(
                "search date {search_date} is in the past"
            ))
            .log_once("validate_search_date"));
        }

        self.history
            .add_incoming(&keys.incoming, supplier)
            .await
            .map_err(|e| e.log_once("add_incoming"))?;

        let (cache_minutes, rpm) = self.compute_cache_minutes(model, supplier, &keys).await?;
        let shortened = self.shorten_expiration(&keys.result, cache_minutes).await?;
        if shortened {
            metrics::counter!(telemetry::EXPIRATION_SHORTENED_TOTAL, "supplier" => supplier.to_string())
                .increment(1);
        }

        let limitation_reached = self
            .history
            .is_limitation_reached(&keys.outgoing, supplier)
            .await
            .map_err(|e| e.log_once("is_limitation_reached"))?;

        if limitation_reached {
            metrics::counter!(telemetry::LIMITATION_REACHED_TOTAL, "supplier" => supplier.to_string())
                .increment(1);
            let cached = cache::get_typed(self.cache.as_ref(), &keys.result)
                .await
                .map_err(|e| e.log_once("get"))?;
            info!(
                cache_key = %keys.result,
                cache_minutes,
                rpm,
                expiration_shortened = shortened,
                limitation_reached,
                fetched = false,
                served = cached.is_some(),
                "search processed"
            );
            return Ok(cached);
        }

        let fetched = AtomicBool::new(false);
        let history = &self.history;
        let outgoing = keys.outgoing.as_str();
        let fetched_flag = &fetched;
        let retrieve = move || async move {
            let data = fetch().await.map_err(|e| e.log_once("fetch"))?;
            history
                .add_outgoing(outgoing, supplier)
                .await
                .map_err(|e| e.log_once("add_outgoing"))?;
            fetched_flag.store(true, Ordering::Release);
            Ok::<T, SmartCacheError>(data)
        };

        let result = if cache_minutes == 0 {
            retrieve().await?
        } else {
            cache::get_or_populate_typed(
                self.cache.as_ref(),
                &keys.result,
                ttl_minutes(cache_minutes),
                retrieve,
            )
            .await
            .map_err(|e| e.log_once("get_or_populate"))?
        };

        let fetched = fetched.load(Ordering::Acquire);
        let cached = if cache_minutes == 0 { "false" } else { "true" };
        if fetched {
            metrics::counter!(telemetry::FETCHES_TOTAL, "supplier" => supplier.to_string(), "cached" => cached)
                .increment(1);
        }
        if cache_minutes > 0 {
            let name = if fetched {
                telemetry::CACHE_MISSES_TOTAL
            } else {
                telemetry::CACHE_HITS_TOTAL
            };
            metrics::counter!(name, "supplier" => supplier.to_string()).increment(1);
        }

        info!(
            cache_key = %keys.result,
            cache_minutes,
            rpm,
            expiration_shortened = shortened,
            limitation_reached,
            fetched,
            served = true,
            "search processed"
        );
        Ok(Some(result))
    }

    /// Cache minutes a search would get right now.
    #[instrument(skip_all, fields(supplier_type = %supplier_type, operation = "calculate_cache_minutes"))]
    pub async fn calculate_cache_minutes(
        &self,
        model: &S,
        supplier_type: impl fmt::Display,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let supplier =
            supplier_string(supplier_type).map_err(|e| e.log_once("calculate_cache_minutes"))?;
        let keys = self.keys(model, &supplier);
        cancellable(cancel, async {
            let (minutes, _) = self.compute_cache_minutes(model, &supplier, &keys).await?;
            Ok(minutes)
        })
        .await
        .map_err(|e| match e {
            SmartCacheError::Cancelled => e,
            e => e.log_once("calculate_cache_minutes"),
        })
    }

    /// Current RPM of the search's history bucket.
    #[instrument(skip_all, fields(supplier_type = %supplier_type, operation = "rpm"))]
    pub async fn rpm(
        &self,
        model: &S,
        supplier_type: impl fmt::Display,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        let supplier = supplier_string(supplier_type).map_err(|e| e.log_once("rpm"))?;
        let keys = self.keys(model, &supplier);
        cancellable(cancel, self.history.rpm(&keys.incoming, &supplier))
            .await
            .map_err(|e| match e {
                SmartCacheError::Cancelled => e,
                e => e.log_once("rpm"),
            })
    }

    /// Remaining lifetime of the search's cached result; zero when absent.
    #[instrument(skip_all, fields(supplier_type = %supplier_type, operation = "expiration"))]
    pub async fn expiration(
        &self,
        model: &S,
        supplier_type: impl fmt::Display,
        cancel: &CancellationToken,
    ) -> Result<Duration> {
        let supplier = supplier_string(supplier_type).map_err(|e| e.log_once("expiration"))?;
        let keys = self.keys(model, &supplier);
        cancellable(cancel, self.cache.get_expiration(&keys.result))
            .await
            .map_err(|e| match e {
                SmartCacheError::Cancelled => e,
                e => e.log_once("expiration"),
            })
    }

    /// Date formula first, then scaled by RPM. Returns `(minutes, rpm)`.
    async fn compute_cache_minutes(
        &self,
        model: &S,
        supplier: &str,
        keys: &SearchKeys,
    ) -> Result<(i64, f64)> {
        let setting = self
            .settings
            .get(supplier)
            .await
            .map_err(|e| e.log_once("cache_setting"))?;
        let rpm = self
            .history
            .rpm(&keys.incoming, supplier)
            .await
            .map_err(|e| e.log_once("rpm"))?;

        let search_date = model.search_date();
        let now = self.clock.now();
        let minutes = ttl::cache_minutes(search_date, now, rpm, &setting)
            .map_err(|e| e.log_once("cache_minutes"))?;

        debug!(%search_date, %now, rpm, minutes, "cache minutes computed");
        Ok((minutes, rpm))
    }

    /// Shorten the entry at `key` to `cache_minutes` if it would outlive it.
    async fn shorten_expiration(&self, key: &str, cache_minutes: i64) -> Result<bool> {
        let remaining = self
            .cache
            .get_expiration(key)
            .await
            .map_err(|e| e.log_once("get_expiration"))?;
        let remaining_minutes = remaining.as_secs_f64() / 60.0;

        if cache_minutes > 0 && (cache_minutes as f64) < remaining_minutes {
            self.cache
                .set_expiration(key, ttl_minutes(cache_minutes))
                .await
                .map_err(|e| e.log_once("set_expiration"))?;
            debug!(key, remaining_minutes, cache_minutes, "expiration shortened");
            return Ok(true);
        }
        Ok(false)
    }
}
