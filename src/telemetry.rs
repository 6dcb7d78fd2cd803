//! Telemetry metric name constants.
//!
//! Centralised metric names for smartcache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `smartcache_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `supplier` — supplier type in its string form
//! - `operation` — failing operation (errors only)
//! - `cached` — whether a fetched result was stored: "true" or "false"

/// Total searches processed by the orchestrator.
///
/// Labels: `supplier`.
pub const SEARCHES_TOTAL: &str = "smartcache_searches_total";

/// Total searches served from an existing cache entry.
///
/// Labels: `supplier`.
pub const CACHE_HITS_TOTAL: &str = "smartcache_cache_hits_total";

/// Total searches that found no usable cache entry.
///
/// Labels: `supplier`.
pub const CACHE_MISSES_TOTAL: &str = "smartcache_cache_misses_total";

/// Total upstream fetches performed.
///
/// Labels: `supplier`, `cached` ("true" | "false").
pub const FETCHES_TOTAL: &str = "smartcache_fetches_total";

/// Total searches answered from cache because the outgoing limit was reached.
///
/// Labels: `supplier`.
pub const LIMITATION_REACHED_TOTAL: &str = "smartcache_limitation_reached_total";

/// Total times an existing entry's expiration was shortened.
///
/// Labels: `supplier`.
pub const EXPIRATION_SHORTENED_TOTAL: &str = "smartcache_expiration_shortened_total";

/// Total errors logged.
///
/// Labels: `operation`.
pub const ERRORS_TOTAL: &str = "smartcache_errors_total";
