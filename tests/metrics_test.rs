//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tokio_util::sync::CancellationToken;

use smartcache::{
    LimitSetting, ManualClock, MemoryStore, SearchModel, SmartCache, SmartCacheError,
    SmartCacheManager, telemetry,
};

// ============================================================================
// Fixtures
// ============================================================================

struct TrainSearch {
    route: &'static str,
    date: DateTime<Utc>,
}

impl SearchModel for TrainSearch {
    fn result_key(&self) -> String {
        format!("{}-{}", self.route, self.date.timestamp())
    }

    fn history_key(&self) -> String {
        self.route.to_string()
    }

    fn search_date(&self) -> DateTime<Utc> {
        self.date
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

fn train(route: &'static str) -> TrainSearch {
    TrainSearch {
        route,
        date: start() + chrono::Duration::hours(100),
    }
}

fn manager(limit: Option<i64>) -> SmartCacheManager<TrainSearch> {
    let mut builder = SmartCache::builder().clock(Arc::new(ManualClock::new(start())));
    if let Some(limit) = limit {
        builder = builder.limit_settings_store(Arc::new(MemoryStore::with_rows([
            LimitSetting::new(limit, 1),
        ])));
    }
    builder.build::<TrainSearch>().unwrap()
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` whose label `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Runs `work` inside a local recorder scope and returns the snapshot.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the async work.
fn record<F>(work: F) -> SnapshotVec
where
    F: std::future::Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(work))
    });
    snapshotter.snapshot().into_vec()
}

async fn search(
    manager: &SmartCacheManager<TrainSearch>,
    model: &TrainSearch,
    calls: &Arc<AtomicUsize>,
) -> smartcache::Result<Option<String>> {
    let calls = calls.clone();
    manager
        .search_from_cache(
            model,
            "rail",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("timetable".to_string())
            },
            &CancellationToken::new(),
        )
        .await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn hits_and_misses_are_counted() {
    let manager = manager(None);
    let calls = Arc::new(AtomicUsize::new(0));
    let model = train("PAR-LYS");

    let snapshot = record(async {
        for _ in 0..3 {
            search(&manager, &model, &calls).await.unwrap();
        }
    });

    assert_eq!(counter_total(&snapshot, telemetry::SEARCHES_TOTAL), 3);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "cached", "true"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::SEARCHES_TOTAL, "supplier", "rail"),
        3
    );
    // rpm rises on the 2nd and 3rd search
    assert_eq!(
        counter_total(&snapshot, telemetry::EXPIRATION_SHORTENED_TOTAL),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn limitation_is_counted() {
    let manager = manager(Some(1));
    let calls = Arc::new(AtomicUsize::new(0));

    let snapshot = record(async {
        search(&manager, &train("PAR-LYS"), &calls).await.unwrap();
        let blocked = search(&manager, &train("PAR-NCE"), &calls).await.unwrap();
        assert_eq!(blocked, None);
    });

    assert_eq!(counter_total(&snapshot, telemetry::LIMITATION_REACHED_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::FETCHES_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failures_are_counted_once() {
    let manager = manager(None);
    let model = train("PAR-LYS");

    let snapshot = record(async {
        let err = manager
            .search_from_cache(
                &model,
                "rail",
                || async { Err::<String, _>(SmartCacheError::fetch("timeout")) },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_logged());
    });

    assert_eq!(counter_total(&snapshot, telemetry::ERRORS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::ERRORS_TOTAL, "operation", "fetch"),
        1
    );
}
