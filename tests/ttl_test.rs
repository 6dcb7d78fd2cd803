//! Tests for the adaptive TTL formulas.

use chrono::{DateTime, Duration, TimeZone, Utc};

use smartcache::ttl::{cache_minutes, minutes_by_date, minutes_by_rpm};
use smartcache::{CacheSetting, SmartCacheError};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

fn setting() -> CacheSetting {
    CacheSetting::global_default()
}

fn by_date(hours: i64) -> i64 {
    minutes_by_date(now() + Duration::hours(hours), now(), &setting()).unwrap()
}

// ============================================================================
// By date
// ============================================================================

#[test]
fn near_search_gets_floor() {
    assert_eq!(by_date(3), 5);
    assert_eq!(by_date(24), 5);
}

#[test]
fn far_search_is_not_cached() {
    assert_eq!(by_date(1000 * 24), 0);
    assert_eq!(by_date(2161), 0);
}

#[test]
fn mid_range_interpolates() {
    // 5 + (1440 - 5) / (720 - 24) * (100 - 24) = 161.695...
    assert_eq!(by_date(100), 162);
}

#[test]
fn between_max_and_over_gets_ceiling() {
    assert_eq!(by_date(720), 1440);
    assert_eq!(by_date(1500), 1440);
    assert_eq!(by_date(2160), 1440);
}

#[test]
fn past_date_is_invalid_input() {
    let err = minutes_by_date(now() - Duration::minutes(1), now(), &setting()).unwrap_err();
    assert!(matches!(err, SmartCacheError::InvalidInput(_)));
}

#[test]
fn by_date_is_non_decreasing_until_cutoff() {
    let mut previous = 0;
    for hours in 0..=2160 {
        let minutes = by_date(hours);
        assert!(
            minutes >= previous,
            "{hours}h gave {minutes}, below {previous}"
        );
        previous = minutes;
    }
}

#[test]
fn by_date_stays_within_bounds() {
    let s = setting();
    for hours in (0..=2160).step_by(7) {
        let minutes = by_date(hours);
        assert!((s.min_cache_minutes..=s.max_cache_minutes).contains(&minutes));
    }
}

// ============================================================================
// By rpm
// ============================================================================

#[test]
fn zero_base_stays_zero() {
    for rpm in [0.0, 1.0, 7.5, 20.0, 300.0] {
        assert_eq!(minutes_by_rpm(0, rpm, &setting()).unwrap(), 0);
    }
}

#[test]
fn idle_bucket_keeps_date_ttl() {
    assert_eq!(minutes_by_rpm(162, 1.0, &setting()).unwrap(), 162);
}

#[test]
fn low_demand_extends_slightly() {
    // (1, 162) -> (20, 5) evaluated at 0.5
    assert_eq!(minutes_by_rpm(162, 0.5, &setting()).unwrap(), 166);
}

#[test]
fn rising_demand_shrinks_ttl() {
    assert_eq!(minutes_by_rpm(162, 1.5, &setting()).unwrap(), 158);
}

#[test]
fn by_rpm_is_non_increasing_in_rpm() {
    let mut previous = i64::MAX;
    for tenths in 0..=200 {
        let minutes = minutes_by_rpm(900, f64::from(tenths) / 10.0, &setting()).unwrap();
        assert!(minutes <= previous);
        previous = minutes;
    }
}

#[test]
fn by_rpm_is_clamped() {
    let s = setting();
    for base in [5, 60, 162, 900, 1440] {
        for rpm in [0.0, 0.5, 3.0, 19.0, 20.0, 1000.0] {
            let minutes = minutes_by_rpm(base, rpm, &s).unwrap();
            assert!(
                (s.min_cache_minutes..=s.max_cache_minutes).contains(&minutes),
                "base {base} rpm {rpm} gave {minutes}"
            );
        }
    }
}

// ============================================================================
// Combined
// ============================================================================

#[test]
fn date_then_rpm() {
    let date = now() + Duration::hours(100);
    assert_eq!(cache_minutes(date, now(), 1.5, &setting()).unwrap(), 158);
    assert_eq!(cache_minutes(date, now(), 20.0, &setting()).unwrap(), 5);
}

#[test]
fn uncacheable_date_ignores_rpm() {
    let date = now() + Duration::hours(3000);
    assert_eq!(cache_minutes(date, now(), 0.0, &setting()).unwrap(), 0);
}

#[test]
fn custom_bounds_are_honoured() {
    let mut s = setting();
    s.min_cache_minutes = 10;
    s.max_cache_minutes = 100;
    s.min_search_diff_hours = 1;
    s.max_search_diff_hours = 11;
    s.over_search_diff_hours = 20;

    let at = |hours| minutes_by_date(now() + Duration::hours(hours), now(), &s).unwrap();
    assert_eq!(at(1), 10);
    assert_eq!(at(6), 55);
    assert_eq!(at(11), 100);
    assert_eq!(at(21), 0);
}
