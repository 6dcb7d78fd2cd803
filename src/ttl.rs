//! Adaptive TTL formulas.
//!
//! Cache minutes are computed in two steps, always in this order:
//!
//! 1. [`minutes_by_date`] maps the distance to the searched date onto
//!    `[min_cache_minutes, max_cache_minutes]`, or to `0` ("do not cache")
//!    for searches beyond `over_search_diff_hours`.
//! 2. [`minutes_by_rpm`] scales that result down as demand rises, reaching
//!    `min_cache_minutes` at `recent_search_maximum_rpm`.
//!
//! Both interpolations go through the line defined by two points and round
//! half to even.

use chrono::{DateTime, Utc};

use crate::store::CacheSetting;
use crate::{Result, SmartCacheError};

/// Line through `(x1, y1)` and `(x2, y2)`, evaluated at `x`.
fn interpolate(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> Result<f64> {
    let x_diff = x2 - x1;
    if x_diff == 0.0 {
        return Err(SmartCacheError::Configuration(format!(
            "cannot interpolate between identical points x = {x1}"
        )));
    }
    let slope = (y2 - y1) / x_diff;
    let intercept = y1 - slope * x1;
    Ok(slope * x + intercept)
}

fn round_to_minutes(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Cache minutes for a search `search_date`, seen at `now`.
///
/// Returns `0` for searches too far ahead to cache. Fails with
/// [`SmartCacheError::InvalidInput`] when `search_date` is in the past.
pub fn minutes_by_date(
    search_date: DateTime<Utc>,
    now: DateTime<Utc>,
    setting: &CacheSetting,
) -> Result<i64> {
    if search_date < now {
        return Err(SmartCacheError::InvalidInput(format!(
            "search date {search_date} is in the past"
        )));
    }
    let diff_hours = (search_date - now).num_milliseconds() as f64 / 3_600_000.0;

    if diff_hours <= setting.min_search_diff_hours as f64 {
        return Ok(setting.min_cache_minutes);
    }
    if diff_hours > setting.over_search_diff_hours as f64 {
        return Ok(0);
    }
    if diff_hours >= setting.max_search_diff_hours as f64 {
        return Ok(setting.max_cache_minutes);
    }

    let minutes = interpolate(
        setting.min_search_diff_hours as f64,
        setting.min_cache_minutes as f64,
        setting.max_search_diff_hours as f64,
        setting.max_cache_minutes as f64,
        diff_hours,
    )?;
    Ok(round_to_minutes(minutes))
}

/// Scale `base_minutes` by the current request rate.
///
/// `0` stays `0`: a search disqualified by date is never cached because of
/// demand. The result is clamped to `[min_cache_minutes, max_cache_minutes]`
/// except that a computed value of exactly `0` is kept.
pub fn minutes_by_rpm(base_minutes: i64, current_rpm: f64, setting: &CacheSetting) -> Result<i64> {
    if base_minutes == 0 {
        return Ok(0);
    }

    let minutes = interpolate(
        setting.recent_search_minimum_rpm as f64,
        base_minutes as f64,
        setting.recent_search_maximum_rpm as f64,
        setting.min_cache_minutes as f64,
        current_rpm,
    )?;

    Ok(match round_to_minutes(minutes) {
        0 => 0,
        m if m > setting.max_cache_minutes => setting.max_cache_minutes,
        m if m < setting.min_cache_minutes => setting.min_cache_minutes,
        m => m,
    })
}

/// Final cache minutes: by date first, then scaled by rpm.
pub fn cache_minutes(
    search_date: DateTime<Utc>,
    now: DateTime<Utc>,
    current_rpm: f64,
    setting: &CacheSetting,
) -> Result<i64> {
    let by_date = minutes_by_date(search_date, now, setting)?;
    minutes_by_rpm(by_date, current_rpm, setting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setting() -> CacheSetting {
        CacheSetting::global_default()
    }

    fn at(hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now + Duration::hours(hours), now)
    }

    #[test]
    fn interpolate_through_two_points() {
        assert_eq!(interpolate(0.0, 0.0, 10.0, 100.0, 5.0).unwrap(), 50.0);
        assert_eq!(interpolate(1.0, 10.0, 3.0, 6.0, 2.0).unwrap(), 8.0);
    }

    #[test]
    fn interpolate_rejects_vertical_line() {
        assert!(interpolate(2.0, 0.0, 2.0, 5.0, 2.0).is_err());
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_to_minutes(2.5), 2);
        assert_eq!(round_to_minutes(3.5), 4);
        assert_eq!(round_to_minutes(161.695), 162);
    }

    #[test]
    fn date_at_min_boundary_is_floor() {
        let (date, now) = at(24);
        assert_eq!(minutes_by_date(date, now, &setting()).unwrap(), 5);
    }

    #[test]
    fn date_just_above_over_boundary_is_zero() {
        let now = Utc::now();
        let date = now + Duration::hours(2160) + Duration::minutes(1);
        assert_eq!(minutes_by_date(date, now, &setting()).unwrap(), 0);
    }

    #[test]
    fn date_at_over_boundary_is_ceiling() {
        let (date, now) = at(2160);
        assert_eq!(minutes_by_date(date, now, &setting()).unwrap(), 1440);
    }

    #[test]
    fn date_now_is_floor() {
        let now = Utc::now();
        assert_eq!(minutes_by_date(now, now, &setting()).unwrap(), 5);
    }

    #[test]
    fn date_sub_millisecond_in_past_is_rejected() {
        let now = Utc::now();
        let search_date = now - Duration::microseconds(500);
        assert!(matches!(
            minutes_by_date(search_date, now, &setting()),
            Err(SmartCacheError::InvalidInput(_))
        ));
    }

    #[test]
    fn rpm_at_minimum_keeps_base() {
        assert_eq!(minutes_by_rpm(300, 1.0, &setting()).unwrap(), 300);
    }

    #[test]
    fn rpm_at_maximum_is_floor() {
        assert_eq!(minutes_by_rpm(300, 20.0, &setting()).unwrap(), 5);
    }

    #[test]
    fn rpm_beyond_maximum_clamps_to_floor() {
        assert_eq!(minutes_by_rpm(300, 500.0, &setting()).unwrap(), 5);
    }

    #[test]
    fn rpm_below_minimum_clamps_to_ceiling() {
        // base at the ceiling: lower demand extrapolates above it
        assert_eq!(minutes_by_rpm(1440, 0.0, &setting()).unwrap(), 1440);
    }

    #[test]
    fn rpm_equal_bounds_is_configuration_error() {
        let mut s = setting();
        s.recent_search_maximum_rpm = s.recent_search_minimum_rpm;
        assert!(matches!(
            minutes_by_rpm(100, 3.0, &s),
            Err(SmartCacheError::Configuration(_))
        ));
    }
}
