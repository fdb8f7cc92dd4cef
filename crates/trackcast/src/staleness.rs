//! Weather freshness policy.
//!
//! The clock is always passed in; nothing here reads the system time.

/// Milliseconds in one hour.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Default maximum observation age before a refetch.
pub const DEFAULT_MAX_AGE_HOURS: u32 = 1;

/// Decide whether weather for a location must be refetched.
///
/// A location with no observation is always stale. Otherwise it is stale only
/// when its age is strictly greater than `max_age_hours`; an observation
/// exactly at the threshold is still fresh.
#[must_use]
pub fn is_stale(last_observed_at_millis: Option<i64>, now_millis: i64, max_age_hours: u32) -> bool {
    let Some(last) = last_observed_at_millis else {
        return true;
    };

    let max_age = i64::from(max_age_hours).saturating_mul(MILLIS_PER_HOUR);
    now_millis.saturating_sub(last) > max_age
}
