//! Time and reliability unit constants.

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Seconds in one week, used to label report buckets.
pub const SECONDS_PER_WEEK: u64 = 7 * 24 * 3600;

/// Device-hours represented by one FIT (failures in time).
pub const FIT_DEVICE_HOURS: f64 = 1.0e9;
