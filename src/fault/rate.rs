//! FIT Rate Conversion.
//!
//! Fault arrivals are a Poisson process. A FIT rate becomes either a
//! per-interval occurrence probability (interval engine) or a mean time
//! between faults (event engine).

use crate::common::{FIT_DEVICE_HOURS, SECONDS_PER_HOUR};

/// Converts a FIT rate into the probability of at least one fault in
/// `interval_s` seconds: `1 - exp(-FIT * scale * hours / 1e9)`.
///
/// The result is clamped into `[0, 1]`; negative or NaN inputs yield 0.
pub fn fit_to_probability(fit: f64, fit_scale: f64, interval_s: u64) -> f64 {
    let hours = interval_s as f64 / SECONDS_PER_HOUR;
    let lambda_t = fit * fit_scale * hours / FIT_DEVICE_HOURS;
    let p = 1.0 - (-lambda_t).exp();
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    debug_assert!((0.0..=1.0).contains(&p));
    p
}

/// Mean hours between faults for a FIT rate, or `None` when the scaled
/// rate is zero and the fault never occurs.
pub fn mean_hours_between_faults(fit: f64, fit_scale: f64) -> Option<f64> {
    let rate = fit * fit_scale;
    if rate > 0.0 && rate.is_finite() {
        Some(FIT_DEVICE_HOURS / rate)
    } else {
        None
    }
}
