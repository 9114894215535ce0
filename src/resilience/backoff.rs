//! Exponential backoff with jitter.
//!
//! Pure arithmetic shared by retry delays and attempt timeouts. The RNG is
//! always supplied by the caller so tests can seed it.

use std::time::Duration;
use rand::Rng;

/// `min(base * factor^step, cap)` without jitter.
pub fn exponential(step: u32, base: Duration, factor: f64, cap: Duration) -> Duration {
    let exponent = i32::try_from(step).unwrap_or(i32::MAX);
    let scaled = base.as_secs_f64() * factor.powi(exponent);

    // powi overflows to +inf for large steps; min() folds that into the cap
    let capped = scaled.min(cap.as_secs_f64());
    if capped.is_finite() && capped > 0.0 {
        Duration::from_secs_f64(capped)
    } else {
        Duration::ZERO
    }
}

/// Sample uniformly from `[delay * (1 - fraction), delay * (1 + fraction)]`.
pub fn apply_jitter<R: Rng + ?Sized>(delay: Duration, fraction: f64, rng: &mut R) -> Duration {
    if delay.is_zero() || fraction <= 0.0 {
        return delay;
    }

    let fraction = fraction.min(1.0);
    let secs = delay.as_secs_f64();
    let low = secs * (1.0 - fraction);
    let high = secs * (1.0 + fraction);

    Duration::from_secs_f64(rng.gen_range(low..=high))
}
