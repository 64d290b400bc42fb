//! Backoff delay calculation.
//!
//! Pure functions: no timers, no shared state. The random source is injectable
//! so jittered delays can be checked deterministically.

use std::time::Duration;

use rand::Rng;
use yfsession_types::RetryConfig;

fn as_millis_u64(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Undisturbed exponential delay for `attempt` (0-based): `min(initial * factor^attempt, max)`.
#[must_use]
pub fn exponential_ms(attempt: u32, cfg: &RetryConfig) -> f64 {
    let max_ms = as_millis_u64(cfg.max_delay) as f64;
    let initial_ms = as_millis_u64(cfg.initial_delay) as f64;
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = initial_ms * cfg.factor.powi(exp);
    // 0 * inf is NaN: a zero initial delay stays zero.
    if raw.is_nan() { 0.0 } else { raw.min(max_ms) }
}

/// Scale `base_ms` by `1 + jitter_factor * u` with `u` uniform in `[-1, 1]`,
/// floored at zero and rounded to the nearest millisecond.
pub fn jitter_ms<R: Rng>(base_ms: f64, jitter_factor: f64, rng: &mut R) -> u64 {
    let u: f64 = rng.random_range(-1.0..=1.0);
    let scaled = base_ms * jitter_factor.mul_add(u, 1.0);
    scaled.max(0.0).round() as u64
}

/// Compute the wait before retry number `attempt + 1`.
///
/// A positive `override_delay` (e.g. from `Retry-After`) replaces the
/// exponential base for this wait only, capped at `max_delay`; jitter still
/// applies when enabled.
pub fn next_delay_with<R: Rng>(
    attempt: u32,
    cfg: &RetryConfig,
    override_delay: Option<Duration>,
    rng: &mut R,
) -> Duration {
    let max_ms = as_millis_u64(cfg.max_delay);
    let base_ms = match override_delay.map(as_millis_u64).filter(|ms| *ms > 0) {
        Some(ms) => ms.min(max_ms) as f64,
        None => exponential_ms(attempt, cfg),
    };
    let ms = if cfg.jitter {
        jitter_ms(base_ms, cfg.jitter_factor, rng)
    } else {
        base_ms.max(0.0).round() as u64
    };
    Duration::from_millis(ms)
}

/// [`next_delay_with`] using the thread-local RNG.
#[must_use]
pub fn next_delay(attempt: u32, cfg: &RetryConfig, override_delay: Option<Duration>) -> Duration {
    next_delay_with(attempt, cfg, override_delay, &mut rand::rng())
}
