//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the capped exponential delay before retry number `attempt`.
///
/// `attempt` is the 1-based index of the attempt that just failed.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let delay = 2u32
        .checked_pow(attempt - 1)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(max);

    delay.min(max)
}

/// Scale `delay` by `1 + factor * sample`, where `sample` is in `[-1, 1]`.
///
/// The result never goes below zero.
pub fn apply_jitter(delay: Duration, factor: f64, sample: f64) -> Duration {
    let factor = factor.clamp(0.0, 1.0);
    let scale = (1.0 + factor * sample.clamp(-1.0, 1.0)).max(0.0);

    Duration::try_from_secs_f64(delay.as_secs_f64() * scale).unwrap_or(Duration::ZERO)
}

/// Backoff for `attempt` with a uniformly random jitter sample.
pub fn jittered_backoff(attempt: u32, base: Duration, max: Duration, factor: f64) -> Duration {
    let delay = calculate_backoff(attempt, base, max);
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }

    let sample = rand::thread_rng().gen_range(-1.0..=1.0);
    apply_jitter(delay, factor, sample)
}
