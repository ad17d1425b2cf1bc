// Exponential backoff with jitter for transient-failure retries.

use rand::{thread_rng, Rng};
use std::time::Duration;

/// Delay before a job's next retry: `base * 2^retries`, jittered by ±20% and
/// capped at `cap`.
pub fn backoff_delay(base: Duration, cap: Duration, retries: u32) -> Duration {
    let factor = 2u32.saturating_pow(retries.min(16));
    let exponential = base.saturating_mul(factor).min(cap);
    if exponential.is_zero() {
        return exponential;
    }
    let jitter = thread_rng().gen_range(0.8..1.2);
    exponential.mul_f64(jitter).min(cap)
}
