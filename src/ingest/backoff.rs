//! Exponential backoff for transient feed errors.

use std::time::Duration;

const BASE_SECS: u64 = 60;
const CAP_SECS: u64 = 900;

/// Wait before the next fetch after `consecutive_errors` transient
/// failures: `min(60 * 2^n, 900)` seconds.
pub fn delay_for(consecutive_errors: u32) -> Duration {
    let factor = 1u64.checked_shl(consecutive_errors).unwrap_or(u64::MAX);
    let secs = BASE_SECS.saturating_mul(factor).min(CAP_SECS);
    Duration::from_secs(secs)
}
