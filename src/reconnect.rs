use std::time::Duration;

use rand::Rng;

/// Base wait before the first reconnection attempt.
pub const BASE_INTERVAL: Duration = Duration::from_secs(5);

/// Hard cap on the computed wait interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Cap on the exponential multiplier, bounding the worst-case wait.
pub const MAX_BACKOFF_MULTIPLIER: u64 = 8;

/// Upper bound (exclusive) of the random jitter, in milliseconds.
pub const MAX_JITTER_MS: u64 = 1000;

/// Computes the wait interval before each reconnection attempt.
///
/// The policy itself is stateless; the attempt counter lives with the
/// connection manager and resets to zero on a successful connect, so backoff
/// always restarts from the base interval after a recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectPolicy;

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Interval before reconnection attempt number `attempt` (1-based, already
    /// incremented for the attempt being scheduled).
    ///
    /// Grows exponentially with the attempt count, capped at
    /// [`MAX_BACKOFF_MULTIPLIER`] times the base, plus a uniformly random
    /// jitter in `[0, 1s)` so many clients retrying at once spread out
    /// instead of stampeding the backend.
    pub fn next_interval(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let multiplier = 1u64
            .checked_shl(exponent)
            .unwrap_or(u64::MAX)
            .min(MAX_BACKOFF_MULTIPLIER);
        let jitter_ms = rand::thread_rng().gen_range(0..MAX_JITTER_MS);
        let millis = (BASE_INTERVAL.as_millis() as u64)
            .saturating_mul(multiplier)
            .saturating_add(jitter_ms)
            .min(MAX_INTERVAL.as_millis() as u64);
        Duration::from_millis(millis)
    }
}
