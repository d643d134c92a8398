//! Monotonic millisecond clock, injected wherever `createdAt`/phase
//! timestamps are stamped: real code depends on the `Clock` trait, tests
//! depend on a settable fake.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock-adjacent monotonic clock: counts milliseconds since
/// construction, offset so returned values look like typical epoch millis.
pub struct SystemClock {
    epoch: Instant,
    epoch_ms: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_ms = chrono::Utc::now().timestamp_millis();
        Self {
            epoch: Instant::now(),
            epoch_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.epoch_ms + self.epoch.elapsed().as_millis() as i64
    }
}

/// Deterministic clock for tests: starts at a fixed value, advances only
/// when told to.
pub struct TestClock {
    ms: AtomicI64,
}

impl TestClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            ms: AtomicI64::new(start_ms),
        })
    }

    pub fn advance(&self, delta_ms: i64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        self.ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_deterministically() {
        let clock = TestClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn system_clock_is_monotonic_nondecreasing() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
