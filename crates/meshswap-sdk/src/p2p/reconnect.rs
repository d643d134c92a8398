use std::time::Duration;

/// Exponential backoff capped at ~5 minutes (the design: "connect retry
/// initial 1s, doubling to 300s cap").
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(300),
        }
    }
}

impl Backoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.initial.as_millis() as u64;
        let scaled = millis.saturating_mul(factor);
        Duration::from_millis(scaled).min(self.cap)
    }
}
