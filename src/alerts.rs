//! Rate-limited operational alert stream: "alerts / backpressure" in the
//! component breakdown, rate-limited operational notifications.
//! Downstream consumers (an RPC subscription, a log sink) drain one
//! `broadcast::Receiver<AlertEvent>` rather than each watching every
//! producer directly.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use meshswap_sdk::Clock;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKind {
    LowTradingBalance,
    PeerBanned,
    SwapFailed,
}

#[derive(Debug, Clone)]
pub enum AlertEvent {
    LowTradingBalance { currency: String },
    PeerBanned { pub_key: String },
    SwapFailed { r_hash: String, reason: String },
}

impl AlertEvent {
    fn kind(&self) -> AlertKind {
        match self {
            AlertEvent::LowTradingBalance { .. } => AlertKind::LowTradingBalance,
            AlertEvent::PeerBanned { .. } => AlertKind::PeerBanned,
            AlertEvent::SwapFailed { .. } => AlertKind::SwapFailed,
        }
    }
}

/// Suppresses repeat notifications of the same kind within `window_ms` so a
/// flapping low-balance condition (or a banned peer repeatedly retrying)
/// doesn't flood subscribers.
pub struct Alerts {
    sender: broadcast::Sender<AlertEvent>,
    last_sent_ms: Mutex<HashMap<AlertKind, i64>>,
    window_ms: i64,
    clock: std::sync::Arc<dyn Clock>,
}

impl Alerts {
    pub fn new(clock: std::sync::Arc<dyn Clock>, window: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            last_sent_ms: Mutex::new(HashMap::new()),
            window_ms: window.as_millis() as i64,
            clock,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }

    /// Emits `event` unless one of the same kind already went out within
    /// the rate-limit window.
    pub fn notify(&self, event: AlertEvent) {
        let now = self.clock.now_ms();
        let kind = event.kind();
        let mut last_sent = self.last_sent_ms.lock();
        if let Some(&last) = last_sent.get(&kind) {
            if now - last < self.window_ms {
                return;
            }
        }
        last_sent.insert(kind, now);
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshswap_sdk::TestClock;

    #[test]
    fn suppresses_repeat_alerts_within_the_window() {
        let clock = TestClock::new(0);
        let alerts = Alerts::new(clock.clone(), Duration::from_millis(1000));
        let mut rx = alerts.subscribe();

        alerts.notify(AlertEvent::PeerBanned { pub_key: "a".into() });
        alerts.notify(AlertEvent::PeerBanned { pub_key: "b".into() });
        assert_eq!(rx.try_recv().is_ok(), true);
        assert!(rx.try_recv().is_err());

        clock.advance(1001);
        alerts.notify(AlertEvent::PeerBanned { pub_key: "c".into() });
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn different_kinds_do_not_suppress_each_other() {
        let clock = TestClock::new(0);
        let alerts = Alerts::new(clock, Duration::from_millis(1000));
        let mut rx = alerts.subscribe();

        alerts.notify(AlertEvent::PeerBanned { pub_key: "a".into() });
        alerts.notify(AlertEvent::LowTradingBalance { currency: "BTC".into() });
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }
}
