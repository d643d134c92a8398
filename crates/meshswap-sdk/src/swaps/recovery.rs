//! Periodic crash-recovery sweep: on a timer, re-derive every
//! non-terminal deal from the store and nudge it forward. The actual
//! recovery logic lives on `Swaps` itself; this module only owns the
//! schedule.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use super::state_machine::Swaps;

/// Spawns the background task; intended to run for the lifetime of the
/// daemon (`tokio::spawn(spawn_recovery_loop(swaps))`).
pub async fn run_recovery_loop(swaps: Arc<Swaps>) {
    info!("running startup swap recovery scan");
    swaps.recover_non_terminal().await;

    let interval_ms = swaps.config().recovery_interval_ms.max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.tick().await; // first tick fires immediately; we already just scanned.
    loop {
        ticker.tick().await;
        swaps.recover_non_terminal().await;
        swaps.poll_pending().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::Arc;

    use async_trait::async_trait;
    use meshswap_store::{MemoryStore, SwapDealStore};
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    use crate::clock::TestClock;
    use crate::orderbook::HoldController;
    use crate::p2p::Pool;
    use crate::swap_client::{
        ChannelBalance, PaymentResult, PaymentState, SwapClient, SwapClientError, SwapClientManager,
        SwapClientStatus,
    };
    use crate::types::{
        NodePubKey, Order, OrderId, PairId, SwapDeal, SwapPhase, SwapRole, SwapState,
    };

    use super::super::deal::to_record;
    use super::super::state_machine::SwapsConfig;
    use super::*;

    struct NoopHolds;

    #[async_trait::async_trait]
    impl HoldController for NoopHolds {
        async fn reserve_hold(&self, _order_id: OrderId, _quantity: u64) {}
        async fn release_hold(&self, _order_id: OrderId, _quantity: u64) {}
        async fn settle_hold(&self, _order_id: OrderId, _quantity: u64) {}
        fn get_order(&self, _order_id: OrderId) -> Option<Order> {
            None
        }
    }

    struct RecordingHolds {
        settled: StdMutex<Vec<(OrderId, u64)>>,
    }

    impl RecordingHolds {
        fn new() -> Self {
            Self {
                settled: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HoldController for RecordingHolds {
        async fn reserve_hold(&self, _order_id: OrderId, _quantity: u64) {}
        async fn release_hold(&self, _order_id: OrderId, _quantity: u64) {}
        async fn settle_hold(&self, order_id: OrderId, quantity: u64) {
            self.settled.lock().unwrap().push((order_id, quantity));
        }
        fn get_order(&self, _order_id: OrderId) -> Option<Order> {
            None
        }
    }

    /// Always reports a given payment state and never fails the leg it pays
    /// or settles, so recovery can be driven to completion deterministically.
    struct AlwaysSucceedsClient {
        lookup_state: PaymentState,
    }

    #[async_trait]
    impl SwapClient for AlwaysSucceedsClient {
        fn status(&self) -> SwapClientStatus {
            SwapClientStatus::ConnectionVerified
        }

        async fn send_payment(
            &self,
            r_hash: [u8; 32],
            _destination: &str,
            _units: u64,
            _cltv_delta: u32,
        ) -> Result<[u8; 32], SwapClientError> {
            Ok(r_hash)
        }

        async fn add_invoice(
            &self,
            _r_hash: [u8; 32],
            _units: u64,
            _cltv_delta: u32,
        ) -> Result<Option<String>, SwapClientError> {
            Ok(None)
        }

        async fn lookup_payment(&self, _r_hash: [u8; 32]) -> Result<PaymentResult, SwapClientError> {
            Ok(PaymentResult { state: self.lookup_state, preimage: None })
        }

        async fn settle_invoice(&self, _r_hash: [u8; 32], _preimage: [u8; 32]) -> Result<(), SwapClientError> {
            Ok(())
        }

        async fn remove_invoice(&self, _r_hash: [u8; 32]) -> Result<(), SwapClientError> {
            Ok(())
        }

        async fn channel_balance(&self) -> Result<ChannelBalance, SwapClientError> {
            Ok(ChannelBalance::default())
        }

        async fn open_channel(&self, _remote: &str, _local_amount: u64) -> Result<(), SwapClientError> {
            Ok(())
        }

        async fn close_channel(&self, _channel_id: &str) -> Result<(), SwapClientError> {
            Ok(())
        }

        async fn deposit_to_channel(&self, _channel_id: &str, _amount: u64) -> Result<(), SwapClientError> {
            Ok(())
        }
    }

    fn pub_key(seed: u8) -> NodePubKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &sk))
    }

    #[tokio::test]
    async fn recovery_scan_on_an_empty_store_does_not_panic() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[4u8; 32]).unwrap();
        let pool = Arc::new(Pool::new(
            sk,
            "test-net".into(),
            Vec::new(),
            Vec::new(),
            false,
            Arc::new(MemoryStore::new()),
            TestClock::new(0),
        ));
        let swaps = Arc::new(Swaps::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SwapClientManager::new()),
            Arc::new(NoopHolds),
            pool,
            TestClock::new(0),
            SwapsConfig::default(),
        ));
        swaps.recover_non_terminal().await;
    }

    /// A taker-side deal left in `SwapAccepted` (crashed after registering its
    /// incoming leg, before observing it settle) must, on the next startup
    /// scan, discover the incoming leg actually succeeded and drive the whole
    /// deal to completion on its own — the scenario `run_recovery_loop` exists
    /// for.
    #[tokio::test]
    async fn recover_non_terminal_completes_a_crashed_taker_deal_whose_incoming_leg_already_settled() {
        let pair = PairId::new("BTC", "ETH");
        let deal = SwapDeal {
            r_hash: [7u8; 32],
            r_preimage: Some([9u8; 32]),
            role: SwapRole::Taker,
            phase: SwapPhase::SwapAccepted,
            state: SwapState::Active,
            pair_id: pair,
            quantity: 2,
            price: 2.0,
            peer_pub_key: pub_key(2),
            maker_currency: "BTC".into(),
            taker_currency: "ETH".into(),
            maker_units: 2,
            taker_units: 4,
            maker_cltv_delta: 144,
            taker_cltv_delta: 184,
            maker_order_id: OrderId::new(),
            taker_order_id: OrderId::new(),
            created_at_ms: 0,
            executed_at_ms: None,
            completed_at_ms: None,
        };

        let store = Arc::new(MemoryStore::new());
        store.upsert_deal(to_record(&deal, 0)).expect("seed crashed deal");

        let clients = Arc::new(SwapClientManager::new());
        clients.register("BTC", Arc::new(AlwaysSucceedsClient { lookup_state: PaymentState::Succeeded }));
        clients.register("ETH", Arc::new(AlwaysSucceedsClient { lookup_state: PaymentState::Succeeded }));

        let holds = Arc::new(RecordingHolds::new());
        let pool = Arc::new(Pool::new(
            SecretKey::from_slice(&[5u8; 32]).unwrap(),
            "test-net".into(),
            Vec::new(),
            Vec::new(),
            false,
            Arc::new(MemoryStore::new()),
            TestClock::new(0),
        ));
        let swaps = Swaps::new(store, clients, holds.clone(), pool, TestClock::new(0), SwapsConfig::default());

        swaps.recover_non_terminal().await;

        let recovered = swaps.deal(&deal.r_hash).expect("deal rebuilt from store");
        assert_eq!(recovered.state, SwapState::Completed);
        assert_eq!(recovered.phase, SwapPhase::SwapCompleted);
        assert!(holds.settled.lock().unwrap().contains(&(deal.taker_order_id, deal.quantity)));
    }
}
