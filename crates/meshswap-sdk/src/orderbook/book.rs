use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::matching::{MatchingEngine, MatchOutcome};
use crate::types::{LocalId, NodePubKey, Order, OrderId, OrderSource, PairId};

use super::commands::{HoldController, SwapInitiator};
use super::error::OrderBookError;
use super::events::OrderBookEvent;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Owns per-pair `MatchingEngine`s and the own/peer order maps (the design
/// component table). Locking discipline: `engines` is an `RwLock` guarding
/// structural changes (adding a pair); each engine has its own `Mutex` held
/// for the duration of one match-and-place call, never across
/// an `.await`.
pub struct OrderBook {
    engines: RwLock<HashMap<PairId, Arc<Mutex<MatchingEngine>>>>,
    local_ids: Mutex<HashMap<(PairId, LocalId), OrderId>>,
    order_pairs: Mutex<HashMap<OrderId, PairId>>,
    events: broadcast::Sender<OrderBookEvent>,
    clock: Arc<dyn Clock>,
}

impl OrderBook {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engines: RwLock::new(HashMap::new()),
            local_ids: Mutex::new(HashMap::new()),
            order_pairs: Mutex::new(HashMap::new()),
            events,
            clock,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderBookEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: OrderBookEvent) {
        // Best-effort: no subscribers is not an error (the design gossip
        // re-broadcast is itself best-effort; the same policy applies here).
        let _ = self.events.send(event);
    }

    pub fn register_pair(&self, pair_id: PairId) {
        self.engines
            .write()
            .entry(pair_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(MatchingEngine::new(pair_id))));
    }

    fn engine_for(&self, pair_id: &PairId) -> Result<Arc<Mutex<MatchingEngine>>, OrderBookError> {
        self.engines
            .read()
            .get(pair_id)
            .cloned()
            .ok_or_else(|| OrderBookError::UnknownPair(pair_id.clone()))
    }

    /// `placeLimit`/`placeMarket`. `discard_remaining` is
    /// `true` for market orders (they never rest), `false` for limit orders.
    pub async fn place_own_order(
        &self,
        pair_id: PairId,
        local_id: LocalId,
        quantity: i64,
        price: Option<f64>,
        ttl_ms: Option<u64>,
        discard_remaining: bool,
        swap_initiator: &dyn SwapInitiator,
    ) -> Result<MatchOutcome, OrderBookError> {
        {
            let mut local_ids = self.local_ids.lock();
            let key = (pair_id.clone(), local_id.clone());
            if local_ids.contains_key(&key) {
                return Err(OrderBookError::DuplicateLocalId(local_id, pair_id));
            }
            // Reserve the slot before releasing the lock so a second
            // concurrent call with the same local id cannot slip in between
            // here and the post-match bookkeeping below (the design
            // property 8).
            local_ids.insert(key, OrderId::default());
        }

        let order = Order {
            id: OrderId::new(),
            pair_id: pair_id.clone(),
            quantity,
            price,
            created_at_ms: self.clock.now_ms(),
            initial_quantity: quantity.unsigned_abs(),
            hold: 0,
            source: OrderSource::Own {
                local_id: local_id.clone(),
                ttl_ms,
            },
        };

        let engine = self.engine_for(&pair_id)?;
        let outcome = {
            let mut engine = engine.lock();
            engine.match_or_add_own_order(order, discard_remaining)?
        };

        let key = (pair_id.clone(), local_id);
        match &outcome.remaining_order {
            Some(remaining) => {
                self.local_ids.lock().insert(key, remaining.id);
                self.order_pairs.lock().insert(remaining.id, pair_id.clone());
            }
            // Fully matched: nothing rests in the book, so no local id to
            // reference going forward.
            None => {
                self.local_ids.lock().remove(&key);
            }
        }

        for m in &outcome.matches {
            self.emit(OrderBookEvent::OrderMatched {
                pair_id: pair_id.clone(),
                matched: m.clone(),
            });
            swap_initiator
                .initiate_swap(pair_id.clone(), m.clone())
                .await;
        }

        if let Some(remaining) = &outcome.remaining_order {
            self.emit(OrderBookEvent::OwnOrderBroadcast {
                pair_id: pair_id.clone(),
                order: remaining.clone(),
            });
        }

        Ok(outcome)
    }

    /// `removeOwnOrderByLocalId`.
    pub fn remove_own_order_by_local_id(
        &self,
        pair_id: &PairId,
        local_id: &LocalId,
    ) -> Result<Order, OrderBookError> {
        let order_id = {
            let mut local_ids = self.local_ids.lock();
            local_ids
                .remove(&(pair_id.clone(), local_id.clone()))
                .ok_or_else(|| OrderBookError::UnknownLocalId(local_id.clone(), pair_id.clone()))?
        };
        self.order_pairs.lock().remove(&order_id);

        let engine = self.engine_for(pair_id)?;
        let removed = {
            let mut engine = engine.lock();
            engine.remove_own_order(order_id)
        };
        removed.ok_or_else(|| OrderBookError::UnknownLocalId(local_id.clone(), pair_id.clone()))
    }

    /// `import`: accept a gossiped peer order.
    pub fn import_peer_order(&self, mut order: Order) -> Result<(), OrderBookError> {
        let pair_id = order.pair_id.clone();
        order.created_at_ms = self.clock.now_ms();
        let engine = self.engine_for(&pair_id)?;
        {
            let mut engine = engine.lock();
            engine.add_peer_order(order.clone())?;
        }
        self.order_pairs.lock().insert(order.id, pair_id.clone());
        self.emit(OrderBookEvent::PeerOrderIncoming { pair_id, order });
        Ok(())
    }

    /// `onPeerDisconnect`: bulk-purge every order sourced
    /// from `peer` across all pairs.
    pub fn on_peer_disconnect(&self, peer: NodePubKey) {
        let pairs: Vec<PairId> = self.engines.read().keys().cloned().collect();
        for pair_id in pairs {
            let Ok(engine) = self.engine_for(&pair_id) else {
                continue;
            };
            let removed = {
                let mut engine = engine.lock();
                engine.remove_peer_orders(|o| o.source.peer_pub_key() == Some(&peer))
            };
            for order in removed {
                self.order_pairs.lock().remove(&order.id);
                self.emit(OrderBookEvent::PeerOrderInvalidation {
                    pair_id: pair_id.clone(),
                    order_id: order.id,
                    peer_pub_key: peer,
                });
            }
        }
    }

    /// `onOrderInvalidation`. Callers must already have
    /// authenticated that `peer` is this order's recorded source connection
    /// (DESIGN.md Open Question (b)) before calling this.
    pub fn on_order_invalidation(
        &self,
        peer: NodePubKey,
        order_id: OrderId,
        pair_id: PairId,
        quantity: Option<u64>,
    ) -> Result<(), OrderBookError> {
        let engine = self.engine_for(&pair_id)?;
        let removed_entirely = {
            let mut engine = engine.lock();
            match quantity {
                Some(qty) => engine.remove_peer_order(order_id, Some(qty)).is_none(),
                None => engine.remove_peer_order(order_id, None).is_some(),
            }
        };
        if removed_entirely {
            self.order_pairs.lock().remove(&order_id);
        }
        self.emit(OrderBookEvent::PeerOrderInvalidation {
            pair_id,
            order_id,
            peer_pub_key: peer,
        });
        Ok(())
    }

    pub fn pair_ids(&self) -> Vec<PairId> {
        self.engines.read().keys().cloned().collect()
    }

    /// Every resting own order on `pair_id`, for answering a peer's
    /// `GetOrders`.
    pub fn own_orders_for_pair(&self, pair_id: &PairId) -> Vec<Order> {
        let Ok(engine) = self.engine_for(pair_id) else {
            return Vec::new();
        };
        engine.lock().own_orders()
    }

    fn with_engine_for_order<R>(
        &self,
        order_id: OrderId,
        f: impl FnOnce(&mut MatchingEngine) -> R,
    ) -> Option<R> {
        let pair_id = self.order_pairs.lock().get(&order_id).cloned()?;
        let engine = self.engine_for(&pair_id).ok()?;
        let mut engine = engine.lock();
        Some(f(&mut engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::matching::Match;

    struct RecordingInitiator {
        calls: Mutex<Vec<Match>>,
    }

    impl RecordingInitiator {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SwapInitiator for RecordingInitiator {
        async fn initiate_swap(&self, _pair_id: PairId, matched: Match) {
            self.calls.lock().push(matched);
        }
    }

    fn peer_order(pair: &PairId, quantity: i64, price: f64) -> Order {
        Order {
            id: OrderId::new(),
            pair_id: pair.clone(),
            quantity,
            price: Some(price),
            created_at_ms: 0,
            initial_quantity: quantity.unsigned_abs(),
            hold: 0,
            source: OrderSource::Peer {
                peer_pub_key: test_pubkey(),
                destination_hint: None,
            },
        }
    }

    fn test_pubkey() -> NodePubKey {
        use secp256k1::{PublicKey, Secp256k1, SecretKey};
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[3u8; 32]).unwrap();
        NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &sk))
    }

    #[tokio::test]
    async fn duplicate_local_id_is_rejected() {
        let pair = PairId::new("BTC", "ETH");
        let book = OrderBook::new(TestClock::new(0));
        book.register_pair(pair.clone());
        let initiator = RecordingInitiator::new();

        book.place_own_order(
            pair.clone(),
            LocalId("a".into()),
            5,
            Some(5.0),
            None,
            false,
            &initiator,
        )
        .await
        .unwrap();

        let err = book
            .place_own_order(pair, LocalId("a".into()), 5, Some(5.0), None, false, &initiator)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderBookError::DuplicateLocalId(_, _)));
    }

    #[tokio::test]
    async fn full_cross_triggers_one_swap_initiation_per_match() {
        let pair = PairId::new("BTC", "ETH");
        let book = OrderBook::new(TestClock::new(0));
        book.register_pair(pair.clone());
        book.import_peer_order(peer_order(&pair, -5, 5.0)).unwrap();
        let initiator = RecordingInitiator::new();

        let outcome = book
            .place_own_order(
                pair,
                LocalId("buyer".into()),
                5,
                Some(5.0),
                None,
                false,
                &initiator,
            )
            .await
            .unwrap();

        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.remaining_order.is_none());
        assert_eq!(initiator.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn peer_disconnect_purges_its_orders() {
        let pair = PairId::new("BTC", "ETH");
        let book = OrderBook::new(TestClock::new(0));
        book.register_pair(pair.clone());
        let peer = test_pubkey();
        let mut order = peer_order(&pair, -5, 5.0);
        order.source = OrderSource::Peer {
            peer_pub_key: peer,
            destination_hint: None,
        };
        book.import_peer_order(order).unwrap();

        book.on_peer_disconnect(peer);

        let initiator = RecordingInitiator::new();
        let outcome = book
            .place_own_order(
                pair,
                LocalId("buyer".into()),
                5,
                Some(5.0),
                None,
                false,
                &initiator,
            )
            .await
            .unwrap();
        assert!(outcome.matches.is_empty());
        assert!(outcome.remaining_order.is_some());
    }
}

/// Swaps calls back into the book to reserve/release/settle holds against
/// in-flight deals.
#[async_trait]
impl HoldController for OrderBook {
    async fn reserve_hold(&self, order_id: OrderId, quantity: u64) {
        self.with_engine_for_order(order_id, |engine| engine.reserve_hold(order_id, quantity));
    }

    async fn release_hold(&self, order_id: OrderId, quantity: u64) {
        self.with_engine_for_order(order_id, |engine| engine.release_hold(order_id, quantity));
    }

    async fn settle_hold(&self, order_id: OrderId, quantity: u64) {
        let still_resting = self.with_engine_for_order(order_id, |engine| {
            engine.settle_hold(order_id, quantity);
            engine.get_order(order_id).is_some()
        });
        if still_resting == Some(false) {
            self.order_pairs.lock().remove(&order_id);
        }
    }

    fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.with_engine_for_order(order_id, |engine| engine.get_order(order_id).cloned())
            .flatten()
    }
}
