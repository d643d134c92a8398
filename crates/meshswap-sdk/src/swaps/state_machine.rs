use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use meshswap_store::SwapDealStore;

use crate::clock::Clock;
use crate::orderbook::{HoldController, SwapInitiator};
use crate::p2p::{Packet, PacketBody, Pool, SwapAcceptedBody, SwapCompleteBody, SwapFailedBody, SwapRequestBody};
use crate::swap_client::{PaymentState, SwapClientManager};
use crate::types::{Hash32, NodePubKey, OrderId, PairId, SwapPhase, SwapRole, SwapState};

use super::deal::{build_maker_deal, build_taker_deal, from_record, hash_preimage, order_is_own, to_record};
use super::error::SwapError;

#[derive(Debug, Clone)]
pub struct SwapsConfig {
    /// CLTV delta given to the maker's leg; the taker's must exceed it by
    /// more than `cltv_safety_margin`.
    pub base_cltv_delta: u32,
    pub cltv_safety_margin: u32,
    /// Extra headroom added on top of the safety margin when the taker picks
    /// its own delta, so a maker using exactly `base_cltv_delta` always
    /// clears the invariant with room to spare.
    pub cltv_margin_buffer: u32,
    pub recovery_interval_ms: u64,
    pub completion_timeout_ms: u64,
}

impl Default for SwapsConfig {
    fn default() -> Self {
        Self {
            base_cltv_delta: 144,
            cltv_safety_margin: 20,
            cltv_margin_buffer: 20,
            recovery_interval_ms: 300_000,
            completion_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SwapEvent {
    Succeeded { r_hash: Hash32 },
    Failed { r_hash: Hash32, reason: String },
}

/// Drives the settlement state machine: one deal per rHash,
/// advanced either by a local match (`SwapInitiator`) or by packets arriving
/// from the counterparty over the pool.
pub struct Swaps {
    deals: Mutex<HashMap<Hash32, crate::types::SwapDeal>>,
    store: Arc<dyn SwapDealStore>,
    clients: Arc<SwapClientManager>,
    holds: Arc<dyn HoldController>,
    pool: Arc<Pool>,
    clock: Arc<dyn Clock>,
    config: SwapsConfig,
    events: broadcast::Sender<SwapEvent>,
}

impl Swaps {
    pub fn new(
        store: Arc<dyn SwapDealStore>,
        clients: Arc<SwapClientManager>,
        holds: Arc<dyn HoldController>,
        pool: Arc<Pool>,
        clock: Arc<dyn Clock>,
        config: SwapsConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            deals: Mutex::new(HashMap::new()),
            store,
            clients,
            holds,
            pool,
            clock,
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &SwapsConfig {
        &self.config
    }

    pub fn deal(&self, r_hash: &Hash32) -> Option<crate::types::SwapDeal> {
        self.deals.lock().get(r_hash).cloned()
    }

    fn emit(&self, event: SwapEvent) {
        let _ = self.events.send(event);
    }

    fn persist(&self, deal: &crate::types::SwapDeal) {
        if let Err(e) = self.store.upsert_deal(to_record(deal, self.clock.now_ms())) {
            warn!("failed to persist swap deal {}: {e}", hex::encode(deal.r_hash));
        }
    }

    fn send(&self, peer: NodePubKey, body: PacketBody) {
        match self.pool.peer(&peer) {
            Some(handle) => {
                if let Err(e) = handle.send(Packet::new(body)) {
                    warn!("failed to send packet to {peer}: {e}");
                }
            }
            None => warn!("cannot reach peer {peer} to send swap packet"),
        }
    }

    async fn fail(&self, r_hash: Hash32, reason: String) {
        let deal = {
            let mut deals = self.deals.lock();
            match deals.get_mut(&r_hash) {
                Some(deal) => {
                    deal.state = SwapState::Error;
                    deal.clone()
                }
                None => return,
            }
        };
        // Only the leg this node actually owns can have its hold released
        // here; the counterparty's order lives on its own node.
        let own_order_id = match deal.role {
            SwapRole::Taker => deal.taker_order_id,
            SwapRole::Maker => deal.maker_order_id,
        };
        self.holds.release_hold(own_order_id, deal.quantity).await;
        self.persist(&deal);
        self.send(
            deal.peer_pub_key,
            PacketBody::SwapFailed(SwapFailedBody {
                r_hash,
                reason: reason.clone(),
            }),
        );
        self.emit(SwapEvent::Failed { r_hash, reason });
    }

    /// Entry point for a locally-observed match: this node
    /// always ends up Taker since matching only ever runs against an order
    /// this node is placing.
    async fn handle_local_match(&self, pair_id: PairId, matched: crate::matching::Match) -> Result<(), SwapError> {
        if order_is_own(&matched.maker) {
            // Self-trade: both legs belong to this node, nothing to settle
            // across the wire. Consume both holds outright.
            self.holds.settle_hold(matched.maker_order_id, matched.quantity).await;
            self.holds.settle_hold(matched.taker_order_id, matched.quantity).await;
            return Ok(());
        }
        let peer_pub_key = *matched
            .maker
            .source
            .peer_pub_key()
            .expect("checked above: maker is not own");

        let now = self.clock.now_ms();
        let (deal, _preimage) = build_taker_deal(pair_id, &matched, peer_pub_key, &self.config, now);
        let r_hash = deal.r_hash;

        self.holds.reserve_hold(deal.taker_order_id, deal.quantity).await;
        self.deals.lock().insert(r_hash, deal.clone());
        self.persist(&deal);

        self.send(
            peer_pub_key,
            PacketBody::SwapRequest(SwapRequestBody {
                r_hash,
                quantity: deal.quantity,
                pair_id: deal.pair_id.as_str().to_string(),
                taker_cltv_delta: deal.taker_cltv_delta,
                taker_order_id: deal.taker_order_id.0,
                maker_order_id: deal.maker_order_id.0,
            }),
        );

        let mut deal = deal;
        deal.phase = SwapPhase::SwapRequested;
        self.persist(&deal);
        self.deals.lock().insert(r_hash, deal);
        Ok(())
    }

    /// Dispatches a packet the pool received that belongs to the swap
    /// protocol; callers wire this to `Pool::subscribe`'s `PacketReceived`.
    pub async fn handle_packet(&self, from: NodePubKey, body: PacketBody) {
        match body {
            PacketBody::SwapRequest(body) => self.on_swap_request(from, body).await,
            PacketBody::SwapAccepted(body) => self.on_swap_accepted(from, body).await,
            PacketBody::SwapFailed(body) => self.on_swap_failed(body).await,
            PacketBody::SwapComplete(body) => self.on_swap_complete(body).await,
            _ => {}
        }
    }

    /// Maker side of `Created`: validate the named order still
    /// has capacity, reserve the hold, then immediately begin the outgoing
    /// payment — our node learns about the match secondhand via this packet,
    /// so there is no separate "await match" step to wait through locally.
    async fn on_swap_request(&self, from: NodePubKey, body: SwapRequestBody) {
        let maker_order_id = OrderId(body.maker_order_id);
        let taker_order_id = OrderId(body.taker_order_id);
        let pair_id: PairId = body.pair_id.as_str().into();

        let Some(maker_order) = self.holds.get_order(maker_order_id) else {
            self.send(
                from,
                PacketBody::SwapFailed(SwapFailedBody {
                    r_hash: body.r_hash,
                    reason: "unknown maker order".into(),
                }),
            );
            return;
        };
        let available = maker_order.abs_quantity().saturating_sub(maker_order.hold);
        if available < body.quantity {
            self.send(
                from,
                PacketBody::SwapFailed(SwapFailedBody {
                    r_hash: body.r_hash,
                    reason: "insufficient available quantity".into(),
                }),
            );
            return;
        }

        let now = self.clock.now_ms();
        let mut deal = build_maker_deal(
            pair_id,
            &maker_order,
            body.r_hash,
            body.quantity,
            from,
            body.taker_cltv_delta,
            maker_order_id,
            taker_order_id,
            &self.config,
            now,
        );

        if !deal.cltv_deltas_are_safe(self.config.cltv_safety_margin) {
            self.send(
                from,
                PacketBody::SwapFailed(SwapFailedBody {
                    r_hash: body.r_hash,
                    reason: "cltv deltas unsafe".into(),
                }),
            );
            return;
        }

        self.holds.reserve_hold(maker_order_id, body.quantity).await;
        self.deals.lock().insert(deal.r_hash, deal.clone());
        self.persist(&deal);

        self.send(
            from,
            PacketBody::SwapAccepted(SwapAcceptedBody {
                r_hash: deal.r_hash,
                accepted_quantity: body.quantity,
                maker_cltv_delta: deal.maker_cltv_delta,
            }),
        );
        deal.phase = SwapPhase::SwapAccepted;
        self.persist(&deal);
        self.deals.lock().insert(deal.r_hash, deal.clone());

        let Some(client) = self.clients.get(&deal.maker_currency) else {
            self.fail(deal.r_hash, format!("no swap client for {}", deal.maker_currency)).await;
            return;
        };
        match client
            .send_payment(deal.r_hash, &from.to_hex(), deal.maker_units, deal.taker_cltv_delta)
            .await
        {
            Ok(_) => {
                let mut deal = deal;
                deal.phase = SwapPhase::SendingPayment;
                deal.executed_at_ms = Some(self.clock.now_ms());
                self.persist(&deal);
                self.deals.lock().insert(deal.r_hash, deal);
            }
            Err(e) => {
                warn!("maker payment failed for {}: {e}", hex::encode(deal.r_hash));
                self.fail(deal.r_hash, e.to_string()).await;
            }
        }
    }

    /// Taker side of `SwapAccepted`: register our expectation
    /// to receive the maker's leg, then wait — settlement continues when
    /// that incoming HTLC is observed (modeled here as a `SwapComplete`
    /// packet carrying the revealed preimage, see `on_swap_complete`).
    async fn on_swap_accepted(&self, _from: NodePubKey, body: SwapAcceptedBody) {
        let mut deal = {
            let deals = self.deals.lock();
            match deals.get(&body.r_hash) {
                Some(deal) if deal.role == SwapRole::Taker => deal.clone(),
                _ => return,
            }
        };
        deal.maker_cltv_delta = body.maker_cltv_delta;
        if !deal.cltv_deltas_are_safe(self.config.cltv_safety_margin) {
            self.fail(deal.r_hash, "cltv deltas unsafe on accept".into()).await;
            return;
        }

        let Some(client) = self.clients.get(&deal.maker_currency) else {
            self.fail(deal.r_hash, format!("no swap client for {}", deal.maker_currency)).await;
            return;
        };
        if let Err(e) = client.add_invoice(deal.r_hash, deal.maker_units, deal.taker_cltv_delta).await {
            self.fail(deal.r_hash, e.to_string()).await;
            return;
        }

        deal.phase = SwapPhase::SwapAccepted;
        self.persist(&deal);
        self.deals.lock().insert(deal.r_hash, deal);
    }

    async fn on_swap_failed(&self, body: SwapFailedBody) {
        let had_deal = self.deals.lock().get(&body.r_hash).is_some();
        if !had_deal {
            return;
        }
        self.fail(body.r_hash, body.reason).await;
    }

    /// Terminal step: the side that receives
    /// this either just revealed the preimage by claiming its own incoming
    /// leg (taker → maker) or is being told the deal is done (maker, after
    /// settling leg two with the preimage this packet carries).
    async fn on_swap_complete(&self, body: SwapCompleteBody) {
        let Some(mut deal) = self.deals.lock().get(&body.r_hash).cloned() else {
            return;
        };

        if hash_preimage(body.r_preimage) != deal.r_hash {
            warn!("dropping SwapComplete for {}: preimage does not hash to r_hash", hex::encode(deal.r_hash));
            self.fail(deal.r_hash, "preimage mismatch".into()).await;
            return;
        }

        if deal.role == SwapRole::Maker {
            let Some(client) = self.clients.get(&deal.taker_currency) else {
                self.fail(deal.r_hash, format!("no swap client for {}", deal.taker_currency)).await;
                return;
            };
            if let Err(e) = client.settle_invoice(deal.r_hash, body.r_preimage).await {
                self.fail(deal.r_hash, e.to_string()).await;
                return;
            }
            self.holds.settle_hold(deal.maker_order_id, deal.quantity).await;
        } else {
            self.holds.settle_hold(deal.taker_order_id, deal.quantity).await;
        }

        deal.r_preimage = Some(body.r_preimage);
        deal.state = SwapState::Completed;
        deal.phase = SwapPhase::SwapCompleted;
        deal.completed_at_ms = Some(self.clock.now_ms());
        self.persist(&deal);
        self.deals.lock().insert(deal.r_hash, deal.clone());
        self.emit(SwapEvent::Succeeded { r_hash: deal.r_hash });
    }

    /// Called by the taker once it observes its incoming leg settle (the
    /// place a real driver would poll `lookup_payment` for the maker's
    /// currency and, on success, call this): reveals the preimage to the
    /// maker and pays leg two.
    pub async fn settle_incoming_and_pay(&self, r_hash: Hash32) -> Result<(), SwapError> {
        let mut deal = self
            .deals
            .lock()
            .get(&r_hash)
            .cloned()
            .ok_or_else(|| SwapError::DealNotFound(hex::encode(r_hash)))?;
        if deal.is_terminal() {
            return Err(SwapError::AlreadyTerminal);
        }
        let preimage = deal.r_preimage.ok_or_else(|| SwapError::DealNotFound(hex::encode(r_hash)))?;

        let incoming = self
            .clients
            .get(&deal.maker_currency)
            .ok_or_else(|| SwapError::NoSwapClient(deal.maker_currency.clone()))?;
        incoming.settle_invoice(r_hash, preimage).await?;

        let outgoing = self
            .clients
            .get(&deal.taker_currency)
            .ok_or_else(|| SwapError::NoSwapClient(deal.taker_currency.clone()))?;
        outgoing
            .send_payment(r_hash, &deal.peer_pub_key.to_hex(), deal.taker_units, deal.maker_cltv_delta)
            .await?;

        deal.phase = SwapPhase::PaymentReceived;
        self.persist(&deal);
        self.deals.lock().insert(r_hash, deal.clone());

        self.send(
            deal.peer_pub_key,
            PacketBody::SwapComplete(SwapCompleteBody { r_hash, r_preimage: preimage }),
        );

        deal.state = SwapState::Completed;
        deal.phase = SwapPhase::SwapCompleted;
        deal.completed_at_ms = Some(self.clock.now_ms());
        self.persist(&deal);
        self.deals.lock().insert(r_hash, deal.clone());
        self.holds.settle_hold(deal.taker_order_id, deal.quantity).await;
        Ok(())
    }

    /// Polls every non-terminal in-flight deal's currency clients once, for
    /// the taker-side legs that need an external nudge (the maker-initiated
    /// half is driven entirely by incoming packets).
    pub async fn poll_pending(&self) {
        let pending: Vec<Hash32> = self
            .deals
            .lock()
            .values()
            .filter(|d| !d.is_terminal() && d.role == SwapRole::Taker && d.phase == SwapPhase::SwapAccepted)
            .map(|d| d.r_hash)
            .collect();

        for r_hash in pending {
            let Some(deal) = self.deal(&r_hash) else { continue };
            let Some(client) = self.clients.get(&deal.maker_currency) else { continue };
            match client.lookup_payment(r_hash).await {
                Ok(result) if result.state == PaymentState::Succeeded => {
                    if let Err(e) = self.settle_incoming_and_pay(r_hash).await {
                        warn!("failed to settle incoming leg for {}: {e}", hex::encode(r_hash));
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("lookup_payment failed for {}: {e}", hex::encode(r_hash)),
            }
        }
    }

    /// Crash recovery: rebuilds every non-terminal deal from
    /// the store and re-checks its outstanding leg against the swap client.
    /// Run once at startup and then on `SwapsConfig::recovery_interval_ms`.
    pub async fn recover_non_terminal(&self) {
        let records = match self.store.list_non_terminal_deals() {
            Ok(records) => records,
            Err(e) => {
                warn!("failed to list non-terminal deals for recovery: {e}");
                return;
            }
        };
        for record in records {
            let Some(deal) = from_record(&record) else {
                warn!("dropping unrecoverable swap deal row {}", record.r_hash);
                continue;
            };
            let r_hash = deal.r_hash;
            self.deals.lock().entry(r_hash).or_insert(deal);
            self.recover_one(r_hash).await;
        }
    }

    async fn recover_one(&self, r_hash: Hash32) {
        let Some(deal) = self.deal(&r_hash) else { return };
        if deal.is_terminal() {
            return;
        }
        let Some(client) = self.clients.get(&deal.maker_currency) else {
            warn!(
                "no swap client for {} during recovery of {}",
                deal.maker_currency,
                hex::encode(r_hash)
            );
            return;
        };
        match client.lookup_payment(r_hash).await {
            Ok(result) => match result.state {
                PaymentState::Succeeded => match deal.role {
                    SwapRole::Taker => {
                        if let Err(e) = self.settle_incoming_and_pay(r_hash).await {
                            warn!("recovery settle failed for {}: {e}", hex::encode(r_hash));
                        }
                    }
                    SwapRole::Maker => {
                        // Our own outgoing payment settled; nothing left to
                        // do locally until the taker's SwapComplete arrives.
                        let mut deal = deal;
                        deal.phase = SwapPhase::SendingPayment;
                        deal.state = SwapState::Recovered;
                        self.persist(&deal);
                        self.deals.lock().insert(r_hash, deal);
                    }
                },
                PaymentState::Failed => {
                    self.fail(r_hash, "payment failed during recovery".into()).await;
                }
                PaymentState::Pending => {
                    debug!("swap {} still pending during recovery", hex::encode(r_hash));
                }
            },
            Err(e) => warn!("lookup_payment failed during recovery of {}: {e}", hex::encode(r_hash)),
        }
    }
}

#[async_trait::async_trait]
impl SwapInitiator for Swaps {
    async fn initiate_swap(&self, pair_id: PairId, matched: crate::matching::Match) {
        if let Err(e) = self.handle_local_match(pair_id, matched).await {
            warn!("failed to initiate swap: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use meshswap_store::MemoryStore;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    use crate::clock::TestClock;
    use crate::matching::Match;
    use crate::swap_client::SwapClientManager;
    use crate::types::{LocalId, Order, OrderId, OrderSource};

    use super::*;

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

    fn pub_key(seed: u8) -> NodePubKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &sk))
    }

    fn own_order(pair: &PairId, quantity: i64) -> Order {
        Order {
            id: OrderId::new(),
            pair_id: pair.clone(),
            quantity,
            price: Some(5.0),
            created_at_ms: 0,
            initial_quantity: quantity.unsigned_abs(),
            hold: 0,
            source: OrderSource::Own {
                local_id: LocalId("l".into()),
                ttl_ms: None,
            },
        }
    }

    fn test_pool(secret_key_seed: u8) -> Arc<Pool> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[secret_key_seed; 32]).unwrap();
        Arc::new(Pool::new(
            sk,
            "test-net".into(),
            Vec::new(),
            Vec::new(),
            false,
            Arc::new(MemoryStore::new()),
            TestClock::new(0),
        ))
    }

    #[tokio::test]
    async fn self_trade_settles_both_holds_without_touching_the_network() {
        let pair = PairId::new("BTC", "ETH");
        let maker = own_order(&pair, -5);
        let taker = own_order(&pair, 5);
        let matched = Match {
            maker_order_id: maker.id,
            taker_order_id: taker.id,
            maker: maker.clone(),
            taker: taker.clone(),
            quantity: 5,
        };

        let holds = Arc::new(RecordingHolds::new());
        let swaps = Swaps::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SwapClientManager::new()),
            holds.clone(),
            test_pool(1),
            TestClock::new(0),
            SwapsConfig::default(),
        );

        swaps.initiate_swap(pair, matched).await;

        let settled = holds.settled.lock().unwrap();
        assert_eq!(settled.len(), 2);
        assert!(settled.contains(&(maker.id, 5)));
        assert!(settled.contains(&(taker.id, 5)));
    }

    #[test]
    fn default_config_derived_taker_delta_satisfies_its_own_safety_invariant() {
        let config = SwapsConfig::default();
        let taker_cltv_delta = config.base_cltv_delta + config.cltv_safety_margin + config.cltv_margin_buffer;
        assert!(taker_cltv_delta > config.base_cltv_delta + config.cltv_safety_margin);
    }

    #[test]
    fn swap_event_failed_carries_the_reason() {
        let event = SwapEvent::Failed { r_hash: [1u8; 32], reason: "x".into() };
        match event {
            SwapEvent::Failed { reason, .. } => assert_eq!(reason, "x"),
            _ => panic!("expected Failed"),
        }
    }
}
