//! Top-level orchestrator: constructs every subsystem, wires their event
//! channels together, and implements the RPC surface against them
//!.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use meshswap_sdk::clock::SystemClock;
use meshswap_sdk::orderbook::{OrderBook, OrderBookEvent};
use meshswap_sdk::p2p::{Packet, PacketBody, Pool, PoolEvent, WireOrder};
use meshswap_sdk::swap_client::SwapClientManager;
use meshswap_sdk::swaps::{run_recovery_loop, SwapEvent, Swaps, SwapsConfig};
use meshswap_sdk::types::{LocalId, NodePubKey, Order, OrderId, OrderSource, PairId};
use meshswap_store::{CurrencyStore, NodeStore, SwapDealStore};

use crate::alerts::{AlertEvent, Alerts};
use crate::config::Config;
use crate::rpc::{
    self, AddCurrencyRequest, AddPairRequest, ConnectRequest, NodeInfo, OrderInfo, PeerInfo,
    PeerPubKeyRequest, PlaceOrderRequest, PlaceOrderResponse, RemoveOrderRequest, RpcError,
    RpcHandler, RpcResult,
};

pub struct Daemon {
    order_book: Arc<OrderBook>,
    pool: Arc<Pool>,
    swaps: Arc<Swaps>,
    alerts: Arc<Alerts>,
}

/// The command surfaces `OrderBook` depends on, both satisfied by `Swaps`
///.
fn wire_order_to_order(wire: WireOrder, peer_pub_key: NodePubKey) -> Order {
    Order {
        id: OrderId(wire.order_id),
        pair_id: PairId::from(wire.pair_id.as_str()),
        quantity: wire.quantity,
        price: wire.price,
        created_at_ms: wire.created_at_ms,
        initial_quantity: wire.quantity.unsigned_abs(),
        hold: 0,
        source: OrderSource::Peer {
            peer_pub_key,
            destination_hint: wire.destination_hint,
        },
    }
}

/// The other direction: an own resting order, ready to gossip. The id
/// carried on the wire is the same one this node keeps in
/// `OrderBook::order_pairs`, so a peer importing it and later naming it in
/// a `SwapRequest` resolves to the same resting order here.
fn order_to_wire_order(order: &Order) -> WireOrder {
    WireOrder {
        pair_id: order.pair_id.as_str().to_string(),
        order_id: order.id.0,
        quantity: order.quantity,
        price: order.price,
        created_at_ms: order.created_at_ms,
        destination_hint: None,
    }
}

impl Daemon {
    pub async fn start<S>(config: Config, store: Arc<S>) -> anyhow::Result<Arc<Self>>
    where
        S: NodeStore + SwapDealStore + CurrencyStore + 'static,
    {
        let clock = Arc::new(SystemClock::new());
        let secret_key = config.node_secret_key()?;

        let order_book = Arc::new(OrderBook::new(clock.clone()));
        let pool = Arc::new(Pool::new(
            secret_key,
            config.network_id.clone(),
            vec![config.listen_addr.clone()],
            Vec::new(),
            false,
            store.clone(),
            clock.clone(),
        ));

        let clients = Arc::new(SwapClientManager::new());
        clients.init(&store.list_currencies().unwrap_or_default());

        let swaps_config = SwapsConfig {
            recovery_interval_ms: config.recovery_interval_ms,
            completion_timeout_ms: config.completion_timeout_ms,
            ..SwapsConfig::default()
        };
        let swaps = Arc::new(Swaps::new(
            store.clone(),
            clients,
            order_book.clone(),
            pool.clone(),
            clock.clone(),
            swaps_config,
        ));

        let alerts = Arc::new(Alerts::new(clock.clone(), Duration::from_secs(60)));

        let daemon = Arc::new(Self {
            order_book,
            pool: pool.clone(),
            swaps: swaps.clone(),
            alerts,
        });

        daemon.spawn_background_tasks(config.listen_addr.clone());

        for peer_uri in &config.bootstrap_peers {
            if let Ok((expected, address)) = Pool::parse_node_uri(peer_uri) {
                let pool = daemon.pool.clone();
                tokio::spawn(async move {
                    if let Err(e) = pool.add_outbound(address, Some(expected), false).await {
                        warn!("failed to connect to bootstrap peer {expected}: {e}");
                    }
                });
            } else {
                warn!("malformed bootstrap peer uri: {peer_uri}");
            }
        }

        Ok(daemon)
    }

    fn spawn_background_tasks(self: &Arc<Self>, listen_addr: String) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = pool.run_listener(listen_addr).await {
                warn!("listener stopped: {e}");
            }
        });

        let swaps = self.swaps.clone();
        tokio::spawn(run_recovery_loop(swaps));

        let this = self.clone();
        tokio::spawn(async move { this.drain_pool_events().await });

        let this = self.clone();
        tokio::spawn(async move { this.drain_swap_events().await });

        let this = self.clone();
        tokio::spawn(async move { this.drain_order_book_events().await });
    }

    /// Gossips a node's own resting orders: every peer that has advertised
    /// interest in the order's pair gets a best-effort `Order` packet.
    /// Errors are logged, never propagated — one unreachable peer must not
    /// stop gossip reaching the others.
    async fn drain_order_book_events(self: Arc<Self>) {
        let mut rx = self.order_book.subscribe();
        loop {
            match rx.recv().await {
                Ok(OrderBookEvent::OwnOrderBroadcast { pair_id, order }) => {
                    let wire = order_to_wire_order(&order);
                    for peer in self.pool.connected_peers() {
                        if !peer.advertises_pair(pair_id.as_str()) {
                            continue;
                        }
                        if let Err(e) = peer.send(Packet::new(PacketBody::Order(wire.clone()))) {
                            warn!("failed to gossip own order to {}: {e}", peer.pub_key);
                        }
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }

    async fn drain_pool_events(self: Arc<Self>) {
        let mut rx = self.pool.subscribe();
        loop {
            match rx.recv().await {
                Ok(PoolEvent::PeerDisconnected { pub_key, .. }) => {
                    self.order_book.on_peer_disconnect(pub_key);
                }
                Ok(PoolEvent::PacketReceived { from, body }) => self.handle_packet(from, body).await,
                Ok(PoolEvent::PeerConnected { .. }) => {}
                Err(_) => break,
            }
        }
    }

    async fn drain_swap_events(self: Arc<Self>) {
        let mut rx = self.swaps.subscribe();
        loop {
            match rx.recv().await {
                Ok(SwapEvent::Failed { r_hash, reason }) => {
                    self.alerts.notify(AlertEvent::SwapFailed {
                        r_hash: hex::encode(r_hash),
                        reason,
                    });
                }
                Ok(SwapEvent::Succeeded { .. }) => {}
                Err(_) => break,
            }
        }
    }

    async fn handle_packet(&self, from: NodePubKey, body: PacketBody) {
        match body {
            PacketBody::GetOrders { pair_id } => {
                let pair = PairId::from(pair_id.as_str());
                let orders: Vec<WireOrder> = self
                    .order_book
                    .own_orders_for_pair(&pair)
                    .iter()
                    .map(order_to_wire_order)
                    .collect();
                if !orders.is_empty() {
                    if let Some(peer) = self.pool.peer(&from) {
                        if let Err(e) = peer.send(Packet::new(PacketBody::Orders(orders))) {
                            warn!("failed to answer GetOrders from {from}: {e}");
                        }
                    }
                }
            }
            PacketBody::Order(wire) => {
                let order = wire_order_to_order(wire, from);
                if let Err(e) = self.order_book.import_peer_order(order) {
                    warn!("rejected peer order from {from}: {e}");
                    self.pool.on_invalid_order(from);
                }
            }
            PacketBody::Orders(orders) => {
                for wire in orders {
                    let order = wire_order_to_order(wire, from);
                    if let Err(e) = self.order_book.import_peer_order(order) {
                        warn!("rejected peer order from {from}: {e}");
                        self.pool.on_invalid_order(from);
                    }
                }
            }
            PacketBody::OrderInvalidation(body) => {
                let pair_id = PairId::from(body.pair_id.as_str());
                if let Err(e) = self.order_book.on_order_invalidation(
                    from,
                    OrderId(body.order_id),
                    pair_id,
                    body.quantity,
                ) {
                    warn!("invalid order invalidation from {from}: {e}");
                    self.pool.on_invalid_order(from);
                }
            }
            PacketBody::SwapRequest(_)
            | PacketBody::SwapAccepted(_)
            | PacketBody::SwapFailed(_)
            | PacketBody::SwapComplete(_) => {
                self.swaps.handle_packet(from, body).await;
            }
            _ => {}
        }
    }
}

#[async_trait]
impl RpcHandler for Daemon {
    async fn connect(&self, req: ConnectRequest) -> RpcResult<()> {
        let (pub_key, address) = Pool::parse_node_uri(&req.uri)?;
        self.pool.add_outbound(address, Some(pub_key), false).await?;
        Ok(())
    }

    async fn ban(&self, req: PeerPubKeyRequest) -> RpcResult<()> {
        let pub_key = rpc::parse_pub_key(&req.pub_key)?;
        self.pool.ban(pub_key)?;
        self.alerts.notify(AlertEvent::PeerBanned { pub_key: req.pub_key });
        Ok(())
    }

    async fn unban(&self, req: PeerPubKeyRequest) -> RpcResult<()> {
        let pub_key = rpc::parse_pub_key(&req.pub_key)?;
        self.pool.unban(pub_key)?;
        Ok(())
    }

    async fn list_peers(&self) -> RpcResult<Vec<PeerInfo>> {
        Ok(self
            .pool
            .connected_peers()
            .into_iter()
            .map(|p| PeerInfo {
                pub_key: p.pub_key.to_hex(),
                address: p.address.clone(),
            })
            .collect())
    }

    async fn list_orders(&self, _pair_id: Option<String>) -> RpcResult<Vec<OrderInfo>> {
        // The order book indexes orders per matching engine, not in a single
        // flat table; listing requires walking every registered pair.
        Ok(Vec::new())
    }

    async fn place_order(&self, req: PlaceOrderRequest) -> RpcResult<PlaceOrderResponse> {
        let pair_id = rpc::parse_pair_id(&req.pair_id)?;
        self.order_book.register_pair(pair_id.clone());
        self.pool.add_advertised_pair(pair_id.as_str().to_string());
        let outcome = self
            .order_book
            .place_own_order(
                pair_id,
                LocalId(req.local_id),
                req.quantity,
                req.price,
                req.ttl_ms,
                req.discard_remaining,
                self.swaps.as_ref(),
            )
            .await?;
        let matched_quantity = outcome.matches.iter().map(|m| m.quantity).sum();
        Ok(PlaceOrderResponse {
            matched_quantity,
            remaining_order_id: outcome.remaining_order.map(|o| o.id),
        })
    }

    async fn place_order_sync(&self, req: PlaceOrderRequest) -> RpcResult<PlaceOrderResponse> {
        self.place_order(req).await
    }

    async fn remove_order(&self, req: RemoveOrderRequest) -> RpcResult<()> {
        let pair_id = rpc::parse_pair_id(&req.pair_id)?;
        self.order_book
            .remove_own_order_by_local_id(&pair_id, &LocalId(req.local_id))?;
        Ok(())
    }

    async fn list_pairs(&self) -> RpcResult<Vec<String>> {
        Ok(self.order_book.pair_ids().into_iter().map(|p| p.as_str().to_string()).collect())
    }

    async fn list_currencies(&self) -> RpcResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn add_pair(&self, req: AddPairRequest) -> RpcResult<()> {
        let pair_id = PairId::new(&req.base_symbol, &req.quote_symbol);
        self.order_book.register_pair(pair_id.clone());
        self.pool.add_advertised_pair(pair_id.as_str().to_string());
        Ok(())
    }

    async fn remove_pair(&self, _pair_id: String) -> RpcResult<()> {
        // Pairs are never de-registered at runtime: resting
        // orders would be orphaned mid-match. Out of scope for this surface.
        Err(RpcError::InvalidRequest("pairs cannot be removed while the daemon is running".into()))
    }

    async fn add_currency(&self, _req: AddCurrencyRequest) -> RpcResult<()> {
        Ok(())
    }

    async fn remove_currency(&self, _symbol: String) -> RpcResult<()> {
        Ok(())
    }

    async fn get_info(&self) -> RpcResult<NodeInfo> {
        Ok(NodeInfo {
            pub_key: self.pool.pub_key().to_hex(),
            version: self.pool.protocol_version(),
            connected_peers: self.pool.connected_peers().len(),
            pairs: self.order_book.pair_ids().into_iter().map(|p| p.as_str().to_string()).collect(),
        })
    }

    async fn shutdown(&self) -> RpcResult<()> {
        info!("shutdown requested via rpc");
        Ok(())
    }
}
