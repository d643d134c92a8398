use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use parking_lot::RwLock;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use meshswap_store::{NodeRecord, NodeStore};

use crate::clock::Clock;
use crate::types::{DisconnectReason, NodePubKey, PeerState};

use super::codec::PacketCodec;
use super::error::PoolError;
use super::handshake::{build_hello, verify_hello, PROTOCOL_VERSION};
use super::packet::{DisconnectCode, DisconnectingBody, Packet, PacketBody};
use super::peer::PeerHandle;
use super::reconnect::Backoff;
use super::reputation::{ReputationConfig, ReputationEvent};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// How often a connected peer's link is pinged, and how long a missing
/// `Pong` is tolerated before the link is considered dead.
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(90);

/// Outbound reconnect attempts for a reconnect-worthy disconnect before the
/// pool gives up on that peer (the design: retry with doubling backoff,
/// capped, not forever).
const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// Deadline for the peer to send its `Hello` after we send ours; a silent
/// peer is dropped rather than hanging the handshake task forever.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum PoolEvent {
    PeerConnected {
        pub_key: NodePubKey,
        pairs: Vec<String>,
    },
    PeerDisconnected {
        pub_key: NodePubKey,
        reason: DisconnectReason,
    },
    PacketReceived {
        from: NodePubKey,
        body: PacketBody,
    },
}

/// Node identity and the global set of peer connections.
pub struct Pool {
    secret_key: SecretKey,
    pub_key: NodePubKey,
    network_id: String,
    advertised_addresses: Vec<String>,
    advertised_pairs: RwLock<Vec<String>>,
    allow_tor: bool,

    peers: RwLock<HashMap<NodePubKey, Arc<PeerHandle>>>,
    node_store: Arc<dyn NodeStore>,
    reputation: ReputationConfig,
    clock: Arc<dyn Clock>,

    events: broadcast::Sender<PoolEvent>,
}

impl Pool {
    pub fn new(
        secret_key: SecretKey,
        network_id: String,
        advertised_addresses: Vec<String>,
        advertised_pairs: Vec<String>,
        allow_tor: bool,
        node_store: Arc<dyn NodeStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let secp = Secp256k1::new();
        let pub_key = NodePubKey::from_public_key(PublicKey::from_secret_key(&secp, &secret_key));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            secret_key,
            pub_key,
            network_id,
            advertised_addresses,
            advertised_pairs: RwLock::new(advertised_pairs),
            allow_tor,
            peers: RwLock::new(HashMap::new()),
            node_store,
            reputation: ReputationConfig::default(),
            clock,
            events,
        }
    }

    pub fn pub_key(&self) -> NodePubKey {
        self.pub_key
    }

    /// Registers a pair as one this node trades, so future handshakes
    /// advertise it in `Hello.pairs` and future connections get a
    /// `GetOrders` bootstrap for it.
    pub fn add_advertised_pair(&self, pair_id: String) {
        let mut pairs = self.advertised_pairs.write();
        if !pairs.iter().any(|p| p == &pair_id) {
            pairs.push(pair_id);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.events.send(event);
    }

    pub fn peer(&self, pub_key: &NodePubKey) -> Option<Arc<PeerHandle>> {
        self.peers.read().get(pub_key).cloned()
    }

    pub fn connected_peers(&self) -> Vec<Arc<PeerHandle>> {
        self.peers.read().values().cloned().collect()
    }

    fn is_banned(&self, pub_key: NodePubKey) -> bool {
        self.node_store.is_banned(&pub_key.to_hex()).unwrap_or(false)
    }

    pub fn ban(&self, pub_key: NodePubKey) -> Result<(), PoolError> {
        self.node_store
            .ban(&pub_key.to_hex())
            .map_err(|e| PoolError::MalformedPacket(e.to_string()))?;
        self.disconnect(pub_key, DisconnectCode::Banned);
        Ok(())
    }

    pub fn unban(&self, pub_key: NodePubKey) -> Result<(), PoolError> {
        self.node_store
            .unban(&pub_key.to_hex())
            .map_err(|e| PoolError::MalformedPacket(e.to_string()))
    }

    fn record_reputation(&self, pub_key: NodePubKey, event: ReputationEvent) {
        let delta = event.delta(&self.reputation);
        let now = self.clock.now_ms();
        match self.node_store.apply_reputation_delta(&pub_key.to_hex(), delta, now) {
            Ok(score) if score <= self.reputation.ban_threshold => {
                if let Err(e) = self.ban(pub_key) {
                    warn!("failed to persist automatic ban of {pub_key}: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!("failed to record reputation event for {pub_key}: {e}"),
        }
    }

    /// `connect(nodeUri)`: parses `<nodePubKey>@<host>:<port>`.
    pub fn parse_node_uri(uri: &str) -> Result<(NodePubKey, String), PoolError> {
        let (pub_key_hex, address) = uri
            .split_once('@')
            .ok_or_else(|| PoolError::MalformedUri(uri.to_string()))?;
        let bytes = hex::decode(pub_key_hex)
            .map_err(|_| PoolError::MalformedUri(uri.to_string()))?;
        let key = PublicKey::from_slice(&bytes)
            .map_err(|_| PoolError::MalformedUri(uri.to_string()))?;
        Ok((NodePubKey::from_public_key(key), address.to_string()))
    }

    /// `addOutbound(address, expectedPubKey, retry, allowTor)`.
    pub async fn add_outbound(
        self: &Arc<Self>,
        address: String,
        expected_pub_key: Option<NodePubKey>,
        allow_tor: bool,
    ) -> Result<NodePubKey, PoolError> {
        if !allow_tor && !self.allow_tor && address.ends_with(".onion") {
            return Err(PoolError::TorDisabled);
        }
        if let Some(expected) = expected_pub_key {
            if expected == self.pub_key {
                return Err(PoolError::ConnectToSelf);
            }
            if self.peers.read().contains_key(&expected) {
                return Err(PoolError::AlreadyConnected(expected));
            }
            if self.is_banned(expected) {
                return Err(PoolError::Banned(expected));
            }
        }

        let stream = TcpStream::connect(&address).await?;
        self.handshake_and_spawn(stream, address, true, expected_pub_key)
            .await
    }

    /// Server-side accept loop entry point; intended to run as a background
    /// task (`tokio::spawn(pool.clone().run_listener(addr))`).
    pub async fn run_listener(self: Arc<Self>, bind_addr: String) -> Result<(), PoolError> {
        let listener = TcpListener::bind(&bind_addr).await?;
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let pool = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = pool.handshake_and_spawn(stream, peer_addr.to_string(), false, None).await {
                    debug!("inbound handshake from {peer_addr} failed: {e}");
                }
            });
        }
    }

    async fn handshake_and_spawn(
        self: &Arc<Self>,
        stream: TcpStream,
        address: String,
        outbound: bool,
        expected_pub_key: Option<NodePubKey>,
    ) -> Result<NodePubKey, PoolError> {
        let mut framed = Framed::new(stream, PacketCodec);

        let hello = build_hello(
            self.pub_key,
            &self.network_id,
            self.advertised_addresses.clone(),
            self.advertised_pairs.read().clone(),
        );
        framed.send(hello).await?;

        let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, framed.next())
            .await
            .map_err(|_| PoolError::HandshakeTimeout)?
            .ok_or(PoolError::HandshakeTimeout)??;

        let hello_body = match first.body {
            PacketBody::Hello(body) => body,
            _ => return Err(PoolError::MalformedPacket("expected Hello".into())),
        };

        verify_hello(&hello_body, self.pub_key, expected_pub_key, |pk| {
            self.is_banned(pk)
        })?;

        if hello_body.network_id != self.network_id {
            return Err(PoolError::MalformedPacket(format!(
                "network id mismatch: {} != {}",
                hello_body.network_id, self.network_id
            )));
        }
        if hello_body.version != PROTOCOL_VERSION {
            return Err(PoolError::IncompatibleProtocolVersion(hello_body.version.clone(), PROTOCOL_VERSION));
        }
        if !outbound && self.peers.read().contains_key(&hello_body.node_pub_key) {
            return Err(PoolError::AlreadyConnected(hello_body.node_pub_key));
        }

        let pub_key = hello_body.node_pub_key;
        self.node_store
            .upsert_node(NodeRecord::new(pub_key.to_hex(), self.clock.now_ms()))
            .map_err(|e| PoolError::MalformedPacket(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(PeerHandle::new(
            pub_key,
            address.clone(),
            outbound,
            hello_body.pairs.clone(),
            tx,
        ));
        self.peers.write().insert(pub_key, Arc::clone(&handle));
        self.emit(PoolEvent::PeerConnected {
            pub_key,
            pairs: hello_body.pairs,
        });

        // Bootstrap gossip: ask the peer for its current resting orders on
        // every pair this node trades, rather than waiting for its next
        // own-order broadcast.
        for pair_id in self.advertised_pairs.read().clone() {
            if let Err(e) = handle.send(Packet::new(PacketBody::GetOrders { pair_id })) {
                debug!("failed to send GetOrders to {pub_key}: {e}");
            }
        }

        self.spawn_peer_io(pub_key, address, outbound, framed, rx);

        Ok(pub_key)
    }

    /// One task per peer connection: drains the outbound
    /// packet queue into the socket, dispatches inbound packets onto the
    /// pool's event stream, and keeps the link alive with a ping/pong
    /// heartbeat, until either side closes, a malformed frame is seen, or
    /// the peer misses too many pongs.
    fn spawn_peer_io(
        self: &Arc<Self>,
        pub_key: NodePubKey,
        address: String,
        outbound: bool,
        framed: Framed<TcpStream, PacketCodec>,
        mut rx: mpsc::UnboundedReceiver<Packet>,
    ) {
        let (mut sink, mut stream) = framed.split();
        let pool = Arc::clone(self);

        tokio::spawn(async move {
            let mut reason = DisconnectReason::ConnectionLost;
            let mut disconnect_code: Option<DisconnectCode> = None;
            let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
            ping_ticker.tick().await; // first tick fires immediately
            let mut awaiting_pong = false;
            let mut last_pong = Instant::now();

            loop {
                tokio::select! {
                    _ = ping_ticker.tick() => {
                        if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                            debug!("peer {pub_key} missed its pong, dropping link");
                            reason = DisconnectReason::ConnectionLost;
                            disconnect_code = Some(DisconnectCode::ConnectionTimeout);
                            break;
                        }
                        if let Err(e) = sink.send(Packet::new(PacketBody::Ping)).await {
                            debug!("ping to {pub_key} failed: {e}");
                            break;
                        }
                        awaiting_pong = true;
                    }
                    outgoing = rx.recv() => {
                        match outgoing {
                            Some(packet) => {
                                if let Err(e) = sink.send(packet).await {
                                    debug!("write to {pub_key} failed: {e}");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(packet)) => match packet.body {
                                PacketBody::Disconnecting(body) => {
                                    reason = map_disconnect_reason(body.reason);
                                    disconnect_code = Some(body.reason);
                                    break;
                                }
                                PacketBody::Ping => {
                                    if let Err(e) = sink.send(Packet::new(PacketBody::Pong)).await {
                                        debug!("pong to {pub_key} failed: {e}");
                                        break;
                                    }
                                }
                                PacketBody::Pong => {
                                    awaiting_pong = false;
                                    last_pong = Instant::now();
                                }
                                body => {
                                    pool.emit(PoolEvent::PacketReceived { from: pub_key, body });
                                }
                            },
                            Some(Err(e)) => {
                                warn!("malformed packet from {pub_key}: {e}");
                                pool.on_malformed_packet(pub_key);
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            pool.peers.write().remove(&pub_key);
            pool.emit(PoolEvent::PeerDisconnected { pub_key, reason });

            if outbound {
                if let Some(code) = disconnect_code {
                    if code.is_reconnect_worthy() {
                        pool.schedule_reconnect(pub_key, address);
                    }
                }
            }
        });
    }

    /// Redials an outbound peer with doubling backoff after a
    /// reconnect-worthy disconnect; gives up silently after
    /// `MAX_RECONNECT_ATTEMPTS`, leaving the peer to be reached again only
    /// through an explicit `add_outbound` call.
    fn schedule_reconnect(self: &Arc<Self>, pub_key: NodePubKey, address: String) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let backoff = Backoff::default();
            for attempt in 0..MAX_RECONNECT_ATTEMPTS {
                tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
                match pool.add_outbound(address.clone(), Some(pub_key), false).await {
                    Ok(_) => return,
                    Err(PoolError::AlreadyConnected(_)) => return,
                    Err(e) => debug!("reconnect attempt {attempt} to {pub_key} failed: {e}"),
                }
            }
            warn!("giving up reconnecting to {pub_key} after {MAX_RECONNECT_ATTEMPTS} attempts");
        });
    }

    pub fn disconnect(&self, pub_key: NodePubKey, reason: DisconnectCode) {
        if let Some(handle) = self.peers.write().remove(&pub_key) {
            handle.set_state(PeerState::Disconnecting);
            let _ = handle.send(Packet::new(PacketBody::Disconnecting(DisconnectingBody {
                reason,
                message: None,
            })));
            self.emit(PoolEvent::PeerDisconnected {
                pub_key,
                reason: map_disconnect_reason(reason),
            });
        }
    }

    pub fn on_malformed_packet(&self, pub_key: NodePubKey) {
        self.record_reputation(pub_key, ReputationEvent::MalformedPacket);
    }

    pub fn on_invalid_order(&self, pub_key: NodePubKey) {
        self.record_reputation(pub_key, ReputationEvent::InvalidOrder);
    }

    pub fn protocol_version(&self) -> &'static str {
        PROTOCOL_VERSION
    }
}

fn map_disconnect_reason(code: DisconnectCode) -> DisconnectReason {
    match code {
        DisconnectCode::Banned => DisconnectReason::Banned,
        DisconnectCode::Shutdown => DisconnectReason::Requested,
        DisconnectCode::ConnectionTimeout | DisconnectCode::ResponseStalling => {
            DisconnectReason::ConnectionLost
        }
        DisconnectCode::AlreadyConnected => DisconnectReason::DuplicateConnection,
        DisconnectCode::MalformedPacket => DisconnectReason::HandshakeFailed,
        DisconnectCode::IncompatibleProtocolVersion
        | DisconnectCode::NotAcceptingConnections
        | DisconnectCode::UnexpectedIdentity
        | DisconnectCode::UnknownError => DisconnectReason::HandshakeFailed,
    }
}
