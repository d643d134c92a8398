//! RPC surface *interface*: the operations an external CLI or
//! GUI drives the daemon through, plus their request/response payloads.
//!
//! This module specifies the trait and types only — no concrete transport
//! (gRPC/JSON-RPC/HTTP) is wired up; that is explicitly out of scope.
//! `daemon::Daemon` implements this trait directly today, ready to sit
//! behind whatever transport a deployment chooses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshswap_sdk::types::{NodePubKey, OrderId, PairId};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error(transparent)]
    OrderBook(#[from] meshswap_sdk::orderbook::OrderBookError),

    #[error(transparent)]
    Pool(#[from] meshswap_sdk::p2p::PoolError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// `<pubkey-hex>@host:port`, parsed with `Pool::parse_node_uri`.
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerPubKeyRequest {
    pub pub_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub pair_id: String,
    pub local_id: String,
    /// Positive for buy, negative for sell.
    pub quantity: i64,
    pub price: Option<f64>,
    pub ttl_ms: Option<u64>,
    /// True for market orders: unfilled remainder is discarded, not rested.
    pub discard_remaining: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub matched_quantity: u64,
    pub remaining_order_id: Option<OrderId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveOrderRequest {
    pub pair_id: String,
    pub local_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPairRequest {
    pub base_symbol: String,
    pub quote_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCurrencyRequest {
    pub symbol: String,
    pub decimal_places: u8,
    pub swap_client: meshswap_sdk::types::SwapClientKind,
    pub token_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub pub_key: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    pub id: String,
    pub pair_id: String,
    pub quantity: i64,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub pub_key: String,
    pub version: &'static str,
    pub connected_peers: usize,
    pub pairs: Vec<String>,
}

/// A completed or failed swap, pushed to `subscribeSwaps`/`subscribeSwapFailures`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwapNotification {
    Succeeded { r_hash: String },
    Failed { r_hash: String, reason: String },
}

/// Every method here corresponds 1:1 to an operation the design lists.
/// Implementors own whatever cancellation/deadline policy the transport
/// layer needs; this trait itself carries no timeout — callers apply one.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn connect(&self, req: ConnectRequest) -> RpcResult<()>;
    async fn ban(&self, req: PeerPubKeyRequest) -> RpcResult<()>;
    async fn unban(&self, req: PeerPubKeyRequest) -> RpcResult<()>;
    async fn list_peers(&self) -> RpcResult<Vec<PeerInfo>>;

    async fn list_orders(&self, pair_id: Option<String>) -> RpcResult<Vec<OrderInfo>>;
    async fn place_order(&self, req: PlaceOrderRequest) -> RpcResult<PlaceOrderResponse>;
    /// Same as `place_order` but does not return until the order is either
    /// fully matched or fully at rest.
    async fn place_order_sync(&self, req: PlaceOrderRequest) -> RpcResult<PlaceOrderResponse>;
    async fn remove_order(&self, req: RemoveOrderRequest) -> RpcResult<()>;

    async fn list_pairs(&self) -> RpcResult<Vec<String>>;
    async fn list_currencies(&self) -> RpcResult<Vec<String>>;
    async fn add_pair(&self, req: AddPairRequest) -> RpcResult<()>;
    async fn remove_pair(&self, pair_id: String) -> RpcResult<()>;
    async fn add_currency(&self, req: AddCurrencyRequest) -> RpcResult<()>;
    async fn remove_currency(&self, symbol: String) -> RpcResult<()>;

    async fn get_info(&self) -> RpcResult<NodeInfo>;
    async fn shutdown(&self) -> RpcResult<()>;
}

pub(crate) fn parse_pair_id(s: &str) -> RpcResult<PairId> {
    let (base, quote) = s
        .split_once('/')
        .ok_or_else(|| RpcError::InvalidRequest(format!("malformed pair id: {s}")))?;
    Ok(PairId::new(base, quote))
}

pub(crate) fn parse_pub_key(s: &str) -> RpcResult<NodePubKey> {
    let bytes = hex::decode(s).map_err(|_| RpcError::InvalidRequest(format!("bad pubkey hex: {s}")))?;
    let key = secp256k1::PublicKey::from_slice(&bytes)
        .map_err(|_| RpcError::InvalidRequest(format!("bad pubkey: {s}")))?;
    Ok(NodePubKey::from_public_key(key))
}
