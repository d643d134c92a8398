//! Persistence interfaces.
//!
//! Persistence is an external collaborator here: interfaces only, not
//! implementations. These traits are that interface.
//! `memory::MemoryStore` is a reference implementation good
//! enough for tests and local development; a production deployment swaps it
//! for a real relational store without the rest of the daemon noticing.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What kind of swap-client backend a currency is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapClientKind {
    Htlc,
    HashlockTransfer,
}

/// Persisted currency record. Immutable once added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    pub symbol: String,
    pub decimal_places: u8,
    pub swap_client: SwapClientKind,
    pub token_address: Option<String>,
}

/// Persisted trading-pair record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub id: String,
    pub base_symbol: String,
    pub quote_symbol: String,
}

impl PairRecord {
    pub fn new(base_symbol: impl Into<String>, quote_symbol: impl Into<String>) -> Self {
        let base_symbol = base_symbol.into();
        let quote_symbol = quote_symbol.into();
        let id = format!("{base_symbol}/{quote_symbol}");
        Self {
            id,
            base_symbol,
            quote_symbol,
        }
    }
}

/// Persisted node (peer) record. Never deleted — a ban sticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub pub_key: String,
    pub addresses: Vec<String>,
    pub reputation_score: i64,
    pub banned: bool,
    pub last_seen_ms: i64,
}

impl NodeRecord {
    pub fn new(pub_key: impl Into<String>, last_seen_ms: i64) -> Self {
        Self {
            pub_key: pub_key.into(),
            addresses: Vec::new(),
            reputation_score: 0,
            banned: false,
            last_seen_ms,
        }
    }
}

/// Persisted order record (own and peer orders alike, keyed by global id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub pair_id: String,
    pub quantity: i64,
    pub initial_quantity: i64,
    pub hold: i64,
    pub price: Option<f64>,
    pub created_at_ms: i64,
    pub local_id: Option<String>,
    pub peer_pub_key: Option<String>,
}

/// Persisted swap-deal record, one row per `SwapDeal`. Carries enough of the
/// settlement-leg bookkeeping (currencies, units, cltv deltas, role) that a
/// restart can rebuild a live deal from this row alone for crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapDealRecord {
    pub r_hash: String,
    pub r_preimage: Option<String>,
    pub role: String,
    pub phase: String,
    pub state: String,
    pub quantity: i64,
    pub price: Option<f64>,
    pub pair_id: String,
    pub peer_pub_key: String,
    pub maker_order_id: Option<String>,
    pub taker_order_id: Option<String>,
    pub maker_currency: String,
    pub taker_currency: String,
    pub maker_units: i64,
    pub taker_units: i64,
    pub maker_cltv_delta: i64,
    pub taker_cltv_delta: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub trait CurrencyStore: Send + Sync {
    fn add_currency(&self, record: CurrencyRecord) -> Result<()>;
    fn get_currency(&self, symbol: &str) -> Result<Option<CurrencyRecord>>;
    fn list_currencies(&self) -> Result<Vec<CurrencyRecord>>;
}

pub trait PairStore: Send + Sync {
    fn add_pair(&self, record: PairRecord) -> Result<()>;
    fn remove_pair(&self, id: &str) -> Result<()>;
    fn get_pair(&self, id: &str) -> Result<Option<PairRecord>>;
    fn list_pairs(&self) -> Result<Vec<PairRecord>>;
}

/// The reputation / address-book "single persistent choke point".
pub trait NodeStore: Send + Sync {
    fn upsert_node(&self, record: NodeRecord) -> Result<()>;
    fn get_node(&self, pub_key: &str) -> Result<Option<NodeRecord>>;
    fn apply_reputation_delta(&self, pub_key: &str, delta: i64, now_ms: i64) -> Result<i64>;
    fn ban(&self, pub_key: &str) -> Result<()>;
    fn unban(&self, pub_key: &str) -> Result<()>;
    fn is_banned(&self, pub_key: &str) -> Result<bool>;
    fn list_nodes(&self) -> Result<Vec<NodeRecord>>;
}

pub trait OrderStore: Send + Sync {
    fn upsert_order(&self, record: OrderRecord) -> Result<()>;
    fn remove_order(&self, id: &str) -> Result<()>;
    fn get_order(&self, id: &str) -> Result<Option<OrderRecord>>;
    fn list_orders(&self) -> Result<Vec<OrderRecord>>;
}

pub trait SwapDealStore: Send + Sync {
    fn upsert_deal(&self, record: SwapDealRecord) -> Result<()>;
    fn get_deal(&self, r_hash: &str) -> Result<Option<SwapDealRecord>>;
    /// All deals whose `state` is not a terminal state — used by crash recovery.
    fn list_non_terminal_deals(&self) -> Result<Vec<SwapDealRecord>>;
    fn list_deals(&self) -> Result<Vec<SwapDealRecord>>;
}
