use serde::{Deserialize, Serialize};

use super::order::OrderId;
use super::pair::PairId;
use super::peer::NodePubKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapRole {
    Maker,
    Taker,
}

/// Per-leg progress through the settlement protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapPhase {
    Created,
    SwapRequested,
    SwapAccepted,
    SendingPayment,
    PaymentReceived,
    SwapCompleted,
}

/// Coarse lifecycle bucket, independent of `phase`, used to decide whether a
/// deal needs recovery scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapState {
    Active,
    Error,
    Recovered,
    Completed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapState::Completed | SwapState::Error)
    }
}

/// A 32-byte sha256 payment hash / preimage. Stored as fixed arrays rather
/// than `Vec<u8>` since both are always exactly 32 bytes on the wire.
pub type Hash32 = [u8; 32];

#[derive(Debug, Clone, PartialEq)]
pub struct SwapDeal {
    pub r_hash: Hash32,
    pub r_preimage: Option<Hash32>,
    pub role: SwapRole,
    pub phase: SwapPhase,
    pub state: SwapState,

    pub pair_id: PairId,
    pub quantity: u64,
    pub price: f64,

    pub peer_pub_key: NodePubKey,

    pub maker_currency: String,
    pub taker_currency: String,
    pub maker_units: u64,
    pub taker_units: u64,
    pub maker_cltv_delta: u32,
    pub taker_cltv_delta: u32,

    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,

    pub created_at_ms: i64,
    pub executed_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
}

impl SwapDeal {
    /// CLTV safety invariant from the design: if the maker→taker HTLC
    /// times out, the taker→maker HTLC must still have room to be claimed
    /// or refunded safely.
    pub fn cltv_deltas_are_safe(&self, safety_margin: u32) -> bool {
        self.taker_cltv_delta > self.maker_cltv_delta + safety_margin
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
