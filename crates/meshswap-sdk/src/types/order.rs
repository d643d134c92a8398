use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::pair::PairId;
use super::peer::NodePubKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-assigned id, unique per node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub String);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Own orders carry a local id the caller assigned and an optional ttl; peer
/// orders carry the originating node's pubkey and a settlement destination
/// hint.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSource {
    Own {
        local_id: LocalId,
        ttl_ms: Option<u64>,
    },
    Peer {
        peer_pub_key: NodePubKey,
        destination_hint: Option<String>,
    },
}

impl OrderSource {
    pub fn is_own(&self) -> bool {
        matches!(self, OrderSource::Own { .. })
    }

    pub fn peer_pub_key(&self) -> Option<&NodePubKey> {
        match self {
            OrderSource::Peer { peer_pub_key, .. } => Some(peer_pub_key),
            OrderSource::Own { .. } => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderInvariantError {
    #[error("|quantity| ({quantity}) exceeds initial_quantity ({initial_quantity})")]
    QuantityExceedsInitial { quantity: i64, initial_quantity: u64 },

    #[error("hold ({hold}) out of range [0, |quantity|={quantity}]")]
    HoldOutOfRange { hold: u64, quantity: i64 },

    #[error("quantity is zero")]
    ZeroQuantity,
}

/// A resting bid or offer. Positive quantity = buy, negative = sell
///. `price = None` means a market order: `+inf` on the buy side,
/// `0` on the sell side, for crossing purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub pair_id: PairId,
    pub quantity: i64,
    pub price: Option<f64>,
    pub created_at_ms: i64,
    pub initial_quantity: u64,
    pub hold: u64,
    pub source: OrderSource,
}

impl Order {
    pub fn side(&self) -> Side {
        if self.quantity >= 0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn abs_quantity(&self) -> u64 {
        self.quantity.unsigned_abs()
    }

    /// Price used for crossing comparisons: market buys sort as `+inf`,
    /// market sells as `0`.
    pub fn crossing_price(&self) -> f64 {
        match (self.price, self.side()) {
            (Some(p), _) => p,
            (None, Side::Buy) => f64::INFINITY,
            (None, Side::Sell) => 0.0,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }

    /// Checks the invariants from the design:
    /// `|quantity| <= initialQuantity`, `0 <= hold <= |quantity|`.
    pub fn validate_invariants(&self) -> Result<(), OrderInvariantError> {
        let abs_qty = self.abs_quantity();
        if abs_qty > self.initial_quantity {
            return Err(OrderInvariantError::QuantityExceedsInitial {
                quantity: self.quantity,
                initial_quantity: self.initial_quantity,
            });
        }
        if self.hold > abs_qty {
            return Err(OrderInvariantError::HoldOutOfRange {
                hold: self.hold,
                quantity: self.quantity,
            });
        }
        Ok(())
    }

    /// Splits this order into a `target` of `target_abs_qty` (absolute
    /// units, same sign as `self`) consumed by a match, and a `remaining`
    /// order with the rest. The `remaining` half keeps this order's id (the
    /// resting order is one continuously-updated entity from a peer/gossip
    /// point of view); `target` mints a fresh id since it becomes its own
    /// match record (Open Question (a) in DESIGN.md).
    ///
    /// `target_abs_qty` must not exceed `|self.quantity|` — a programming
    /// error if it does (`InvalidSplit` at the matching-engine layer, which
    /// is the only caller).
    pub fn split(&self, target_abs_qty: u64) -> (Order, Option<Order>) {
        debug_assert!(target_abs_qty <= self.abs_quantity());
        let sign: i64 = if self.quantity >= 0 { 1 } else { -1 };
        let remaining_abs = self.abs_quantity() - target_abs_qty;

        let target = Order {
            id: OrderId::new(),
            pair_id: self.pair_id.clone(),
            quantity: sign * target_abs_qty as i64,
            price: self.price,
            created_at_ms: self.created_at_ms,
            initial_quantity: self.initial_quantity,
            hold: self.hold.min(target_abs_qty),
            source: self.source.clone(),
        };

        if remaining_abs == 0 {
            return (target, None);
        }

        let remaining = Order {
            id: self.id,
            pair_id: self.pair_id.clone(),
            quantity: sign * remaining_abs as i64,
            price: self.price,
            created_at_ms: self.created_at_ms,
            initial_quantity: self.initial_quantity,
            hold: self.hold.saturating_sub(target_abs_qty),
            source: self.source.clone(),
        };

        (target, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own_order(quantity: i64, initial_quantity: u64) -> Order {
        Order {
            id: OrderId::new(),
            pair_id: PairId::new("BTC", "ETH"),
            quantity,
            price: Some(5.0),
            created_at_ms: 1000,
            initial_quantity,
            hold: 0,
            source: OrderSource::Own {
                local_id: LocalId("l1".into()),
                ttl_ms: None,
            },
        }
    }

    #[test]
    fn validate_rejects_quantity_exceeding_initial() {
        let order = own_order(10, 5);
        assert_eq!(
            order.validate_invariants(),
            Err(OrderInvariantError::QuantityExceedsInitial {
                quantity: 10,
                initial_quantity: 5
            })
        );
    }

    #[test]
    fn validate_rejects_hold_exceeding_quantity() {
        let mut order = own_order(10, 10);
        order.hold = 11;
        assert!(order.validate_invariants().is_err());
    }

    #[test]
    fn split_preserves_total_quantity() {
        let order = own_order(10, 10);
        let (target, remaining) = order.split(4);
        assert_eq!(target.quantity, 4);
        let remaining = remaining.unwrap();
        assert_eq!(remaining.quantity, 6);
        assert_eq!(target.abs_quantity() + remaining.abs_quantity(), order.abs_quantity());
        assert_ne!(target.id, order.id);
        assert_eq!(remaining.id, order.id);
    }

    #[test]
    fn split_full_quantity_leaves_no_remainder() {
        let order = own_order(10, 10);
        let (target, remaining) = order.split(10);
        assert_eq!(target.quantity, 10);
        assert!(remaining.is_none());
    }

    #[test]
    fn market_buy_crosses_at_infinite_price() {
        let mut order = own_order(10, 10);
        order.price = None;
        assert_eq!(order.crossing_price(), f64::INFINITY);
    }

    #[test]
    fn market_sell_crosses_at_zero_price() {
        let mut order = own_order(-10, 10);
        order.price = None;
        assert_eq!(order.crossing_price(), 0.0);
    }
}
