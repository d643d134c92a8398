use crate::matching::Match;
use crate::types::{NodePubKey, Order, OrderId, PairId};

/// Typed event stream: one `broadcast` channel per `OrderBook`, consumers
/// subscribe rather than register callbacks.
#[derive(Debug, Clone)]
pub enum OrderBookEvent {
    /// A peer order was accepted into the book.
    PeerOrderIncoming { pair_id: PairId, order: Order },
    /// A peer order was removed or decremented, by disconnect or explicit
    /// invalidation.
    PeerOrderInvalidation {
        pair_id: PairId,
        order_id: OrderId,
        peer_pub_key: NodePubKey,
    },
    /// An own order's unmatched remainder was enqueued and should be
    /// gossiped to peers advertising this pair.
    OwnOrderBroadcast { pair_id: PairId, order: Order },
    /// A match was produced; one event per `Match` so subscribers don't have
    /// to unpack a batch.
    OrderMatched { pair_id: PairId, matched: Match },
}
