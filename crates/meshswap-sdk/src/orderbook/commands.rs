//! Breaks the OrderBook <-> Swaps cycle: neither module owns the other.
//! The book asks Swaps to initiate
//! a deal for each match it produces; Swaps asks the book to reserve/release
//! holds against in-flight swaps. Both directions are small trait objects
//! constructed once at daemon startup and wired together, not concrete
//! dependencies either crate module imports from the other.

use async_trait::async_trait;

use crate::matching::Match;
use crate::types::{Order, OrderId, PairId};

#[async_trait]
pub trait SwapInitiator: Send + Sync {
    /// Called once per `Match` emitted by a `placeLimit`/`placeMarket` call.
    /// Errors are logged by the caller; a failed initiation does not unwind
    /// the order placement, which has already committed the match.
    async fn initiate_swap(&self, pair_id: PairId, matched: Match);
}

#[async_trait]
pub trait HoldController: Send + Sync {
    /// Increments `hold` on an own order by `quantity` before a swap begins
    ///.
    async fn reserve_hold(&self, order_id: OrderId, quantity: u64);

    /// Releases a previously reserved hold without consuming the order
    /// (swap failed before any funds moved).
    async fn release_hold(&self, order_id: OrderId, quantity: u64);

    /// Permanently consumes `quantity` from both `quantity` and `hold`
    /// (swap completed successfully).
    async fn settle_hold(&self, order_id: OrderId, quantity: u64);

    /// Reads a resting order's current state; used by Swaps to validate an
    /// incoming `SwapRequest` against the maker order it names.
    fn get_order(&self, order_id: OrderId) -> Option<Order>;
}
