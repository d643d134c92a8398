use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::types::{Order, OrderId, Side};

/// Sort key for one side of a pair's book. `priority` is pre-signed so that
/// ascending iteration always yields the correct match order: buy-side
/// priority is `-price` (highest price first), sell-side priority is
/// `price` (lowest price first). Ties break on `created_at_ms` (FIFO,
/// the design property 3), then on id as a final deterministic tiebreaker.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueKey {
    priority: f64,
    created_at_ms: i64,
    id: OrderId,
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.created_at_ms.cmp(&other.created_at_ms))
            .then(self.id.0.cmp(&other.id.0))
    }
}

fn priority_for(side: Side, price: f64) -> f64 {
    match side {
        Side::Buy => -price,
        Side::Sell => price,
    }
}

/// One side (buy or sell) of a pair's order book: a priority queue keyed by
/// price/time priority, backed by an id map so single-order lookups and
/// removals don't require a queue scan.
#[derive(Debug, Default)]
pub struct PriceQueue {
    keys: BTreeMap<QueueKey, OrderId>,
    orders: HashMap<OrderId, Order>,
}

impl PriceQueue {
    pub fn new() -> Self {
        Self {
            keys: BTreeMap::new(),
            orders: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn insert(&mut self, order: Order) {
        let key = QueueKey {
            priority: priority_for(order.side(), order.crossing_price()),
            created_at_ms: order.created_at_ms,
            id: order.id,
        };
        self.keys.insert(key, order.id);
        self.orders.insert(order.id, order);
    }

    /// The order currently at the front of price/time priority.
    pub fn peek_head(&self) -> Option<&Order> {
        let (_, id) = self.keys.iter().next()?;
        self.orders.get(id)
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Mutable access to a stored order by id. Callers may freely adjust
    /// `hold`; `price`/`created_at_ms`/`id`/quantity sign must not change,
    /// or the queue's sort position would no longer match its key.
    pub fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// Replaces the stored order for `id` in place, without touching its
    /// queue position (price/createdAt don't change across a split).
    fn replace(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    fn key_for(&self, order: &Order) -> QueueKey {
        QueueKey {
            priority: priority_for(order.side(), order.crossing_price()),
            created_at_ms: order.created_at_ms,
            id: order.id,
        }
    }

    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&id)?;
        let key = self.key_for(&order);
        self.keys.remove(&key);
        Some(order)
    }

    /// Shrinks the order at `id` by `decrease_by` absolute units; removes it
    /// outright if that empties it. Returns the updated order, if any
    /// remains.
    pub fn decrease(&mut self, id: OrderId, decrease_by: u64) -> Option<Order> {
        let order = self.orders.get(&id)?;
        let remaining_abs = order.abs_quantity().saturating_sub(decrease_by);
        if remaining_abs == 0 {
            self.remove(id);
            return None;
        }
        let (_, remaining) = order.split(remaining_abs);
        let updated = remaining.expect("non-zero remaining_abs yields Some");
        self.replace(updated.clone());
        Some(updated)
    }

    /// Consumes `qty` absolute units from the head order, returning the
    /// `target` portion that was matched. Removes the head if fully
    /// consumed, otherwise re-stores the remainder under the same queue
    /// position.
    pub fn consume_head(&mut self, qty: u64) -> Option<Order> {
        let head_id = {
            let (_, id) = self.keys.iter().next()?;
            *id
        };
        let head = self.orders.get(&head_id)?.clone();
        let (target, remaining) = head.split(qty);
        match remaining {
            Some(remaining) => self.replace(remaining),
            None => {
                self.remove(head_id);
            }
        }
        Some(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Order) -> bool) -> Vec<Order> {
        let matching: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| predicate(o))
            .map(|o| o.id)
            .collect();
        matching
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }
}
