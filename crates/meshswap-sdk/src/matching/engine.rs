use crate::types::{Order, OrderId, PairId, Side};

use super::error::MatchError;
use super::queues::PriceQueue;

/// One completed crossing between a resting maker and an incoming taker,
/// both already split down to the matched quantity. `maker_order_id` and
/// `taker_order_id` are the *original* (pre-split) ids each side rests
/// under in `OrderBook::order_pairs` — not `maker.id`/`taker.id`, which are
/// the synthetic ids `Order::split` mints for the consumed portion.
#[derive(Debug, Clone)]
pub struct Match {
    pub maker: Order,
    pub taker: Order,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub quantity: u64,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matches: Vec<Match>,
    pub remaining_order: Option<Order>,
}

/// Per-pair matching engine. Callers hold the pair's lock for the full
/// duration of a `match_or_add_own_order` call (the design: "a
/// match-and-place operation holds the pair lock end-to-end").
pub struct MatchingEngine {
    pair_id: PairId,
    buy: PriceQueue,
    sell: PriceQueue,
}

fn crosses(buy_price: f64, sell_price: f64) -> bool {
    buy_price >= sell_price
}

impl MatchingEngine {
    pub fn new(pair_id: PairId) -> Self {
        Self {
            pair_id,
            buy: PriceQueue::new(),
            sell: PriceQueue::new(),
        }
    }

    fn check_pair(&self, order: &Order) -> Result<(), MatchError> {
        if order.pair_id != self.pair_id {
            return Err(MatchError::PairMismatch {
                expected: self.pair_id.clone(),
                got: order.pair_id.clone(),
            });
        }
        Ok(())
    }

    fn opposite_side(&self, side: Side) -> &PriceQueue {
        match side {
            Side::Buy => &self.sell,
            Side::Sell => &self.buy,
        }
    }

    fn same_side_mut(&mut self, side: Side) -> &mut PriceQueue {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    fn opposite_side_mut(&mut self, side: Side) -> &mut PriceQueue {
        match side {
            Side::Buy => &mut self.sell,
            Side::Sell => &mut self.buy,
        }
    }

    /// Crosses `order` against the opposite queue until it is exhausted or
    /// no crossable head remains; if a residual remains and
    /// `discard_remaining` is false, the residual is enqueued on its own
    /// side and also returned.
    pub fn match_or_add_own_order(
        &mut self,
        order: Order,
        discard_remaining: bool,
    ) -> Result<MatchOutcome, MatchError> {
        self.check_pair(&order)?;
        let side = order.side();
        let taker_price = order.crossing_price();
        let taker_order_id = order.id;
        let mut outcome = MatchOutcome::default();
        let mut taker_remaining: Option<Order> = Some(order);

        while let Some(remaining) = taker_remaining.take() {
            let remaining_abs = remaining.abs_quantity();
            if remaining_abs == 0 {
                break;
            }

            let head_crosses = match self.opposite_side(side).peek_head() {
                Some(head) => match side {
                    Side::Buy => crosses(taker_price, head.crossing_price()),
                    Side::Sell => crosses(head.crossing_price(), taker_price),
                },
                None => false,
            };
            if !head_crosses {
                taker_remaining = Some(remaining);
                break;
            }

            let head_abs = self
                .opposite_side(side)
                .peek_head()
                .expect("checked above")
                .abs_quantity();
            let match_qty = remaining_abs.min(head_abs);
            let maker_order_id = self
                .opposite_side(side)
                .peek_head()
                .expect("checked above")
                .id;

            let maker = self
                .opposite_side_mut(side)
                .consume_head(match_qty)
                .expect("head existed");

            let (taker_target, taker_leftover) = remaining.split(match_qty);
            taker_remaining = taker_leftover;

            outcome.matches.push(Match {
                maker,
                taker: taker_target,
                maker_order_id,
                taker_order_id,
                quantity: match_qty,
            });
        }

        if let Some(remaining) = taker_remaining {
            if discard_remaining {
                outcome.remaining_order = None;
            } else {
                self.same_side_mut(side).insert(remaining.clone());
                outcome.remaining_order = Some(remaining);
            }
        }

        Ok(outcome)
    }

    pub fn add_peer_order(&mut self, order: Order) -> Result<(), MatchError> {
        self.check_pair(&order)?;
        self.same_side_mut(order.side()).insert(order);
        Ok(())
    }

    pub fn remove_own_order(&mut self, id: OrderId) -> Option<Order> {
        self.buy.remove(id).or_else(|| self.sell.remove(id))
    }

    pub fn remove_peer_order(&mut self, id: OrderId, decrease_by: Option<u64>) -> Option<Order> {
        match decrease_by {
            Some(qty) => self
                .buy
                .decrease(id, qty)
                .or_else(|| self.sell.decrease(id, qty)),
            None => self.buy.remove(id).or_else(|| self.sell.remove(id)),
        }
    }

    pub fn remove_peer_orders(&mut self, mut predicate: impl FnMut(&Order) -> bool) -> Vec<Order> {
        let mut removed = self.buy.remove_where(&mut predicate);
        removed.extend(self.sell.remove_where(&mut predicate));
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        if self.buy.get(id).is_some() {
            self.buy.get_mut(id)
        } else {
            self.sell.get_mut(id)
        }
    }

    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        self.buy.get(id).or_else(|| self.sell.get(id))
    }

    /// Every resting own order on either side, for `GetOrders` responses.
    pub fn own_orders(&self) -> Vec<Order> {
        self.buy
            .iter()
            .chain(self.sell.iter())
            .filter(|o| o.source.is_own())
            .cloned()
            .collect()
    }

    /// Increments `hold` on a resting own order by `qty` (the design hold
    /// discipline), clamped so `hold` never exceeds `|quantity|`.
    pub fn reserve_hold(&mut self, id: OrderId, qty: u64) -> bool {
        match self.order_mut(id) {
            Some(order) => {
                order.hold = (order.hold + qty).min(order.abs_quantity());
                true
            }
            None => false,
        }
    }

    pub fn release_hold(&mut self, id: OrderId, qty: u64) -> bool {
        match self.order_mut(id) {
            Some(order) => {
                order.hold = order.hold.saturating_sub(qty);
                true
            }
            None => false,
        }
    }

    /// Permanently consumes `qty` from both `quantity` and `hold` on swap
    /// completion; removes the order outright once exhausted.
    pub fn settle_hold(&mut self, id: OrderId, qty: u64) -> bool {
        let Some(order) = self.order_mut(id) else {
            return false;
        };
        let sign: i64 = if order.quantity >= 0 { 1 } else { -1 };
        let new_abs = order.abs_quantity().saturating_sub(qty);
        order.hold = order.hold.saturating_sub(qty);
        order.quantity = sign * new_abs as i64;
        if new_abs == 0 {
            self.remove_own_order(id);
        }
        true
    }
}
