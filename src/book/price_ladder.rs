//! One side (bids or asks) of a book: a sorted map from price to the FIFO queue resting there.
//!
//! Grounded on the teacher's `bids`/`asks: RwLock<BTreeMap<PriceLevel, VecDeque<OrderEntry>>>` in
//! `services::matching::orderbook::Orderbook`, keyed directly on `rust_decimal::Decimal` instead
//! of the teacher's rescaled `PriceLevel(i64)` key — see DESIGN.md for why that rescale is not
//! carried forward.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::InvariantViolation;
use crate::models::{Order, OrderId, Side};

use super::order_queue::OrderQueue;

#[derive(Debug)]
pub struct PriceLadder {
    side: Side,
    levels: BTreeMap<Decimal, OrderQueue>,
    cumulative_volume: Decimal,
}

impl PriceLadder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            cumulative_volume: Decimal::ZERO,
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn cumulative_volume(&self) -> Decimal {
        self.cumulative_volume
    }

    pub fn reset_cumulative_volume(&mut self) {
        self.cumulative_volume = Decimal::ZERO;
    }

    pub fn append(&mut self, price: Decimal, order: Arc<Order>) {
        self.levels
            .entry(price)
            .or_insert_with(|| OrderQueue::new(price))
            .append(order);
    }

    /// Best price for this side: highest for bids, lowest for asks.
    pub fn best_price(&self) -> Option<Decimal> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Mutable access to the best queue, along with a guard closure the caller uses to remove it
    /// if it becomes empty. Returns `Err` if the ladder is non-empty in the map but the best
    /// queue it points to has no orders — an invariant violation, never expected in practice.
    pub fn with_best_queue_mut<R>(
        &mut self,
        f: impl FnOnce(&mut OrderQueue) -> R,
    ) -> Result<Option<R>, InvariantViolation> {
        let Some(price) = self.best_price() else {
            return Ok(None);
        };
        let queue = self
            .levels
            .get_mut(&price)
            .ok_or_else(|| InvariantViolation::EmptyQueueReachable(price.to_string()))?;
        if queue.is_empty() {
            return Err(InvariantViolation::EmptyQueueReachable(price.to_string()));
        }
        let result = f(queue);
        if self
            .levels
            .get(&price)
            .map(|q| q.is_empty())
            .unwrap_or(false)
        {
            self.levels.remove(&price);
        }
        Ok(Some(result))
    }

    pub fn add_cumulative_volume(&mut self, volume: Decimal) {
        self.cumulative_volume += volume;
    }

    /// Bounded scan removal, used only by the (unimplemented-on-the-hot-path) cancellation
    /// surface and by tests.
    pub fn remove(&mut self, price: Decimal, order_id: OrderId) -> Option<Arc<Order>> {
        let queue = self.levels.get_mut(&price)?;
        let removed = queue.remove_by_id(order_id);
        if queue.is_empty() {
            self.levels.remove(&price);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderType;
    use rust_decimal_macros::dec;

    fn order(price: Decimal, vol: Decimal) -> Arc<Order> {
        Arc::new(Order::new("u1", "AAPL", Side::Buy, OrderType::Limit, price, vol))
    }

    #[test]
    fn best_price_bids_is_highest() {
        let mut ladder = PriceLadder::new(Side::Buy);
        ladder.append(dec!(10), order(dec!(10), dec!(1)));
        ladder.append(dec!(12), order(dec!(12), dec!(1)));
        ladder.append(dec!(11), order(dec!(11), dec!(1)));
        assert_eq!(ladder.best_price(), Some(dec!(12)));
    }

    #[test]
    fn best_price_asks_is_lowest() {
        let mut ladder = PriceLadder::new(Side::Sell);
        ladder.append(dec!(10), order(dec!(10), dec!(1)));
        ladder.append(dec!(12), order(dec!(12), dec!(1)));
        ladder.append(dec!(9), order(dec!(9), dec!(1)));
        assert_eq!(ladder.best_price(), Some(dec!(9)));
    }

    #[test]
    fn depth_tracks_distinct_levels_and_drops_emptied_ones() {
        let mut ladder = PriceLadder::new(Side::Buy);
        ladder.append(dec!(10), order(dec!(10), dec!(1)));
        ladder.append(dec!(10), order(dec!(10), dec!(1)));
        assert_eq!(ladder.depth(), 1);
        ladder
            .with_best_queue_mut(|q| {
                q.pop_front();
                q.pop_front();
            })
            .unwrap();
        assert_eq!(ladder.depth(), 0);
    }
}
