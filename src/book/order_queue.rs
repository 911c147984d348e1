//! FIFO of resting orders at a single price level.
//!
//! Grounded on the `VecDeque<OrderEntry>` per price level in the teacher's
//! `services::matching::orderbook::Orderbook`; all mutation here is expected to happen under the
//! owning book's match lock, so no internal synchronization is needed.

use std::collections::VecDeque;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::models::{Order, OrderId};

#[derive(Debug)]
pub struct OrderQueue {
    price: Decimal,
    orders: VecDeque<Arc<Order>>,
    volume: Decimal,
}

impl OrderQueue {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            volume: Decimal::ZERO,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn set_volume(&mut self, volume: Decimal) {
        self.volume = volume;
    }

    pub fn append(&mut self, order: Arc<Order>) {
        self.volume += order.remaining();
        self.orders.push_back(order);
    }

    pub fn head(&self) -> Option<&Arc<Order>> {
        self.orders.front()
    }

    pub fn pop_front(&mut self) -> Option<Arc<Order>> {
        self.orders.pop_front()
    }

    /// Bounded linear scan removal. Not on the matching hot path; kept for a future cancellation
    /// feature and for tests.
    pub fn remove_by_id(&mut self, order_id: OrderId) -> Option<Arc<Order>> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(idx)?;
        self.volume -= order.remaining();
        Some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, Side};
    use rust_decimal_macros::dec;

    fn order(vol: Decimal) -> Arc<Order> {
        Arc::new(Order::new(
            "u1",
            "AAPL",
            Side::Buy,
            OrderType::Limit,
            dec!(10),
            vol,
        ))
    }

    #[test]
    fn append_and_pop_fifo() {
        let mut q = OrderQueue::new(dec!(10));
        let a = order(dec!(3));
        let b = order(dec!(4));
        q.append(a.clone());
        q.append(b.clone());
        assert_eq!(q.volume(), dec!(7));
        assert_eq!(q.pop_front().unwrap().id, a.id);
        assert_eq!(q.pop_front().unwrap().id, b.id);
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn remove_by_id_updates_volume() {
        let mut q = OrderQueue::new(dec!(10));
        let a = order(dec!(5));
        let b = order(dec!(2));
        q.append(a.clone());
        q.append(b);
        q.remove_by_id(a.id);
        assert_eq!(q.len(), 1);
        assert_eq!(q.volume(), dec!(2));
    }
}
