//! The order book for one symbol: ladders, market-order backlogs, and the matching protocol.
//!
//! The matching algorithm (`place_limit`, `place_market`, `match_at_level`, the backlog-crossing
//! step) is grounded on `examples/original_source/backend/internal/orderbook/service.go`:
//! `PlaceLimitOrder`, `PlaceMarketOrder`, `matchAtPriceLevel`, `matchWithMarketOrders`. The
//! original's many small mutexes around individual fields are consolidated here into one
//! `match_lock` per book covering both ladders and both backlogs, per the concurrency
//! consolidation called out in the design notes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;

use crate::error::{BookError, ClientError, InvariantViolation};
use crate::models::{CashDelta, HoldingDelta, Order, OrderId, OrderStateUpdate, OrderType, Side};

use super::price_ladder::PriceLadder;

/// One accounting record produced per unit of matched volume.
#[derive(Debug, Clone)]
pub struct Fill {
    pub order_state: OrderStateUpdate,
    pub holding: HoldingDelta,
    pub cash: CashDelta,
}

struct MatchState {
    bids: PriceLadder,
    asks: PriceLadder,
    market_buy_backlog: VecDeque<Arc<Order>>,
    market_sell_backlog: VecDeque<Arc<Order>>,
}

impl MatchState {
    fn ladder_mut(&mut self, side: Side) -> &mut PriceLadder {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn backlog_mut(&mut self, side: Side) -> &mut VecDeque<Arc<Order>> {
        match side {
            Side::Buy => &mut self.market_buy_backlog,
            Side::Sell => &mut self.market_sell_backlog,
        }
    }
}

pub struct Book {
    pub symbol: String,
    match_state: Mutex<MatchState>,
    active_orders: DashMap<OrderId, (Side, Decimal)>,
    market_price: RwLock<Decimal>,
    poisoned: AtomicBool,
}

impl Book {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            match_state: Mutex::new(MatchState {
                bids: PriceLadder::new(Side::Buy),
                asks: PriceLadder::new(Side::Sell),
                market_buy_backlog: VecDeque::new(),
                market_sell_backlog: VecDeque::new(),
            }),
            active_orders: DashMap::new(),
            market_price: RwLock::new(Decimal::ZERO),
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn market_price(&self) -> Decimal {
        *self.market_price.read()
    }

    pub fn best_bid(&self) -> Decimal {
        self.match_state.lock().bids.best_price().unwrap_or(Decimal::ZERO)
    }

    pub fn best_ask(&self) -> Decimal {
        self.match_state.lock().asks.best_price().unwrap_or(Decimal::ZERO)
    }

    pub fn depth(&self, side: Side) -> usize {
        let state = self.match_state.lock();
        match side {
            Side::Buy => state.bids.depth(),
            Side::Sell => state.asks.depth(),
        }
    }

    pub fn backlog_len(&self, side: Side) -> usize {
        let state = self.match_state.lock();
        match side {
            Side::Buy => state.market_buy_backlog.len(),
            Side::Sell => state.market_sell_backlog.len(),
        }
    }

    /// Cumulative traded volume on each side's ladder since the last reset, used only for
    /// candle metadata.
    pub fn take_cumulative_volumes(&self) -> (Decimal, Decimal) {
        let mut state = self.match_state.lock();
        let bid_volume = state.bids.cumulative_volume();
        let ask_volume = state.asks.cumulative_volume();
        state.bids.reset_cumulative_volume();
        state.asks.reset_cumulative_volume();
        (bid_volume, ask_volume)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    pub fn place_limit(
        &self,
        user_id: impl Into<String>,
        side: Side,
        volume: Decimal,
        price: Decimal,
        on_accept: &mut impl FnMut(Arc<Order>),
        on_fill: &mut impl FnMut(Fill),
    ) -> Result<OrderId, BookError> {
        if self.is_poisoned() {
            return Err(BookError::Poisoned);
        }
        validate(volume, Some(price))?;
        let incoming = Arc::new(Order::new(
            user_id,
            self.symbol.clone(),
            side,
            OrderType::Limit,
            price,
            volume,
        ));
        let order_id = incoming.id;
        on_accept(incoming.clone());

        let mut state = self.match_state.lock();

        self.cross_backlog(&mut state, &incoming, price, on_fill);
        if incoming.remaining().is_zero() {
            return Ok(order_id);
        }

        if let Err(violation) = self.cross_ladder(&mut state, &incoming, Some(price), on_fill) {
            self.poisoned.store(true, Ordering::Release);
            return Err(violation.into());
        }

        if !incoming.remaining().is_zero() {
            state.ladder_mut(side).append(price, incoming.clone());
            self.active_orders.insert(order_id, (side, price));
        }

        Ok(order_id)
    }

    pub fn place_market(
        &self,
        user_id: impl Into<String>,
        side: Side,
        volume: Decimal,
        on_accept: &mut impl FnMut(Arc<Order>),
        on_fill: &mut impl FnMut(Fill),
    ) -> Result<OrderId, BookError> {
        if self.is_poisoned() {
            return Err(BookError::Poisoned);
        }
        validate(volume, None)?;
        let incoming = Arc::new(Order::new(
            user_id,
            self.symbol.clone(),
            side,
            OrderType::Market,
            Decimal::ZERO,
            volume,
        ));
        let order_id = incoming.id;
        on_accept(incoming.clone());

        let mut state = self.match_state.lock();
        if let Err(violation) = self.cross_ladder(&mut state, &incoming, None, on_fill) {
            self.poisoned.store(true, Ordering::Release);
            return Err(violation.into());
        }

        if !incoming.remaining().is_zero() {
            state.backlog_mut(side).push_back(incoming.clone());
        }

        Ok(order_id)
    }

    /// Step 2 of limit placement: consume the opposite backlog at the incoming order's own
    /// price, exactly as the original's `matchWithMarketOrders` does.
    fn cross_backlog(
        &self,
        state: &mut MatchState,
        incoming: &Arc<Order>,
        trade_price: Decimal,
        on_fill: &mut impl FnMut(Fill),
    ) {
        let backlog = state.backlog_mut(incoming.side.opposite());

        while !incoming.remaining().is_zero() {
            let Some(resting) = backlog.front().cloned() else {
                break;
            };
            *self.market_price.write() = trade_price;

            let fill_qty = incoming.remaining().min(resting.remaining());
            self.apply_fill(incoming, &resting, fill_qty, trade_price, on_fill);

            if resting.remaining().is_zero() {
                backlog.pop_front();
            }
        }
    }

    /// Step 3/4: walk the opposite ladder while the incoming order still crosses. `limit_price`
    /// is `None` for a market order (always crosses while the opposite side is non-empty).
    fn cross_ladder(
        &self,
        state: &mut MatchState,
        incoming: &Arc<Order>,
        limit_price: Option<Decimal>,
        on_fill: &mut impl FnMut(Fill),
    ) -> Result<(), InvariantViolation> {
        let opposite = state.ladder_mut(incoming.side.opposite());

        loop {
            if incoming.remaining().is_zero() {
                return Ok(());
            }
            let Some(best_price) = opposite.best_price() else {
                return Ok(());
            };
            if let Some(limit_price) = limit_price {
                let crosses = match incoming.side {
                    Side::Buy => limit_price >= best_price,
                    Side::Sell => limit_price <= best_price,
                };
                if !crosses {
                    return Ok(());
                }
            }

            *self.market_price.write() = best_price;
            let active_orders = &self.active_orders;
            let market_price = &self.market_price;
            let mut level_volume = Decimal::ZERO;
            let outcome = opposite.with_best_queue_mut(|queue| {
                while !incoming.remaining().is_zero() {
                    let Some(resting) = queue.head().cloned() else {
                        break;
                    };
                    let fill_qty = incoming.remaining().min(resting.remaining());
                    queue.set_volume(queue.volume() - fill_qty);
                    *market_price.write() = queue.price();

                    self.apply_fill(incoming, &resting, fill_qty, queue.price(), on_fill);
                    level_volume += fill_qty;

                    if resting.remaining().is_zero() {
                        active_orders.remove(&resting.id);
                        queue.pop_front();
                    }
                }
            })?;
            debug_assert!(outcome.is_some(), "best_price() returned a price with no queue");
            opposite.add_cumulative_volume(level_volume);
        }
    }

    fn apply_fill(
        &self,
        incoming: &Arc<Order>,
        resting: &Arc<Order>,
        qty: Decimal,
        price: Decimal,
        on_fill: &mut impl FnMut(Fill),
    ) {
        incoming.fill(qty);
        resting.fill(qty);

        for order in [incoming, resting] {
            let holding_sign = if order.side == Side::Buy { qty } else { -qty };
            let cash_sign = if order.side == Side::Buy { -qty * price } else { qty * price };
            on_fill(Fill {
                order_state: OrderStateUpdate {
                    order_id: order.id,
                    new_status: order.status(),
                    remaining: order.remaining(),
                    processed_value_delta: qty * price,
                    filled_price: price,
                },
                holding: HoldingDelta {
                    user_id: order.user_id.clone(),
                    symbol: self.symbol.clone(),
                    delta: holding_sign,
                },
                cash: CashDelta {
                    user_id: order.user_id.clone(),
                    delta: cash_sign,
                },
            });
        }
    }
}

fn validate(volume: Decimal, price: Option<Decimal>) -> Result<(), ClientError> {
    if volume <= Decimal::ZERO {
        return Err(ClientError::InvalidVolume(volume.to_string()));
    }
    if let Some(price) = price {
        if price <= Decimal::ZERO {
            return Err(ClientError::InvalidPrice(price.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn noop_accept(_: Arc<Order>) {}
    fn noop_fill(_: Fill) {}

    #[test]
    fn s1_single_cross_fully_fills_both_sides() {
        let book = Book::new("AAPL");
        book.place_limit("seller", Side::Sell, dec!(10), dec!(10), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_limit("buyer", Side::Buy, dec!(10), dec!(10), &mut noop_accept, &mut noop_fill)
            .unwrap();

        assert_eq!(book.market_price(), dec!(10));
        assert_eq!(book.depth(Side::Buy), 0);
        assert_eq!(book.depth(Side::Sell), 0);
    }

    #[test]
    fn s2_partial_fill_overflow_goes_to_backlog() {
        let book = Book::new("AAPL");
        let mut fills = Vec::new();
        book.place_limit(
            "buyer",
            Side::Buy,
            dec!(10),
            dec!(10),
            &mut noop_accept,
            &mut |f| fills.push(f),
        )
        .unwrap();
        book.place_market("seller", Side::Sell, dec!(15), &mut noop_accept, &mut |f| {
            fills.push(f)
        })
        .unwrap();

        assert_eq!(book.market_price(), dec!(10));
        assert_eq!(book.depth(Side::Buy), 0);
        assert_eq!(book.depth(Side::Sell), 0);
        assert_eq!(book.backlog_len(Side::Sell), 1);
    }

    #[test]
    fn s3_price_time_priority() {
        let book = Book::new("AAPL");
        let a = book
            .place_limit("a", Side::Buy, dec!(5), dec!(10), &mut noop_accept, &mut noop_fill)
            .unwrap();
        let b = book
            .place_limit("b", Side::Buy, dec!(5), dec!(10), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_market("seller", Side::Sell, dec!(5), &mut noop_accept, &mut noop_fill)
            .unwrap();

        // `a` was first in the queue so it must be the one consumed; `b` still rests.
        assert!(a != b);
        assert_eq!(book.depth(Side::Buy), 1);
    }

    #[test]
    fn s4_multi_level_sweep() {
        let book = Book::new("AAPL");
        book.place_limit("s1", Side::Sell, dec!(5), dec!(20), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_limit("s2", Side::Sell, dec!(5), dec!(21), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_market("buyer", Side::Buy, dec!(8), &mut noop_accept, &mut noop_fill)
            .unwrap();

        assert_eq!(book.market_price(), dec!(21));
        assert_eq!(book.depth(Side::Sell), 1);
        assert_eq!(book.best_ask(), dec!(21));
    }

    #[test]
    fn s5_backlog_drains_before_ladder() {
        let book = Book::new("AAPL");
        book.place_market("buyer", Side::Buy, dec!(5), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_limit("seller", Side::Sell, dec!(3), dec!(50), &mut noop_accept, &mut noop_fill)
            .unwrap();

        assert_eq!(book.market_price(), dec!(50));
        assert_eq!(book.depth(Side::Sell), 0);
        assert_eq!(book.backlog_len(Side::Buy), 1);
    }

    #[test]
    fn no_crossing_at_rest() {
        let book = Book::new("AAPL");
        book.place_limit("b", Side::Buy, dec!(5), dec!(9), &mut noop_accept, &mut noop_fill)
            .unwrap();
        book.place_limit("s", Side::Sell, dec!(5), dec!(11), &mut noop_accept, &mut noop_fill)
            .unwrap();
        assert!(book.best_bid() < book.best_ask());
    }

    #[test]
    fn rejects_non_positive_volume_and_price() {
        let book = Book::new("AAPL");
        assert!(book
            .place_limit("u", Side::Buy, dec!(0), dec!(10), &mut noop_accept, &mut noop_fill)
            .is_err());
        assert!(book
            .place_limit("u", Side::Buy, dec!(10), dec!(0), &mut noop_accept, &mut noop_fill)
            .is_err());
        assert!(book
            .place_market("u", Side::Buy, dec!(0), &mut noop_accept, &mut noop_fill)
            .is_err());
    }

    /// Property 1 (§8): across a mixed sequence of limit and market orders that cross via the
    /// ladder, the backlog, and multiple price levels, total filled volume on the buy side must
    /// equal total filled volume on the sell side.
    #[test]
    fn conservation_of_filled_volume_across_mixed_sequence() {
        let book = Book::new("AAPL");
        let mut buy_filled = Decimal::ZERO;
        let mut sell_filled = Decimal::ZERO;
        let mut on_fill = |f: Fill| {
            if f.holding.delta > Decimal::ZERO {
                buy_filled += f.holding.delta;
            } else {
                sell_filled += -f.holding.delta;
            }
        };

        book.place_limit("s1", Side::Sell, dec!(5), dec!(20), &mut noop_accept, &mut on_fill)
            .unwrap();
        book.place_limit("s2", Side::Sell, dec!(5), dec!(21), &mut noop_accept, &mut on_fill)
            .unwrap();
        book.place_limit("b1", Side::Buy, dec!(7), dec!(21), &mut noop_accept, &mut on_fill)
            .unwrap();
        book.place_market("b2", Side::Buy, dec!(10), &mut noop_accept, &mut on_fill)
            .unwrap();
        book.place_limit("s3", Side::Sell, dec!(3), dec!(19), &mut noop_accept, &mut on_fill)
            .unwrap();
        book.place_market("s4", Side::Sell, dec!(2), &mut noop_accept, &mut on_fill)
            .unwrap();

        assert!(buy_filled > Decimal::ZERO);
        assert_eq!(buy_filled, sell_filled);
    }
}
