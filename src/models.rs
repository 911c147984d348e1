//! Core domain types shared across the matching engine, dispatcher, and candle aggregator.
//!
//! Enum shapes are grounded on `services::matching::types` in the teacher repo; `Candle` and the
//! accounting delta records are grounded on `StockPriceHistory`/`Transaction` in the original Go
//! `internal/models/orderbook.go`. Unlike the teacher's `types.rs`, there is no `FeeConfig` here —
//! the ported fill model has no fee concept.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OrderId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
}

/// A single order. Identity and submitted terms are immutable; `remaining`/`status` are guarded
/// by their own lock so a fill never needs to hold the book's match lock and an order's lock at
/// once any longer than the fill itself takes.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub initial_volume: Decimal,
    pub created_at: DateTime<Utc>,
    state: Mutex<OrderState>,
}

#[derive(Debug, Clone, Copy)]
struct OrderState {
    remaining: Decimal,
    status: OrderStatus,
}

impl Order {
    pub fn new(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        limit_price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            symbol: symbol.into(),
            side,
            order_type,
            limit_price,
            initial_volume: volume,
            created_at: Utc::now(),
            state: Mutex::new(OrderState {
                remaining: volume,
                status: OrderStatus::Open,
            }),
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.state.lock().remaining
    }

    pub fn status(&self) -> OrderStatus {
        self.state.lock().status
    }

    /// Reduces remaining volume by `qty` and advances status accordingly. Never moves status
    /// backward: Open -> PartiallyFilled -> Filled only.
    pub fn fill(&self, qty: Decimal) {
        let mut state = self.state.lock();
        debug_assert!(qty > Decimal::ZERO && qty <= state.remaining);
        state.remaining -= qty;
        state.status = if state.remaining.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

/// OHLC bucket produced by the candle aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub new_candle: bool,
}

/// Emitted on every fill so a caller can update an order's persisted row.
#[derive(Debug, Clone)]
pub struct OrderStateUpdate {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub remaining: Decimal,
    pub processed_value_delta: Decimal,
    pub filled_price: Decimal,
}

/// Emitted on every fill: the position-size change for the filled side's owner.
#[derive(Debug, Clone)]
pub struct HoldingDelta {
    pub user_id: String,
    pub symbol: String,
    pub delta: Decimal,
}

/// Emitted on every fill: the cash-balance change for the filled side's owner.
#[derive(Debug, Clone)]
pub struct CashDelta {
    pub user_id: String,
    pub delta: Decimal,
}

/// Wire shape of an inbound order request, as deserialized off the ingress source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub order_side: Side,
    #[serde(default)]
    pub price: Decimal,
    pub volume: Decimal,
}

/// Wire shape broadcast to market-data subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfoMessage {
    pub event: &'static str,
    pub success: bool,
    pub result: SymbolInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub price: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub candle_data: Candle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fill_advances_status_monotonically() {
        let order = Order::new("u1", "AAPL", Side::Buy, OrderType::Limit, dec!(10), dec!(10));
        assert_eq!(order.status(), OrderStatus::Open);
        order.fill(dec!(4));
        assert_eq!(order.status(), OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining(), dec!(6));
        order.fill(dec!(6));
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.remaining(), Decimal::ZERO);
    }

    #[test]
    fn opposite_side_flips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
