//! Market-data fan-out to subscribers.
//!
//! Grounded on the teacher's `tokio::sync::broadcast::Sender<TradeEvent>` /
//! `subscribe_trades()`/`subscribe_orderbook()` surface in
//! `services::matching::mod.rs`, and on `cache::pubsub::Publisher::publish_json` for the
//! serialize-then-publish idiom. The Redis transport itself is out of scope; only the in-process
//! broadcast channel ships here.

use tokio::sync::broadcast;
use tracing::warn;

use crate::models::StreamInfoMessage;

/// Abstract publish surface a websocket layer or a real message broker would sit behind. Takes
/// the full wire envelope, not the bare snapshot, so every implementation emits
/// `{"event":"exchange.stream_info","success":true,"result":{...}}` per the external interface.
pub trait BroadcastSink: Send + Sync {
    fn publish(&self, message: StreamInfoMessage);
}

/// An in-process broadcast channel. Lagging subscribers drop the oldest messages rather than
/// stalling the candle aggregator; this is logged, not treated as fatal, matching the design
/// notes' "best-effort feed" guarantee.
pub struct BroadcastChannel {
    sender: broadcast::Sender<StreamInfoMessage>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamInfoMessage> {
        self.sender.subscribe()
    }
}

impl BroadcastSink for BroadcastChannel {
    fn publish(&self, message: StreamInfoMessage) {
        // No receivers is a normal state before any subscriber connects; only warn on genuine
        // channel failure.
        if self.sender.receiver_count() > 0 {
            if let Err(e) = self.sender.send(message) {
                warn!(error = %e, "failed to broadcast symbol info");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::to_stream_message;
    use crate::models::SymbolInfo;
    use rust_decimal_macros::dec;

    fn sample() -> SymbolInfo {
        SymbolInfo {
            symbol: "AAPL".into(),
            price: dec!(10),
            best_bid: dec!(9),
            best_ask: dec!(11),
            candle_data: crate::models::Candle {
                open: dec!(10),
                high: dec!(10),
                low: dec!(10),
                close: dec!(10),
                bid_volume: dec!(0),
                ask_volume: dec!(0),
                recorded_at: chrono::Utc::now(),
                new_candle: false,
            },
        }
    }

    #[test]
    fn subscribers_receive_published_messages() {
        let channel = BroadcastChannel::new(16);
        let mut rx = channel.subscribe();
        channel.publish(to_stream_message(sample()));
        let received = rx.try_recv().expect("message should be buffered");
        assert_eq!(received.result.symbol, "AAPL");
        assert!(received.success);
        assert_eq!(received.event, "exchange.stream_info");
    }
}
