//! Periodic OHLC sampling and publication for one book.
//!
//! Generalizes the ticker-driven per-second price stream in
//! `examples/original_source/backend/websocket/handlers.go` (`handleStreamSymbolInfo`,
//! `handleStreamMarketPrice`, both `time.NewTicker(1 * time.Second)`) into a configurable
//! sample/bucket scheme: every `sample_interval` the aggregator samples the market price; every
//! `samples_per_candle` samples it closes an OHLC bucket. The broadcast event name
//! (`exchange.stream_info`) and response envelope shape are taken verbatim from
//! `examples/original_source/backend/websocket/types.go`'s `EventStreamSymbolInfo` /
//! `ResponseGetSymbolInfo`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::book::Book;
use crate::broadcast::BroadcastSink;
use crate::metrics;
use crate::models::{Candle, StreamInfoMessage, SymbolInfo};
use crate::persistence::{PersistenceRecord, PersistenceWriter};

pub const STREAM_INFO_EVENT: &str = "exchange.stream_info";

pub struct CandleAggregator {
    book: Arc<Book>,
    sample_interval: Duration,
    samples_per_candle: usize,
    broadcast: Arc<dyn BroadcastSink>,
    persistence: Arc<PersistenceWriter>,
}

impl CandleAggregator {
    pub fn new(
        book: Arc<Book>,
        sample_interval: Duration,
        samples_per_candle: usize,
        broadcast: Arc<dyn BroadcastSink>,
        persistence: Arc<PersistenceWriter>,
    ) -> Self {
        Self {
            book,
            sample_interval,
            samples_per_candle,
            broadcast,
            persistence,
        }
    }

    /// Runs until `shutdown` fires. One iteration = one sample; every `samples_per_candle`
    /// samples a candle boundary closes.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.sample_interval);
        let mut samples: Vec<Decimal> = Vec::with_capacity(self.samples_per_candle);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let price = self.book.market_price();
                    samples.push(price);
                    let new_candle = samples.len() >= self.samples_per_candle;
                    let candle = self.bucket(&samples, new_candle);

                    self.publish(price, &candle);
                    if new_candle {
                        metrics::record_candle_emitted(&self.book.symbol);
                        self.persistence.enqueue(PersistenceRecord::Candle {
                            symbol: self.book.symbol.clone(),
                            candle,
                        });
                        samples.clear();
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(symbol = %self.book.symbol, "candle aggregator shutting down");
                        return;
                    }
                }
            }
        }
    }

    fn bucket(&self, samples: &[Decimal], new_candle: bool) -> Candle {
        let open = *samples.first().unwrap_or(&Decimal::ZERO);
        let close = *samples.last().unwrap_or(&Decimal::ZERO);
        let high = samples.iter().copied().fold(open, |a, b| a.max(b));
        let low = samples.iter().copied().fold(open, |a, b| a.min(b));
        let (bid_volume, ask_volume) = if new_candle {
            self.book.take_cumulative_volumes()
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Candle {
            open,
            high,
            low,
            close,
            bid_volume,
            ask_volume,
            recorded_at: Utc::now(),
            new_candle,
        }
    }

    fn publish(&self, price: Decimal, candle: &Candle) {
        let info = SymbolInfo {
            symbol: self.book.symbol.clone(),
            price,
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
            candle_data: candle.clone(),
        };
        self.broadcast.publish(to_stream_message(info));
    }
}

/// Wraps a `SymbolInfo` snapshot in the wire envelope external subscribers expect.
pub fn to_stream_message(info: SymbolInfo) -> StreamInfoMessage {
    StreamInfoMessage {
        event: STREAM_INFO_EVENT,
        success: true,
        result: info,
    }
}
