//! Partitioned ingress workers: one task per partition, each reading its own `PartitionReader`
//! and routing validated requests into the resolved book.
//!
//! Grounded on `examples/original_source/exchange/consumer.go` (`RunConsumer` spawning
//! `numWorkers` goroutines, one per partition) and
//! `examples/original_source/backend/internal/exchange/service.go`'s `consumer` `select` loop
//! over messages/errors/shutdown, translated into a `tokio::task` reading from a
//! `PartitionReader` with a shared `CancellationToken` standing in for the original's
//! `Shutdown chan struct{}`.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::book::{Book, Fill};
use crate::error::{BookError, ClientError};
use crate::ingress::{IngressSource, PartitionReader};
use crate::metrics;
use crate::models::{OrderType, PlaceOrderRequest};
use crate::persistence::{PersistenceRecord, PersistenceWriter};

/// Rounds ingress-boundary numeric fields to 2 digits, round-half-to-even, per the wire-format
/// numeric semantics.
fn round_wire(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

pub struct Dispatcher {
    books: Arc<DashMap<String, Arc<Book>>>,
    persistence: Arc<PersistenceWriter>,
}

impl Dispatcher {
    pub fn new(books: Arc<DashMap<String, Arc<Book>>>, persistence: Arc<PersistenceWriter>) -> Self {
        Self { books, persistence }
    }

    /// Spawns one worker per partition of `ingress`. Returns their join handles so the engine can
    /// await them during a graceful shutdown.
    pub fn spawn_workers(
        &self,
        ingress: Arc<dyn IngressSource>,
        cancellation: CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        (0..ingress.partition_count())
            .map(|partition| {
                let reader = ingress.take_partition(partition);
                let books = self.books.clone();
                let persistence = self.persistence.clone();
                let cancellation = cancellation.clone();
                tokio::spawn(async move {
                    Self::worker(partition, reader, books, persistence, cancellation).await;
                })
            })
            .collect()
    }

    async fn worker(
        partition: usize,
        mut reader: Box<dyn PartitionReader>,
        books: Arc<DashMap<String, Arc<Book>>>,
        persistence: Arc<PersistenceWriter>,
        cancellation: CancellationToken,
    ) {
        info!(partition, "dispatcher worker starting");
        loop {
            let request = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!(partition, "dispatcher worker draining on shutdown signal");
                    break;
                }
                message = reader.recv() => message,
            };

            let Some(message) = request else {
                info!(partition, "ingress source closed, worker exiting");
                break;
            };

            let request = match message {
                Ok(req) => req,
                Err(e) => {
                    warn!(partition, error = %e, "failed to read ingress message");
                    continue;
                }
            };

            let symbol = request.symbol.clone();
            if let Err(e) = Self::dispatch(&books, &persistence, request) {
                metrics::record_order_rejected(&symbol);
                warn!(partition, error = %e, "order rejected");
            }
        }
        info!(partition, "dispatcher worker stopped");
    }

    fn dispatch(
        books: &DashMap<String, Arc<Book>>,
        persistence: &PersistenceWriter,
        request: PlaceOrderRequest,
    ) -> Result<(), BookError> {
        let book = books
            .get(&request.symbol)
            .ok_or_else(|| ClientError::SymbolNotFound(request.symbol.clone()))?
            .clone();

        let price = round_wire(request.price);
        let volume = round_wire(request.volume);
        let side_label = match request.order_side {
            crate::models::Side::Buy => "buy",
            crate::models::Side::Sell => "sell",
        };
        metrics::record_order_submitted(&request.symbol, side_label);

        let mut on_accept = |order: Arc<crate::models::Order>| {
            persistence.enqueue(PersistenceRecord::OrderCreated(order));
        };
        let mut on_fill = |fill: Fill| {
            metrics::record_trade(&request.symbol);
            persistence.enqueue(PersistenceRecord::OrderUpdated(fill.order_state));
            persistence.enqueue(PersistenceRecord::Holding(fill.holding));
            persistence.enqueue(PersistenceRecord::Cash(fill.cash));
        };

        let started = std::time::Instant::now();
        let result = match request.order_type {
            OrderType::Limit => book.place_limit(
                request.user_id,
                request.order_side,
                volume,
                price,
                &mut on_accept,
                &mut on_fill,
            ),
            OrderType::Market => book.place_market(
                request.user_id,
                request.order_side,
                volume,
                &mut on_accept,
                &mut on_fill,
            ),
        };
        metrics::record_match_duration(&request.symbol, started.elapsed());
        result?;

        metrics::record_ladder_depth(&request.symbol, "bid", book.depth(crate::models::Side::Buy));
        metrics::record_ladder_depth(&request.symbol, "ask", book.depth(crate::models::Side::Sell));
        let spread = (book.best_ask() - book.best_bid()).to_f64().unwrap_or(0.0);
        metrics::record_spread(&request.symbol, spread);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::InProcessIngress;
    use crate::persistence::InMemoryPersistence;
    use crate::models::Side;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn worker_matches_orders_routed_to_its_partition() {
        let books = Arc::new(DashMap::new());
        books.insert("AAPL".to_string(), Arc::new(Book::new("AAPL")));
        let persistence = Arc::new(PersistenceWriter::start(Arc::new(InMemoryPersistence::default()), 16).0);
        let dispatcher = Dispatcher::new(books.clone(), persistence);

        let ingress = Arc::new(InProcessIngress::new(1, 16));
        let cancellation = CancellationToken::new();
        let handles = dispatcher.spawn_workers(ingress.clone(), cancellation.clone());

        ingress
            .submit(PlaceOrderRequest {
                user_id: "seller".into(),
                symbol: "AAPL".into(),
                order_type: OrderType::Limit,
                order_side: Side::Sell,
                price: dec!(10),
                volume: dec!(5),
            })
            .await
            .unwrap();
        ingress
            .submit(PlaceOrderRequest {
                user_id: "buyer".into(),
                symbol: "AAPL".into(),
                order_type: OrderType::Limit,
                order_side: Side::Buy,
                price: dec!(10),
                volume: dec!(5),
            })
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let book = books.get("AAPL").unwrap();
        assert_eq!(book.market_price(), dec!(10));

        cancellation.cancel();
        for handle in handles {
            let _ = handle.await;
        }
    }
}
