//! Process-level container: owns every book, the dispatcher worker pool, the candle tasks, and
//! the persistence/broadcast handles; exposes `start`/`submit`/`shutdown`.
//!
//! Grounded on the public surface of `MatchingEngine` in
//! `examples/leeleeEcho-polymarket-backend/src/services/matching/mod.rs`
//! (`with_symbols`, `subscribe_trades`, `is_valid_symbol`) and on the graceful-drain pattern in
//! `examples/original_source/backend/internal/exchange/service.go`'s `Shutdown` channel,
//! reimplemented with a `tokio_util::sync::CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::book::Book;
use crate::broadcast::BroadcastSink;
use crate::candle::CandleAggregator;
use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, IngressError, ShutdownTimeout};
use crate::ingress::InProcessIngress;
use crate::models::PlaceOrderRequest;
use crate::persistence::{PersistencePort, PersistenceRecord, PersistenceWriter};

pub struct Engine {
    books: Arc<DashMap<String, Arc<Book>>>,
    ingress: Arc<InProcessIngress>,
    persistence: Arc<PersistenceWriter>,
    cancellation: CancellationToken,
    candle_shutdown: watch::Sender<bool>,
    shutdown_deadline: Duration,
    worker_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    persistence_join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Engine {
    /// Builds the book set and wires the dispatcher, candle tasks, and persistence writer, but
    /// does not yet spawn anything — call `start()` to bring the engine up.
    pub fn new(
        config: &EngineConfig,
        persistence_port: Arc<dyn PersistencePort>,
        broadcast: Arc<dyn BroadcastSink>,
    ) -> Self {
        let books = Arc::new(DashMap::new());
        for symbol in &config.symbols {
            books.insert(symbol.clone(), Arc::new(Book::new(symbol.clone())));
        }

        let ingress = Arc::new(InProcessIngress::new(
            config.ingress_partitions,
            config.persistence_queue_capacity,
        ));
        let (persistence, persistence_join) =
            PersistenceWriter::start(persistence_port, config.persistence_queue_capacity);
        let persistence = Arc::new(persistence);
        for symbol in &config.symbols {
            persistence.enqueue(PersistenceRecord::StockCreated(symbol.clone()));
        }

        let (candle_shutdown, _) = watch::channel(false);

        let engine = Self {
            books,
            ingress,
            persistence,
            cancellation: CancellationToken::new(),
            candle_shutdown,
            shutdown_deadline: config.shutdown_deadline(),
            worker_handles: Mutex::new(Vec::new()),
            persistence_join: Mutex::new(Some(persistence_join)),
        };

        engine.spawn(config, broadcast);
        engine
    }

    fn spawn(&self, config: &EngineConfig, broadcast: Arc<dyn BroadcastSink>) {
        let dispatcher = Dispatcher::new(self.books.clone(), self.persistence.clone());
        let mut handles = dispatcher.spawn_workers(self.ingress.clone(), self.cancellation.clone());

        for entry in self.books.iter() {
            let book = entry.value().clone();
            let aggregator = CandleAggregator::new(
                book,
                config.sample_interval(),
                config.candle_samples,
                broadcast.clone(),
                self.persistence.clone(),
            );
            let shutdown_rx = self.candle_shutdown.subscribe();
            handles.push(tokio::spawn(aggregator.run(shutdown_rx)));
        }

        *self.worker_handles.lock() = handles;
    }

    pub fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.books.contains_key(symbol)
    }

    /// Enqueues an order request onto the partition derived from `(symbol, user_id)`. This is the
    /// method an out-of-scope HTTP front end would call.
    pub async fn submit(&self, request: PlaceOrderRequest) -> Result<(), IngressError> {
        self.ingress.submit(request).await
    }

    /// Signals every worker and candle task to stop, awaits them up to `shutdown_deadline`, then
    /// flushes the persistence writer.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        info!("engine shutdown requested");
        self.cancellation.cancel();
        let _ = self.candle_shutdown.send(true);

        let handles = std::mem::take(&mut *self.worker_handles.lock());
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(self.shutdown_deadline, drain).await.is_err() {
            warn!("shutdown deadline elapsed before all workers drained");
            return Err(ShutdownTimeout {
                deadline_ms: self.shutdown_deadline.as_millis() as u64,
            }
            .into());
        }

        drop(self.persistence);
        let persistence_join = self.persistence_join.lock().take();
        if let Some(join) = persistence_join {
            let _ = join.await;
        }

        info!("engine shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastChannel;
    use crate::models::{OrderType, Side};
    use crate::persistence::InMemoryPersistence;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn submitted_orders_cross_through_the_dispatcher() {
        let config = EngineConfig {
            symbols: vec!["AAPL".to_string()],
            ingress_partitions: 1,
            sample_interval_ms: 50,
            candle_samples: 2,
            ..EngineConfig::default()
        };
        let engine = Engine::new(
            &config,
            Arc::new(InMemoryPersistence::default()),
            Arc::new(BroadcastChannel::new(16)),
        );

        engine
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
        engine
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
        assert!(engine.is_valid_symbol("AAPL"));

        engine.shutdown().await.unwrap();
    }
}
