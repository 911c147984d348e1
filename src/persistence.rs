//! Fire-and-forget persistence of accounting side effects.
//!
//! `PersistencePort` is the abstract boundary a real Postgres/Timescale driver would implement —
//! grounded on the method surface of `OrderFlowOrchestrator::persist_trade` and friends in
//! `examples/leeleeEcho-polymarket-backend/src/services/matching/orchestrator.rs`, but expressed
//! as a swappable trait instead of hardcoded `sqlx` calls, since the driver itself is out of
//! scope here. `PersistenceWriter` is the fire-and-forget queue in front of it: matching never
//! waits on a disk write, matching the orchestrator's own `tokio::spawn`-after-synchronous-match
//! pattern in `process_order`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::PersistenceError;
use crate::metrics;
use crate::models::{Candle, CashDelta, HoldingDelta, Order, OrderStateUpdate};

#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn create_stock(&self, symbol: &str) -> Result<(), PersistenceError>;
    async fn create_order(&self, order: &Order) -> Result<(), PersistenceError>;
    async fn update_order(&self, update: &OrderStateUpdate) -> Result<(), PersistenceError>;
    async fn upsert_holding(&self, delta: &HoldingDelta) -> Result<(), PersistenceError>;
    async fn update_cash(&self, delta: &CashDelta) -> Result<(), PersistenceError>;
    async fn insert_candle(&self, symbol: &str, candle: &Candle) -> Result<(), PersistenceError>;
    async fn get_history(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, PersistenceError>;
}

/// A record queued by a symbol registration, an accepted order, a fill, or a candle boundary,
/// destined for `PersistencePort`.
pub enum PersistenceRecord {
    StockCreated(String),
    OrderCreated(Arc<Order>),
    OrderUpdated(OrderStateUpdate),
    Holding(HoldingDelta),
    Cash(CashDelta),
    Candle { symbol: String, candle: Candle },
}

/// Queues records from the matching hot path onto a bounded channel and drains them on a
/// background task with bounded retry, so a slow or failing persistence backend never blocks
/// matching.
pub struct PersistenceWriter {
    sender: mpsc::Sender<PersistenceRecord>,
}

impl PersistenceWriter {
    /// Spawns the background drain task and returns a handle producers can enqueue onto.
    /// Returns the handle plus a join handle the engine awaits during shutdown.
    pub fn start(
        port: Arc<dyn PersistencePort>,
        queue_capacity: usize,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(queue_capacity);

        let join = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = Self::persist_with_retry(&*port, record).await {
                    error!(error = %e, "dropping persistence record after exhausting retries");
                }
            }
        });

        (Self { sender }, join)
    }

    pub fn enqueue(&self, record: PersistenceRecord) {
        if let Err(e) = self.sender.try_send(record) {
            warn!(error = %e, "persistence queue full or closed, dropping record");
        }
    }

    async fn persist_with_retry(
        port: &dyn PersistencePort,
        record: PersistenceRecord,
    ) -> Result<(), PersistenceError> {
        const MAX_ATTEMPTS: u32 = 3;
        let mut delay = Duration::from_millis(50);

        for attempt in 1..=MAX_ATTEMPTS {
            let result = match &record {
                PersistenceRecord::StockCreated(symbol) => port.create_stock(symbol).await,
                PersistenceRecord::OrderCreated(order) => port.create_order(order).await,
                PersistenceRecord::OrderUpdated(update) => port.update_order(update).await,
                PersistenceRecord::Holding(delta) => port.upsert_holding(delta).await,
                PersistenceRecord::Cash(delta) => port.update_cash(delta).await,
                PersistenceRecord::Candle { symbol, candle } => {
                    port.insert_candle(symbol, candle).await
                }
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    metrics::record_persistence_retry();
                    warn!(attempt, error = %e, "persistence write failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!()
    }
}

/// An in-process `PersistencePort` backed by a mutex-guarded `Vec`, used by the demonstration
/// bootstrap and by tests. A real deployment swaps this for a Postgres/Timescale-backed
/// implementation without touching the matching core.
#[derive(Default)]
pub struct InMemoryPersistence {
    candles: Mutex<std::collections::HashMap<String, Vec<Candle>>>,
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn create_stock(&self, _symbol: &str) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn create_order(&self, _order: &Order) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn update_order(&self, _update: &OrderStateUpdate) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn upsert_holding(&self, _delta: &HoldingDelta) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn update_cash(&self, _delta: &CashDelta) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn insert_candle(&self, symbol: &str, candle: &Candle) -> Result<(), PersistenceError> {
        self.candles
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .push(candle.clone());
        Ok(())
    }

    async fn get_history(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, PersistenceError> {
        let candles = self.candles.lock();
        let Some(history) = candles.get(symbol) else {
            return Ok(Vec::new());
        };
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn in_memory_persistence_tracks_candle_history() {
        let port = InMemoryPersistence::default();
        let candle = Candle {
            open: dec!(1),
            high: dec!(2),
            low: dec!(1),
            close: dec!(1.5),
            bid_volume: dec!(10),
            ask_volume: dec!(10),
            recorded_at: chrono::Utc::now(),
            new_candle: true,
        };
        port.insert_candle("AAPL", &candle).await.unwrap();
        let history = port.get_history("AAPL", 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
