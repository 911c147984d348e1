//! Partitioned ingress source: the abstract boundary the dispatcher reads serialized order
//! requests from.
//!
//! Grounded on `examples/original_source/exchange/consumer.go`'s Kafka/sarama partition-consumer
//! shape (`RunConsumer` spawning one worker per partition, each fed by its own message channel).
//! The teacher repo itself decodes HTTP bodies directly in `orchestrator.rs::process_order` with
//! no broker abstraction; this crate generalizes the original's partitioned-consumer idea into a
//! trait so a real broker driver can be swapped in without touching the dispatcher.

use tokio::sync::mpsc;

use crate::error::IngressError;
use crate::models::PlaceOrderRequest;

/// One partition's read side. A dispatcher worker owns exactly one of these for its lifetime.
#[async_trait::async_trait]
pub trait PartitionReader: Send {
    async fn recv(&mut self) -> Option<Result<PlaceOrderRequest, IngressError>>;
}

/// The full ingress source: splits inbound requests across `partition_count()` partitions and
/// hands each dispatcher worker its own `PartitionReader`.
pub trait IngressSource: Send + Sync {
    fn partition_count(&self) -> usize;
    fn take_partition(&self, index: usize) -> Box<dyn PartitionReader>;
}

/// Partitions by `(symbol, user_id)` so a single user's orders for one symbol are always
/// processed in submission order, as required by the per-partition ordering guarantee.
pub fn partition_for(symbol: &str, user_id: &str, partition_count: usize) -> usize {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    symbol.hash(&mut hasher);
    user_id.hash(&mut hasher);
    (hasher.finish() as usize) % partition_count
}

/// An in-process, channel-backed `IngressSource` for the demonstration bootstrap and tests.
pub struct InProcessIngress {
    senders: Vec<mpsc::Sender<PlaceOrderRequest>>,
    receivers: parking_lot::Mutex<Vec<Option<mpsc::Receiver<PlaceOrderRequest>>>>,
    partition_count: usize,
}

impl InProcessIngress {
    pub fn new(partition_count: usize, capacity: usize) -> Self {
        let mut senders = Vec::with_capacity(partition_count);
        let mut receivers = Vec::with_capacity(partition_count);
        for _ in 0..partition_count {
            let (tx, rx) = mpsc::channel(capacity);
            senders.push(tx);
            receivers.push(Some(rx));
        }
        Self {
            senders,
            receivers: parking_lot::Mutex::new(receivers),
            partition_count,
        }
    }

    /// Enqueues a request onto the partition derived from `(symbol, user_id)`. Returns
    /// `IngressError::SourceClosed` if that partition's dispatcher worker has exited.
    pub async fn submit(&self, request: PlaceOrderRequest) -> Result<(), IngressError> {
        let partition = partition_for(&request.symbol, &request.user_id, self.partition_count);
        self.senders[partition]
            .send(request)
            .await
            .map_err(|_| IngressError::SourceClosed)
    }
}

impl IngressSource for InProcessIngress {
    fn partition_count(&self) -> usize {
        self.partition_count
    }

    fn take_partition(&self, index: usize) -> Box<dyn PartitionReader> {
        let receiver = self.receivers.lock()[index]
            .take()
            .expect("partition already taken");
        Box::new(InProcessPartitionReader { receiver })
    }
}

struct InProcessPartitionReader {
    receiver: mpsc::Receiver<PlaceOrderRequest>,
}

#[async_trait::async_trait]
impl PartitionReader for InProcessPartitionReader {
    async fn recv(&mut self) -> Option<Result<PlaceOrderRequest, IngressError>> {
        self.receiver.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn same_user_and_symbol_hash_to_same_partition() {
        let p1 = partition_for("AAPL", "user-1", 5);
        let p2 = partition_for("AAPL", "user-1", 5);
        assert_eq!(p1, p2);
    }

    #[tokio::test]
    async fn submit_routes_to_a_partition_reader() {
        let ingress = InProcessIngress::new(2, 16);
        let req = PlaceOrderRequest {
            user_id: "u1".into(),
            symbol: "AAPL".into(),
            order_type: OrderType::Limit,
            order_side: Side::Buy,
            price: dec!(10),
            volume: dec!(1),
        };
        let partition = partition_for(&req.symbol, &req.user_id, 2);
        ingress.submit(req.clone()).await.unwrap();

        let mut reader = ingress.take_partition(partition);
        let received = reader.recv().await.unwrap().unwrap();
        assert_eq!(received.user_id, req.user_id);
    }
}
