//! Prometheus metric names and recording helpers for the matching core.
//!
//! Naming convention (flat `snake_case` constants grouped by subsystem) is grounded on
//! `examples/leeleeEcho-polymarket-backend/src/metrics/mod.rs`'s `names`/`labels` modules, trimmed
//! down to the matching/dispatch/candle subsystems this crate actually owns — no HTTP, DB, cache,
//! or websocket metric families are carried, since those subsystems are out of scope.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub mod names {
    pub const ORDERS_SUBMITTED_TOTAL: &str = "matching_orders_submitted_total";
    pub const ORDERS_REJECTED_TOTAL: &str = "matching_orders_rejected_total";
    pub const TRADES_EXECUTED_TOTAL: &str = "matching_trades_executed_total";
    pub const MATCH_DURATION_SECONDS: &str = "matching_match_duration_seconds";
    pub const LADDER_DEPTH: &str = "matching_ladder_depth";
    pub const SPREAD: &str = "matching_spread";
    pub const CANDLES_EMITTED_TOTAL: &str = "matching_candles_emitted_total";
    pub const PERSISTENCE_RETRIES_TOTAL: &str = "matching_persistence_retries_total";
}

pub mod labels {
    pub const SYMBOL: &str = "symbol";
    pub const SIDE: &str = "side";
}

pub fn record_order_submitted(symbol: &str, side: &str) {
    counter!(names::ORDERS_SUBMITTED_TOTAL, labels::SYMBOL => symbol.to_string(), labels::SIDE => side.to_string())
        .increment(1);
}

pub fn record_order_rejected(symbol: &str) {
    counter!(names::ORDERS_REJECTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_trade(symbol: &str) {
    counter!(names::TRADES_EXECUTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_match_duration(symbol: &str, elapsed: Duration) {
    histogram!(names::MATCH_DURATION_SECONDS, labels::SYMBOL => symbol.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_ladder_depth(symbol: &str, side: &str, depth: usize) {
    gauge!(names::LADDER_DEPTH, labels::SYMBOL => symbol.to_string(), labels::SIDE => side.to_string())
        .set(depth as f64);
}

pub fn record_spread(symbol: &str, spread: f64) {
    gauge!(names::SPREAD, labels::SYMBOL => symbol.to_string()).set(spread);
}

pub fn record_candle_emitted(symbol: &str) {
    counter!(names::CANDLES_EMITTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_persistence_retry() {
    counter!(names::PERSISTENCE_RETRIES_TOTAL).increment(1);
}

/// Installs the process-wide Prometheus recorder with buckets tuned for a hot matching path,
/// mirroring `init_metrics` in
/// `examples/leeleeEcho-polymarket-backend/src/metrics/mod.rs`, trimmed to this crate's single
/// latency histogram.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::MATCH_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5],
        )
        .expect("match duration buckets are non-empty")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}
