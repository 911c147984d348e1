//! Typed configuration loaded from the environment, with `.env` support.
//!
//! Mirrors the `AppConfig::load()` call the teacher's `main.rs` makes; that repo's own
//! `config.rs` never made it into the retrieved pack, so the shape here is grounded instead on
//! the original Go service's `internal/config/config.go` (env-key naming, `Load`/`Validate` split).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Symbols this engine instance makes a book for.
    pub symbols: Vec<String>,
    /// Number of ingress partitions / dispatcher workers.
    pub ingress_partitions: usize,
    /// Candle sampler cadence.
    pub sample_interval_ms: u64,
    /// Samples per emitted candle.
    pub candle_samples: usize,
    /// Bound on graceful shutdown drain.
    pub shutdown_deadline_ms: u64,
    /// Capacity of the persistence writer's internal channel before it starts blocking producers.
    pub persistence_queue_capacity: usize,
    /// Number of most recent candles `PersistencePort::get_history` returns.
    pub candle_history_depth: usize,
    /// `RUST_LOG`-style filter passed to `tracing_subscriber::EnvFilter`.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string()],
            ingress_partitions: 5,
            sample_interval_ms: 500,
            candle_samples: 5,
            shutdown_deadline_ms: 30_000,
            persistence_queue_capacity: 1024,
            candle_history_depth: 75,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `.env` (if present) and environment variables prefixed
    /// `ENGINE__`, falling back to defaults for anything unset — the same layering the teacher
    /// applies via `dotenvy::dotenv()` followed by `config::Config`.
    pub fn load() -> Result<Self, EngineError> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(config::Config::try_from(&EngineConfig::default()).map_err(|e| {
                EngineError::Config(format!("failed to seed defaults: {e}"))
            })?)
            .add_source(
                config::Environment::with_prefix("ENGINE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let parsed: EngineConfig = cfg
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.symbols.is_empty() {
            return Err(EngineError::Config("symbols must not be empty".into()));
        }
        if self.ingress_partitions == 0 {
            return Err(EngineError::Config(
                "ingress_partitions must be at least 1".into(),
            ));
        }
        if self.candle_samples == 0 {
            return Err(EngineError::Config(
                "candle_samples must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_symbols() {
        let cfg = EngineConfig {
            symbols: vec![],
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
