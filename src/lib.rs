pub mod book;
pub mod broadcast;
pub mod candle;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ingress;
pub mod metrics;
pub mod models;
pub mod persistence;

pub use config::EngineConfig;
pub use engine::Engine;
