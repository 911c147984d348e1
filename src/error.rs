//! Error taxonomy for the matching core and its surrounding services.
//!
//! Each variant corresponds to one failure domain described in the design notes: bad client
//! input never mutates state, invariant violations poison the owning book, persistence and
//! ingress failures are logged and do not stop matching.

use thiserror::Error;

/// Rejected before any state mutation occurs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("volume must be greater than zero, got {0}")]
    InvalidVolume(String),
    #[error("price must be greater than zero for limit orders, got {0}")]
    InvalidPrice(String),
    #[error("unknown symbol: {0}")]
    SymbolNotFound(String),
    #[error("invalid order side: {0}")]
    InvalidSide(String),
    #[error("invalid order type: {0}")]
    InvalidOrderType(String),
}

/// A broken invariant in the matching core. Always a bug, never a client mistake.
/// A book that returns this is considered poisoned; callers must stop routing orders to it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("price level {0} is reachable from the ladder but its queue is empty")]
    EmptyQueueReachable(String),
    #[error("order {0} has negative remaining volume")]
    NegativeRemaining(String),
    #[error("order {0} is indexed as active but absent from its queue")]
    OrphanedActiveOrder(String),
}

/// Returned by `Book::place_limit`/`place_market`: either a rejected client input, or a broken
/// invariant that poisons the book.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("book is poisoned by a prior invariant violation and is no longer accepting orders")]
    Poisoned,
}

/// A failure from the `PersistencePort`. Logged by the writer; never blocks matching.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
    #[error("persistence write rejected: {0}")]
    Rejected(String),
}

/// A failure on the ingress path: malformed messages, broker/driver errors.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to deserialize ingress message: {0}")]
    Deserialize(String),
    #[error("ingress source closed")]
    SourceClosed,
}

/// The engine did not finish draining within its configured shutdown deadline.
#[derive(Debug, Error)]
#[error("shutdown did not complete within {deadline_ms}ms")]
pub struct ShutdownTimeout {
    pub deadline_ms: u64,
}

/// Top-level error returned by `Engine::shutdown` and config loading.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Shutdown(#[from] ShutdownTimeout),
    #[error("configuration error: {0}")]
    Config(String),
}
