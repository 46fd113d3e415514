//! The closed error enum at the command boundary (spec §9: "Use result
//! types with a closed error enum ... business failures are values, not
//! errors"). Business-rule violations never appear here — they surface as
//! a persisted `TransactionFailed` event instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event store I/O failed: {0}")]
    StoreIO(String),

    #[error("event codec failed: {0}")]
    Codec(String),

    #[error("command channel closed")]
    ChannelClosed,

    #[error("command timed out waiting for acknowledgment")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, EngineError>;
