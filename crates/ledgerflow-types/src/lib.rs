//! Ledgerflow Types - canonical domain types for the wallet engine
//!
//! This crate has zero dependencies on other ledgerflow crates. It defines
//! the complete vocabulary the rest of the workspace shares:
//!
//! - Identity types (`AccountId`, `TransactionId`)
//! - `Amount`, a signed integer-minor-units money type
//! - `TransferCommand`, the external input the engine consumes
//! - `Event` / `EventEnvelope`, the only persisted datum
//! - `EngineError`, the closed error enum at the command boundary
//!
//! # Architectural invariants
//!
//! 1. Amounts are always integer minor units — no float ever appears in
//!    this crate.
//! 2. Events are immutable once constructed; nothing here mutates an
//!    `Event` after creation.
//! 3. The timestamp on an `EventEnvelope` is informational only and must
//!    never be consulted to decide state.

pub mod amount;
pub mod command;
pub mod error;
pub mod event;
pub mod identity;

pub use amount::Amount;
pub use command::TransferCommand;
pub use error::EngineError;
pub use event::{Event, EventEnvelope, EventType};
pub use identity::{AccountId, TransactionId};
