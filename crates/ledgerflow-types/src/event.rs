//! The persisted event model: a closed tagged union plus its wire envelope.

use crate::{AccountId, Amount, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sealed set of domain events. Every variant carries a
/// `transaction_id` so it can be matched back to the command that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A pre-existing or bootstrap balance applied before the engine
    /// accepts commands. Never emitted by `process_command` — only by the
    /// engine's `seed_balance` path while `Initializing`. Recorded so
    /// replay on a fresh node reproduces the same starting balances
    /// (see the engine crate's discussion of replay identity).
    AccountInitialized {
        transaction_id: TransactionId,
        account: AccountId,
        amount: Amount,
    },
    MoneyDeducted {
        transaction_id: TransactionId,
        account: AccountId,
        amount: Amount,
    },
    MoneyCredited {
        transaction_id: TransactionId,
        account: AccountId,
        amount: Amount,
    },
    TransactionFailed {
        transaction_id: TransactionId,
        from_account: AccountId,
        reason: String,
    },
}

impl Event {
    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            Event::AccountInitialized { transaction_id, .. }
            | Event::MoneyDeducted { transaction_id, .. }
            | Event::MoneyCredited { transaction_id, .. }
            | Event::TransactionFailed { transaction_id, .. } => transaction_id,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::AccountInitialized { .. } => EventType::AccountInitialized,
            Event::MoneyDeducted { .. } => EventType::MoneyDeducted,
            Event::MoneyCredited { .. } => EventType::MoneyCredited,
            Event::TransactionFailed { .. } => EventType::TransactionFailed,
        }
    }
}

/// The tag alone, useful for acknowledgment payloads that list event types
/// without the full payload (spec §6: `events?: [tag, ...]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    AccountInitialized,
    MoneyDeducted,
    MoneyCredited,
    TransactionFailed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::AccountInitialized => "AccountInitialized",
            EventType::MoneyDeducted => "MoneyDeducted",
            EventType::MoneyCredited => "MoneyCredited",
            EventType::TransactionFailed => "TransactionFailed",
        };
        write!(f, "{s}")
    }
}

/// The wire and on-disk form of an event: a tag, an informational
/// timestamp, and the variant payload. The timestamp must never be
/// consulted to decide state — it exists for audit/debugging only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: Event, timestamp: DateTime<Utc>) -> Self {
        Self { event, timestamp }
    }

    pub fn now(event: Event) -> Self {
        Self::new(event, Utc::now())
    }
}
