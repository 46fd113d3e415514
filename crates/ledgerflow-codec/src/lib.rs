//! Ledgerflow Codec - (de)serialization of the event envelope.
//!
//! The codec is strictly syntactic: it has no opinion on whether a
//! balance may legally go negative, only on whether a byte sequence is a
//! well-formed envelope. Semantic invariants are the engine's job.
//!
//! Wire shape, one object per line:
//! ```json
//! {"type":"MoneyDeducted","timestamp":"2024-01-01T00:00:00Z","data":{"transaction_id":"t1","account":"alice","amount":500}}
//! ```

use ledgerflow_types::{AccountId, Amount, Event, EventEnvelope, TransactionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("malformed envelope: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Malformed(e.to_string())
    }
}

#[derive(Serialize)]
struct WireEnvelopeOut {
    #[serde(rename = "type")]
    tag: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct WireEnvelopeIn {
    #[serde(rename = "type")]
    tag: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct AccountInitializedData {
    transaction_id: TransactionId,
    account: AccountId,
    amount: Amount,
}

#[derive(Deserialize)]
struct MoneyDeductedData {
    transaction_id: TransactionId,
    account: AccountId,
    amount: Amount,
}

#[derive(Deserialize)]
struct MoneyCreditedData {
    transaction_id: TransactionId,
    account: AccountId,
    amount: Amount,
}

#[derive(Deserialize)]
struct TransactionFailedData {
    transaction_id: TransactionId,
    from_account: AccountId,
    reason: String,
}

/// Serializes a single envelope to one line of JSON (no trailing newline;
/// the event store is responsible for line termination).
pub fn encode(envelope: &EventEnvelope) -> Result<String> {
    let (tag, data) = match &envelope.event {
        Event::AccountInitialized {
            transaction_id,
            account,
            amount,
        } => (
            "AccountInitialized",
            serde_json::json!({
                "transaction_id": transaction_id,
                "account": account,
                "amount": amount,
            }),
        ),
        Event::MoneyDeducted {
            transaction_id,
            account,
            amount,
        } => (
            "MoneyDeducted",
            serde_json::json!({
                "transaction_id": transaction_id,
                "account": account,
                "amount": amount,
            }),
        ),
        Event::MoneyCredited {
            transaction_id,
            account,
            amount,
        } => (
            "MoneyCredited",
            serde_json::json!({
                "transaction_id": transaction_id,
                "account": account,
                "amount": amount,
            }),
        ),
        Event::TransactionFailed {
            transaction_id,
            from_account,
            reason,
        } => (
            "TransactionFailed",
            serde_json::json!({
                "transaction_id": transaction_id,
                "from_account": from_account,
                "reason": reason,
            }),
        ),
    };

    let wire = WireEnvelopeOut {
        tag,
        timestamp: envelope.timestamp,
        data,
    };
    Ok(serde_json::to_string(&wire)?)
}

/// Parses a single line of JSON into an envelope. Fails with
/// `CodecError::UnknownEventType` if `type` is not one of the sealed
/// variants, and with `CodecError::Malformed` for any other structural
/// problem.
pub fn decode(line: &str) -> Result<EventEnvelope> {
    let wire: WireEnvelopeIn = serde_json::from_str(line)?;
    let event = match wire.tag.as_str() {
        "AccountInitialized" => {
            let d: AccountInitializedData = serde_json::from_value(wire.data)?;
            Event::AccountInitialized {
                transaction_id: d.transaction_id,
                account: d.account,
                amount: d.amount,
            }
        }
        "MoneyDeducted" => {
            let d: MoneyDeductedData = serde_json::from_value(wire.data)?;
            Event::MoneyDeducted {
                transaction_id: d.transaction_id,
                account: d.account,
                amount: d.amount,
            }
        }
        "MoneyCredited" => {
            let d: MoneyCreditedData = serde_json::from_value(wire.data)?;
            Event::MoneyCredited {
                transaction_id: d.transaction_id,
                account: d.account,
                amount: d.amount,
            }
        }
        "TransactionFailed" => {
            let d: TransactionFailedData = serde_json::from_value(wire.data)?;
            Event::TransactionFailed {
                transaction_id: d.transaction_id,
                from_account: d.from_account,
                reason: d.reason,
            }
        }
        other => return Err(CodecError::UnknownEventType(other.to_string())),
    };
    Ok(EventEnvelope::new(event, wire.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_events() -> Vec<Event> {
        let txn = TransactionId::new("txn-1").unwrap();
        let alice = AccountId::new("alice").unwrap();
        let bob = AccountId::new("bob").unwrap();
        vec![
            Event::AccountInitialized {
                transaction_id: txn.clone(),
                account: alice.clone(),
                amount: Amount::new(1000),
            },
            Event::MoneyDeducted {
                transaction_id: txn.clone(),
                account: alice.clone(),
                amount: Amount::new(100),
            },
            Event::MoneyCredited {
                transaction_id: txn.clone(),
                account: bob.clone(),
                amount: Amount::new(100),
            },
            Event::TransactionFailed {
                transaction_id: txn,
                from_account: alice,
                reason: "insufficient funds".to_string(),
            },
        ]
    }

    #[test]
    fn round_trips_every_variant() {
        for event in sample_events() {
            let envelope = EventEnvelope::new(event.clone(), Utc::now());
            let encoded = encode(&envelope).unwrap();
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded.event, event);
        }
    }

    #[test]
    fn wire_shape_matches_spec() {
        let txn = TransactionId::new("txn-1").unwrap();
        let account = AccountId::new("alice").unwrap();
        let event = Event::MoneyDeducted {
            transaction_id: txn,
            account,
            amount: Amount::new(500),
        };
        let envelope = EventEnvelope::new(event, Utc::now());
        let encoded = encode(&envelope).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "MoneyDeducted");
        assert_eq!(value["data"]["account"], "alice");
        assert_eq!(value["data"]["amount"], 500);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn unknown_type_tag_fails() {
        let line = r#"{"type":"SomethingElse","timestamp":"2024-01-01T00:00:00Z","data":{}}"#;
        let err = decode(line).unwrap_err();
        assert!(matches!(err, CodecError::UnknownEventType(_)));
    }

    #[test]
    fn structurally_invalid_line_fails() {
        let err = decode("not json").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
