//! Opaque identifiers
//!
//! `AccountId` and `TransactionId` are both non-empty opaque strings, but
//! kept as distinct newtypes so the type system — not convention — stops a
//! caller from passing one where the other belongs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an account. Compared by equality; no structural constraints
/// beyond non-emptiness are imposed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Returns `None` if `id` is empty.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied transaction key. Uniqueness across the lifetime of the
/// event log is the caller's responsibility; the engine only deduplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ids() {
        assert!(AccountId::new("").is_none());
        assert!(TransactionId::new("").is_none());
    }

    #[test]
    fn accepts_non_empty_ids() {
        assert_eq!(AccountId::new("alice").unwrap().as_str(), "alice");
        assert_eq!(TransactionId::new("txn-1").unwrap().as_str(), "txn-1");
    }
}
