//! Integer minor-unit money amounts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed 64-bit integer amount in the smallest monetary unit (cents).
///
/// Transfer amounts must be strictly positive; account balances may be
/// zero but must never go negative. Neither constraint is enforced by
/// this type — they are engine-level invariants checked during command
/// validation — `Amount` itself only guarantees overflow-safe arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(pub i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Prints the raw minor-unit integer — never a float. Formatting cents
/// as dollars is a presentation concern for an external collaborator,
/// not this type; float/decimal arithmetic is an explicit non-goal.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_overflows_to_none() {
        assert_eq!(Amount::new(i64::MAX).checked_add(Amount::new(1)), None);
    }

    #[test]
    fn checked_sub_underflows_to_none() {
        assert_eq!(Amount::new(i64::MIN).checked_sub(Amount::new(1)), None);
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }
}
