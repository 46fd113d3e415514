//! External input to the engine. Never persisted — only the events it
//! produces are.

use crate::{AccountId, Amount, TransactionId};
use serde::{Deserialize, Serialize};

/// A request to move `amount` from `from_account` to `to_account`,
/// deduplicated on `transaction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCommand {
    pub transaction_id: TransactionId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Amount,
}

impl TransferCommand {
    pub fn new(
        transaction_id: TransactionId,
        from_account: AccountId,
        to_account: AccountId,
        amount: Amount,
    ) -> Self {
        Self {
            transaction_id,
            from_account,
            to_account,
            amount,
        }
    }
}
