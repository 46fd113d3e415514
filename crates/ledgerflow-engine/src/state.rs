//! The engine's in-memory state and the pure `apply` function shared by
//! live processing and replay.

use ledgerflow_types::{AccountId, Amount, Event, TransactionId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct EngineState {
    balances: HashMap<AccountId, Amount>,
    processed_transactions: HashSet<TransactionId>,
}

impl EngineState {
    /// Absent account ≡ balance of zero.
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn is_processed(&self, transaction_id: &TransactionId) -> bool {
        self.processed_transactions.contains(transaction_id)
    }

    pub fn all_balances(&self) -> &HashMap<AccountId, Amount> {
        &self.balances
    }

    /// Pure state transition: no clock reads, no randomness, no I/O. This
    /// determinism is what makes replaying the log from an empty state
    /// reproduce identical balances on any node.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::AccountInitialized {
                account, amount, ..
            } => {
                let entry = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry
                    .checked_add(*amount)
                    .expect("seeded balance overflowed i64");
            }
            Event::MoneyDeducted {
                transaction_id,
                account,
                amount,
            } => {
                let entry = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry
                    .checked_sub(*amount)
                    .expect("deduction below zero violates the engine's own invariant");
                self.processed_transactions.insert(transaction_id.clone());
            }
            Event::MoneyCredited { account, amount, .. } => {
                let entry = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry
                    .checked_add(*amount)
                    .expect("credit overflowed i64");
                // transaction_id already marked processed by the paired deduction
            }
            Event::TransactionFailed { transaction_id, .. } => {
                self.processed_transactions.insert(transaction_id.clone());
            }
        }
    }
}
