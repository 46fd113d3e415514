//! Ledgerflow Read Model - the CQRS projection that answers balance
//! queries independently of the engine's own `balances` map (spec §4.5).
//!
//! The read model never calls into the engine and the engine never calls
//! into the read model; they are wired together by a caller (the
//! `ledgerflow-node` binary) that registers [`ReadModel::apply`] as an
//! engine event handler. That one-directional wiring is what spec §9
//! means by "the read model observes but does not reference the engine".
//!
//! # Consistency
//!
//! Balances are protected by a single `std::sync::RwLock`, not
//! per-account locks: `apply_batch` takes the write lock once and applies
//! every event in the batch before releasing it, so a paired
//! `MoneyDeducted`/`MoneyCredited` update is never observable half-done
//! by a concurrent `get_total_balance` call. This is the "implementations
//! MAY choose to make total-balance queries strongly consistent" option
//! in spec §4.5, chosen here because it costs nothing extra — the events
//! of one command already arrive as a batch.

use ledgerflow_store::EventStore;
use ledgerflow_types::{AccountId, Amount, Event};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Snapshot of every account and its balance, plus the derived totals
/// the query surface exposes (spec §6: `{balances, total_balance,
/// account_count}`).
#[derive(Debug, Clone, Serialize)]
pub struct BalancesSnapshot {
    pub balances: HashMap<AccountId, Amount>,
    pub total_balance: Amount,
    pub account_count: usize,
}

/// The derived balance projection. Holds no reference to the engine or
/// the event store beyond the one `replay` call at startup.
#[derive(Default)]
pub struct ReadModel {
    balances: RwLock<HashMap<AccountId, Amount>>,
}

impl ReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays the full event log into this (presumably empty) read
    /// model before it starts receiving live events — identical in
    /// effect to the engine's own replay (spec §4.5: "replay the event
    /// log identically to the engine before subscribing to live
    /// events").
    pub async fn replay(&self, store: &dyn EventStore) -> ledgerflow_store::Result<usize> {
        let envelopes = store.load_all().await?;
        let mut guard = self.balances.write().expect("read model lock poisoned");
        for envelope in &envelopes {
            Self::apply_locked(&mut guard, &envelope.event);
        }
        let count = envelopes.len();
        tracing::info!(events_replayed = count, "read model replay complete");
        Ok(count)
    }

    /// Applies one event. Intended as the callback passed to
    /// `WalletEngine::register_handler`; restricted to balance mutations
    /// only — it does not track processed transactions, since
    /// deduplication is the engine's job, not the read model's.
    pub fn apply(&self, event: &Event) {
        let mut guard = self.balances.write().expect("read model lock poisoned");
        Self::apply_locked(&mut guard, event);
    }

    /// Applies every event of one command under a single write-lock
    /// acquisition, so a deduction and its paired credit are never
    /// individually observable by a concurrent total-balance query.
    pub fn apply_batch(&self, events: &[Event]) {
        let mut guard = self.balances.write().expect("read model lock poisoned");
        for event in events {
            Self::apply_locked(&mut guard, event);
        }
    }

    fn apply_locked(balances: &mut HashMap<AccountId, Amount>, event: &Event) {
        match event {
            Event::AccountInitialized { account, amount, .. } => {
                let entry = balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry
                    .checked_add(*amount)
                    .expect("seeded balance overflowed i64");
            }
            Event::MoneyDeducted { account, amount, .. } => {
                let entry = balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry
                    .checked_sub(*amount)
                    .expect("read model deduction below zero violates engine invariant");
            }
            Event::MoneyCredited { account, amount, .. } => {
                let entry = balances.entry(account.clone()).or_insert(Amount::ZERO);
                *entry = entry.checked_add(*amount).expect("credit overflowed i64");
            }
            Event::TransactionFailed { .. } => {
                // No balance change; the read model does not track
                // processed transactions at all.
            }
        }
    }

    /// Absent account ≡ `(0, false)` (spec §4.5).
    pub fn get_balance(&self, account: &AccountId) -> (Amount, bool) {
        let guard = self.balances.read().expect("read model lock poisoned");
        match guard.get(account) {
            Some(amount) => (*amount, true),
            None => (Amount::ZERO, false),
        }
    }

    pub fn get_all_balances(&self) -> HashMap<AccountId, Amount> {
        self.balances.read().expect("read model lock poisoned").clone()
    }

    pub fn get_total_balance(&self) -> Amount {
        self.balances
            .read()
            .expect("read model lock poisoned")
            .values()
            .fold(Amount::ZERO, |acc, amount| {
                acc.checked_add(*amount)
                    .expect("sum of all balances overflowed i64")
            })
    }

    /// The full query-surface payload for "all balances" (spec §6).
    pub fn snapshot(&self) -> BalancesSnapshot {
        let guard = self.balances.read().expect("read model lock poisoned");
        let total_balance = guard.values().fold(Amount::ZERO, |acc, amount| {
            acc.checked_add(*amount)
                .expect("sum of all balances overflowed i64")
        });
        BalancesSnapshot {
            account_count: guard.len(),
            balances: guard.clone(),
            total_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerflow_types::TransactionId;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn txn(s: &str) -> TransactionId {
        TransactionId::new(s).unwrap()
    }

    #[test]
    fn absent_account_reads_as_zero_and_nonexistent() {
        let model = ReadModel::new();
        assert_eq!(model.get_balance(&acct("ghost")), (Amount::ZERO, false));
    }

    #[test]
    fn deduct_then_credit_moves_balance_between_accounts() {
        let model = ReadModel::new();
        model.apply(&Event::AccountInitialized {
            transaction_id: txn("seed"),
            account: acct("alice"),
            amount: Amount::new(1000),
        });
        model.apply_batch(&[
            Event::MoneyDeducted {
                transaction_id: txn("t1"),
                account: acct("alice"),
                amount: Amount::new(400),
            },
            Event::MoneyCredited {
                transaction_id: txn("t1"),
                account: acct("bob"),
                amount: Amount::new(400),
            },
        ]);
        assert_eq!(model.get_balance(&acct("alice")), (Amount::new(600), true));
        assert_eq!(model.get_balance(&acct("bob")), (Amount::new(400), true));
        assert_eq!(model.get_total_balance(), Amount::new(1000));
    }

    #[test]
    fn failed_transaction_causes_no_state_change() {
        let model = ReadModel::new();
        model.apply(&Event::TransactionFailed {
            transaction_id: txn("t1"),
            from_account: acct("alice"),
            reason: "insufficient funds".to_string(),
        });
        assert_eq!(model.get_balance(&acct("alice")), (Amount::ZERO, false));
        assert_eq!(model.get_total_balance(), Amount::ZERO);
    }

    #[test]
    fn snapshot_reports_accounts_and_total() {
        let model = ReadModel::new();
        model.apply(&Event::AccountInitialized {
            transaction_id: txn("seed-a"),
            account: acct("a"),
            amount: Amount::new(100),
        });
        model.apply(&Event::AccountInitialized {
            transaction_id: txn("seed-b"),
            account: acct("b"),
            amount: Amount::new(250),
        });
        let snapshot = model.snapshot();
        assert_eq!(snapshot.account_count, 2);
        assert_eq!(snapshot.total_balance, Amount::new(350));
    }

    #[tokio::test]
    async fn replay_reconstructs_balances_from_the_store() {
        use ledgerflow_engine::WalletEngine;
        use ledgerflow_store::FileEventStore;
        use ledgerflow_types::TransferCommand;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let store = Arc::new(FileEventStore::open(&path).await.unwrap());
        let engine = WalletEngine::new(store);
        engine.seed_balance(acct("alice"), Amount::new(1000)).await.unwrap();
        engine.replay().await.unwrap();
        engine
            .process_command(TransferCommand::new(
                txn("t1"),
                acct("alice"),
                acct("bob"),
                Amount::new(300),
            ))
            .await;
        engine.stop().await.unwrap();

        let replay_store = FileEventStore::open(&path).await.unwrap();
        let model = ReadModel::new();
        model.replay(&replay_store).await.unwrap();

        assert_eq!(model.get_balance(&acct("alice")), (Amount::new(700), true));
        assert_eq!(model.get_balance(&acct("bob")), (Amount::new(300), true));
    }
}
