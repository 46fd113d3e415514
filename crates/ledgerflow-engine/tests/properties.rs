//! Universally-quantified invariants (spec §8) as property tests.

use ledgerflow_engine::WalletEngine;
use ledgerflow_store::FileEventStore;
use ledgerflow_types::{AccountId, Amount, TransactionId, TransferCommand};
use proptest::prelude::*;
use std::sync::Arc;

const ACCOUNTS: &[&str] = &["alice", "bob", "carol"];
const STARTING_BALANCE: i64 = 1_000;

fn acct(s: &str) -> AccountId {
    AccountId::new(s).unwrap()
}

fn txn(s: &str) -> TransactionId {
    TransactionId::new(s).unwrap()
}

async fn seeded_engine(path: &std::path::Path) -> WalletEngine {
    let store = Arc::new(FileEventStore::open(path).await.unwrap());
    let engine = WalletEngine::new(store);
    for account in ACCOUNTS {
        engine
            .seed_balance(acct(account), Amount::new(STARTING_BALANCE))
            .await
            .unwrap();
    }
    engine.replay().await.unwrap();
    engine
}

async fn all_balances(engine: &WalletEngine) -> Vec<Amount> {
    let mut out = Vec::with_capacity(ACCOUNTS.len());
    for account in ACCOUNTS {
        out.push(engine.balance(&acct(account)).await);
    }
    out
}

fn transfer_plan() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
    prop::collection::vec((0..ACCOUNTS.len(), 0..ACCOUNTS.len(), 1i64..500), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Conservation: total balance is invariant under any command sequence.
    #[test]
    fn conservation_holds_for_any_command_sequence(plan in transfer_plan()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let engine = seeded_engine(&dir.path().join("log.jsonl")).await;
            let total_before: i64 = ACCOUNTS.len() as i64 * STARTING_BALANCE;

            for (i, (from, to, amount)) in plan.iter().enumerate() {
                engine
                    .process_command(TransferCommand::new(
                        txn(&format!("p-{i}")),
                        acct(ACCOUNTS[*from]),
                        acct(ACCOUNTS[*to]),
                        Amount::new(*amount),
                    ))
                    .await;
            }

            let total_after: i64 = all_balances(&engine).await.iter().map(|a| a.0).sum();
            prop_assert_eq!(total_before, total_after);
            Ok(())
        })
    }

    /// Non-negativity: no account balance ever goes below zero.
    #[test]
    fn balances_never_go_negative(plan in transfer_plan()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let engine = seeded_engine(&dir.path().join("log.jsonl")).await;

            for (i, (from, to, amount)) in plan.iter().enumerate() {
                engine
                    .process_command(TransferCommand::new(
                        txn(&format!("p-{i}")),
                        acct(ACCOUNTS[*from]),
                        acct(ACCOUNTS[*to]),
                        Amount::new(*amount),
                    ))
                    .await;
                for balance in all_balances(&engine).await {
                    prop_assert!(balance.0 >= 0);
                }
            }
            Ok(())
        })
    }

    /// Idempotence: [c, c] differs from [c] only by the duplicate producing
    /// zero events; final state is identical.
    #[test]
    fn duplicate_submission_is_idempotent(from in 0..ACCOUNTS.len(), to in 0..ACCOUNTS.len(), amount in 1i64..500) {
        prop_assume!(from != to);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let engine = seeded_engine(&dir.path().join("log.jsonl")).await;
            let cmd = TransferCommand::new(txn("dup"), acct(ACCOUNTS[from]), acct(ACCOUNTS[to]), Amount::new(amount));

            engine.process_command(cmd.clone()).await;
            let after_first = all_balances(&engine).await;

            let second_ack = engine.process_command(cmd).await;
            let after_second = all_balances(&engine).await;

            prop_assert_eq!(second_ack.events.len(), 0);
            prop_assert_eq!(after_first, after_second);
            Ok(())
        })
    }

    /// Replay identity: replaying the log produced by any run, with the same
    /// pre-existing-balance injection, reproduces the same balances.
    #[test]
    fn replay_reproduces_final_balances(plan in transfer_plan()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("log.jsonl");
            let engine = seeded_engine(&path).await;

            for (i, (from, to, amount)) in plan.iter().enumerate() {
                engine
                    .process_command(TransferCommand::new(
                        txn(&format!("p-{i}")),
                        acct(ACCOUNTS[*from]),
                        acct(ACCOUNTS[*to]),
                        Amount::new(*amount),
                    ))
                    .await;
            }
            let original = all_balances(&engine).await;
            engine.stop().await.unwrap();

            let fresh_store = Arc::new(FileEventStore::open(&path).await.unwrap());
            let fresh = WalletEngine::new(fresh_store);
            fresh.replay().await.unwrap();
            let replayed = all_balances(&fresh).await;

            prop_assert_eq!(original, replayed);
            Ok(())
        })
    }
}
