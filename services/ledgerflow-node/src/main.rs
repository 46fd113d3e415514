//! Ledgerflow Node - process bootstrap for the wallet engine.
//!
//! This binary is a minimal stand-in for the HTTP layer the specification
//! places out of scope (spec §1: "HTTP endpoints ... specified only by
//! the interfaces they expose to the core"). It exercises the same
//! C3/C4 contract a real HTTP handler would: replay on startup, accept
//! commands through the bounded channel, serve read-model queries, and
//! shut down cleanly.
//!
//! # Subcommands
//!
//! - `run` — replay the log, then read one JSON `TransferCommand` per
//!   line from stdin, submitting each through the command channel and
//!   printing its acknowledgment to stdout as one JSON object per line.
//! - `transfer` — submit a single command against the log and exit.
//! - `balance` — replay the read model and answer one balance query.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ledgerflow_channel::spawn as spawn_channel;
use ledgerflow_engine::{Ack, WalletEngine};
use ledgerflow_readmodel::ReadModel;
use ledgerflow_store::{EventStore, FileEventStore};
use ledgerflow_types::{AccountId, Amount, EventType, TransactionId, TransferCommand};

use crate::config::NodeConfig;

#[derive(Parser, Debug)]
#[command(name = "ledgerflow-node")]
#[command(author, version, about = "Event-sourced wallet engine node", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "LEDGERFLOW_CONFIG")]
    config: Option<String>,

    /// Overrides `event_store_path` from the config file.
    #[arg(long, env = "LEDGERFLOW_EVENT_STORE_PATH")]
    event_store_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LEDGERFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty).
    #[arg(long, env = "LEDGERFLOW_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay the log and serve commands read as JSON lines from stdin.
    Run,

    /// Submit a single transfer against the log and print its acknowledgment.
    Transfer {
        #[arg(long)]
        transaction_id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
    },

    /// Replay the read model and print a balance query result.
    Balance {
        /// If omitted, prints every account's balance and the total.
        account: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut node_config = NodeConfig::load(cli.config.as_deref())?;

    if let Some(path) = cli.event_store_path {
        node_config.event_store_path = path;
    }
    if let Some(level) = cli.log_level {
        node_config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        node_config.logging.format = format;
    }

    init_logging(&node_config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %node_config.event_store_path.display(),
        "starting ledgerflow node"
    );

    match cli.command {
        Commands::Run => run(node_config).await,
        Commands::Transfer {
            transaction_id,
            from,
            to,
            amount,
        } => transfer(node_config, transaction_id, from, to, amount).await,
        Commands::Balance { account } => balance(node_config, account).await,
    }
}

fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);
    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().with_target(true)).init(),
    }
    Ok(())
}

/// Wires C1–C5 together: open the store, construct the engine, register
/// the read model as a direct in-process handler (never also a bus
/// subscriber — spec §4.5/§9 forbid wiring both to the same projection),
/// and replay both from an empty state before returning.
async fn bootstrap(
    config: &NodeConfig,
) -> anyhow::Result<(Arc<WalletEngine>, Arc<ReadModel>)> {
    let store = Arc::new(FileEventStore::open(&config.event_store_path).await?);
    let engine = Arc::new(WalletEngine::new(store.clone()));
    let read_model = Arc::new(ReadModel::new());

    // Read model replays the log itself before subscribing, so its
    // startup state matches the engine's without depending on it.
    read_model.replay(store.as_ref()).await?;
    engine.replay().await?;

    let projection = read_model.clone();
    engine
        .register_handler(move |event| projection.apply(event))
        .await;

    Ok((engine, read_model))
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let (engine, _read_model) = bootstrap(&config).await?;
    let (channel, worker) = spawn_channel(engine.clone(), config.command_channel_capacity);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    tokio::select! {
        result = async {
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TransferCommand>(&line) {
                    Ok(command) => {
                        let transaction_id = command.transaction_id.clone();
                        match channel.submit(command).await {
                            Ok(ack) => println!("{}", ack_to_json(&ack)),
                            Err(e) => {
                                tracing::error!(%transaction_id, error = %e, "channel error");
                                println!("{}", error_payload(&e.to_string()));
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, line, "malformed command, skipping");
                        println!("{}", error_payload(&format!("malformed command: {e}")));
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        } => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    drop(channel);
    worker.join().await?;
    engine.stop().await?;
    tracing::info!("ledgerflow node shutdown complete");
    Ok(())
}

async fn transfer(
    config: NodeConfig,
    transaction_id: String,
    from: String,
    to: String,
    amount: i64,
) -> anyhow::Result<()> {
    let (engine, _read_model) = bootstrap(&config).await?;

    let transaction_id = TransactionId::new(transaction_id)
        .ok_or_else(|| anyhow::anyhow!("transaction_id must be non-empty"))?;
    let from_account =
        AccountId::new(from).ok_or_else(|| anyhow::anyhow!("from account must be non-empty"))?;
    let to_account =
        AccountId::new(to).ok_or_else(|| anyhow::anyhow!("to account must be non-empty"))?;

    let ack = engine
        .process_command(TransferCommand::new(
            transaction_id,
            from_account,
            to_account,
            Amount::new(amount),
        ))
        .await;
    println!("{}", ack_to_json(&ack));
    engine.stop().await?;
    Ok(())
}

async fn balance(config: NodeConfig, account: Option<String>) -> anyhow::Result<()> {
    let store = FileEventStore::open(&config.event_store_path).await?;
    let read_model = ReadModel::new();
    read_model.replay(&store).await?;
    store.close().await?;

    match account {
        Some(account) => {
            let account = AccountId::new(account)
                .ok_or_else(|| anyhow::anyhow!("account must be non-empty"))?;
            let (amount, exists) = read_model.get_balance(&account);
            let payload = BalanceQueryPayload {
                account: account.as_str(),
                balance: amount.0,
                exists,
            };
            println!("{}", serde_json::to_string(&payload)?);
        }
        None => {
            let snapshot = read_model.snapshot();
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }
    Ok(())
}

/// Spec §6's acknowledgment payload: `{success, error?, events?}`.
#[derive(Serialize)]
struct AckPayload<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    events: &'a [EventType],
}

/// Spec §6's "balance by account" query payload: `{account, balance}`,
/// plus `exists` so an absent account is distinguishable from a zero one.
#[derive(Serialize)]
struct BalanceQueryPayload<'a> {
    account: &'a str,
    balance: i64,
    exists: bool,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    success: bool,
    error: &'a str,
}

fn ack_to_json(ack: &Ack) -> String {
    serde_json::to_string(&AckPayload {
        success: ack.success,
        error: ack.error.as_deref(),
        events: &ack.events,
    })
    .expect("ack payload is always serializable")
}

fn error_payload(message: &str) -> String {
    serde_json::to_string(&ErrorPayload {
        success: false,
        error: message,
    })
    .expect("error payload is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_starts_with_empty_balances() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            event_store_path: dir.path().join("log.jsonl"),
            ..NodeConfig::default()
        };
        let (engine, read_model) = bootstrap(&config).await.unwrap();
        assert_eq!(
            engine.balance(&AccountId::new("alice").unwrap()).await,
            Amount::ZERO
        );
        assert_eq!(read_model.get_total_balance(), Amount::ZERO);
    }

    #[tokio::test]
    async fn bootstrapped_read_model_tracks_a_processed_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        // Seed alice before the node's normal bootstrap path runs, the
        // same way an operator would pre-provision a fresh ledger.
        {
            let store = Arc::new(FileEventStore::open(&path).await.unwrap());
            let seed_engine = WalletEngine::new(store);
            seed_engine
                .seed_balance(AccountId::new("alice").unwrap(), Amount::new(1000))
                .await
                .unwrap();
        }

        let config = NodeConfig {
            event_store_path: path,
            ..NodeConfig::default()
        };
        let (engine, read_model) = bootstrap(&config).await.unwrap();

        let ack = engine
            .process_command(TransferCommand::new(
                TransactionId::new("t1").unwrap(),
                AccountId::new("alice").unwrap(),
                AccountId::new("bob").unwrap(),
                Amount::new(250),
            ))
            .await;
        assert!(ack.success);
        assert_eq!(
            read_model.get_balance(&AccountId::new("bob").unwrap()),
            (Amount::new(250), true)
        );
        engine.stop().await.unwrap();
    }
}
