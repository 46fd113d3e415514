//! Ledgerflow Engine - the single-writer deterministic wallet state machine.
//!
//! # Concurrency contract
//!
//! There is exactly one command-processing cursor. All state mutation —
//! validation, apply, and the processed-transaction insert — happens while
//! holding the engine's single write lock, and the event-store append
//! happens *inside* that lock (spec: engine-then-store nesting order,
//! never the reverse). Balance reads may proceed concurrently with an
//! in-flight write; they observe a consistent snapshot because the lock
//! is released atomically by the writer.
//!
//! # Replay identity
//!
//! `apply` is the single pure function shared between live command
//! processing and replay. It reads no clock, no randomness, and performs
//! no I/O — that purity is what makes "replay from an empty state
//! reproduces the same balances" hold.

mod state;

pub use state::EngineState;

use chrono::Utc;
use ledgerflow_store::EventStore;
use ledgerflow_types::{
    AccountId, Amount, EngineError, Event, EventEnvelope, EventType, TransactionId,
    TransferCommand,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Engine lifecycle. Commands are rejected outside `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initializing,
    Running,
    Stopped,
}

/// Reply to a submitted command (spec §6 acknowledgment payload).
/// `success = true` covers both business-success (two events) and
/// business-failure (one `TransactionFailed` event, or zero events for an
/// idempotent replay); `success = false` denotes a system error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub success: bool,
    pub error: Option<String>,
    pub events: Vec<EventType>,
}

impl Ack {
    fn ok(events: Vec<EventType>) -> Self {
        Self {
            success: true,
            error: None,
            events,
        }
    }

    fn system_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            events: vec![],
        }
    }
}

type Handler = dyn Fn(&Event) + Send + Sync;

/// The wallet engine. Generic over nothing — it holds a trait object for
/// the store so it can be exercised against both `FileEventStore` and an
/// in-memory fake in tests.
pub struct WalletEngine {
    store: Arc<dyn EventStore>,
    state: RwLock<EngineState>,
    lifecycle: RwLock<Lifecycle>,
    handlers: RwLock<Vec<Arc<Handler>>>,
    bus: broadcast::Sender<Event>,
}

impl WalletEngine {
    /// Constructs an engine in the `Initializing` lifecycle state, backed
    /// by `store`. Call `replay` before accepting commands.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        let (bus, _) = broadcast::channel(1024);
        Self {
            store,
            state: RwLock::new(EngineState::default()),
            lifecycle: RwLock::new(Lifecycle::Initializing),
            handlers: RwLock::new(Vec::new()),
            bus,
        }
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().await
    }

    /// Replays every persisted event into an empty state. Must be called
    /// exactly once, before the engine leaves `Initializing`. A failure
    /// here is fatal for startup (spec §7): the process must not begin
    /// accepting commands with inconsistent state.
    pub async fn replay(&self) -> Result<usize, EngineError> {
        let mut lifecycle = self.lifecycle.write().await;
        if *lifecycle != Lifecycle::Initializing {
            return Err(EngineError::StoreIO(
                "replay called outside Initializing".to_string(),
            ));
        }

        let envelopes = self.store.load_all().await.map_err(EngineError::from)?;
        let mut state = self.state.write().await;
        for envelope in &envelopes {
            state.apply(&envelope.event);
        }
        let count = envelopes.len();
        *lifecycle = Lifecycle::Running;
        tracing::info!(events_replayed = count, "engine replay complete");
        Ok(count)
    }

    /// Injects a pre-existing balance before the engine starts accepting
    /// commands. This is the resolution of the spec's open question on
    /// "initial deposit": the injection is itself an `AccountInitialized`
    /// event, so a fresh replay of the log reproduces it — unlike an
    /// out-of-band setter, it does not break replay identity. Only valid
    /// while `Initializing`.
    ///
    /// This only appends the event; it does **not** touch in-memory
    /// state. `replay` is the only path that ever applies events to
    /// `EngineState`, and it applies every persisted event exactly once
    /// starting from empty — applying here too would double-count every
    /// seed the moment `replay` runs.
    pub async fn seed_balance(&self, account: AccountId, amount: Amount) -> Result<(), EngineError> {
        if self.lifecycle().await != Lifecycle::Initializing {
            return Err(EngineError::StoreIO(
                "seed_balance is only permitted before replay/Running".to_string(),
            ));
        }
        let transaction_id = TransactionId::new(format!("seed-{}", account))
            .expect("account-derived seed id is never empty");
        let event = Event::AccountInitialized {
            transaction_id,
            account,
            amount,
        };
        let envelope = EventEnvelope::now(event);
        self.store
            .append_batch(std::slice::from_ref(&envelope))
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    /// Registers a synchronous in-process subscriber, notified for every
    /// event in persisted order. A panicking handler is caught and logged
    /// — it never retroactively fails an already-persisted command.
    pub async fn register_handler<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.write().await.push(Arc::new(handler));
    }

    /// Subscribes to the outbound event bus, for out-of-process consumers.
    /// Reserved for callers other than the core read model, which should
    /// prefer `register_handler` to avoid double-counting (spec §4.5/§9).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.state.read().await.balance(account)
    }

    /// Runs the command-processing algorithm of spec §4.3 to completion.
    pub async fn process_command(&self, command: TransferCommand) -> Ack {
        if self.lifecycle().await != Lifecycle::Running {
            return Ack::system_error("engine is not accepting commands");
        }

        let mut state = self.state.write().await;

        // Step 1: idempotency check, observed as of the start of processing.
        if state.is_processed(&command.transaction_id) {
            tracing::info!(
                transaction_id = %command.transaction_id,
                "idempotent replay: transaction already processed"
            );
            return Ack::ok(vec![]);
        }

        // Step 2: validation, first failure wins.
        let events = if !command.amount.is_positive() {
            vec![Event::TransactionFailed {
                transaction_id: command.transaction_id.clone(),
                from_account: command.from_account.clone(),
                reason: "amount must be positive".to_string(),
            }]
        } else if command.from_account == command.to_account {
            vec![Event::TransactionFailed {
                transaction_id: command.transaction_id.clone(),
                from_account: command.from_account.clone(),
                reason: "cannot transfer to same account".to_string(),
            }]
        } else if state.balance(&command.from_account) < command.amount {
            vec![Event::TransactionFailed {
                transaction_id: command.transaction_id.clone(),
                from_account: command.from_account.clone(),
                reason: "insufficient funds".to_string(),
            }]
        } else {
            // Step 3: success — deduction strictly precedes credit.
            vec![
                Event::MoneyDeducted {
                    transaction_id: command.transaction_id.clone(),
                    account: command.from_account.clone(),
                    amount: command.amount,
                },
                Event::MoneyCredited {
                    transaction_id: command.transaction_id.clone(),
                    account: command.to_account.clone(),
                    amount: command.amount,
                },
            ]
        };

        let envelopes: Vec<EventEnvelope> = events
            .iter()
            .cloned()
            .map(|event| EventEnvelope::new(event, Utc::now()))
            .collect();

        // Step 4: persist. On failure, abort without mutating state.
        if let Err(e) = self.store.append_batch(&envelopes).await {
            tracing::error!(
                transaction_id = %command.transaction_id,
                error = %e,
                "failed to persist command"
            );
            return Ack::system_error(format!("store append failed: {e}"));
        }

        // Step 5: apply, in order, while still holding the write lock.
        for event in &events {
            state.apply(event);
        }
        let event_types: Vec<EventType> = events.iter().map(Event::event_type).collect();
        drop(state);

        // Step 6: notify subscribers, then publish to the bus.
        let handlers = self.handlers.read().await.clone();
        for event in &events {
            for handler in &handlers {
                let handler = handler.clone();
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
                if result.is_err() {
                    tracing::error!(
                        transaction_id = %command.transaction_id,
                        "subscriber handler panicked; swallowing"
                    );
                }
            }
            // No receivers is not an error: the bus is best-effort fan-out.
            let _ = self.bus.send(event.clone());
        }

        // Step 7: acknowledge.
        Ack::ok(event_types)
    }

    /// Drains in-flight work (there is none left once `process_command`
    /// returns, since processing is not cancellable mid-flight), refuses
    /// further commands, and closes the store.
    pub async fn stop(&self) -> Result<(), EngineError> {
        *self.lifecycle.write().await = Lifecycle::Stopped;
        self.store.close().await.map_err(EngineError::from)
    }
}
