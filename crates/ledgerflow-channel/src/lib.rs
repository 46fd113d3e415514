//! Ledgerflow Channel - the delivery surface that serializes concurrent
//! external callers into the engine's single logical writer (spec §4.4).
//!
//! Commands from distinct callers may arrive concurrently; the channel
//! picks one total order and hands commands to a single dedicated worker
//! task, which is the only task that ever calls
//! [`WalletEngine::process_command`]. This makes the engine's ordering
//! invariant structural — there is exactly one consumer of the channel's
//! receiving end — rather than a discipline callers must uphold.

use ledgerflow_engine::{Ack, WalletEngine};
use ledgerflow_types::TransferCommand;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("command channel is closed")]
    Closed,

    #[error("command channel is at capacity")]
    Full,

    #[error("worker dropped the reply sender before acknowledging")]
    NoReply,
}

enum Delivery {
    RequestReply {
        command: TransferCommand,
        reply: oneshot::Sender<Ack>,
    },
    FireAndForget {
        command: TransferCommand,
    },
}

/// Handle to the bounded command channel. Cloning it is cheap — every
/// clone shares the same bounded queue and the same single worker task.
#[derive(Clone)]
pub struct CommandChannel {
    sender: mpsc::Sender<Delivery>,
}

/// Owns the join handle of the worker task so callers can await a clean
/// shutdown. Dropping this without awaiting it still lets the worker run
/// to completion; it only stops once every `CommandChannel` clone (and
/// thus the underlying `mpsc::Sender`) is dropped.
pub struct CommandWorker {
    handle: JoinHandle<()>,
}

impl CommandWorker {
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.handle.await
    }
}

/// Spawns the dedicated worker task and returns a handle pair: the
/// cloneable `CommandChannel` callers submit through, and the
/// `CommandWorker` the caller should join during shutdown.
///
/// `capacity` bounds the channel (spec §4.4: "the channel is bounded").
/// When the channel is full, `submit`/`publish` return
/// [`ChannelError::Full`] rather than silently dropping the command.
pub fn spawn(engine: Arc<WalletEngine>, capacity: usize) -> (CommandChannel, CommandWorker) {
    let (sender, mut receiver) = mpsc::channel::<Delivery>(capacity);

    let handle = tokio::spawn(async move {
        while let Some(delivery) = receiver.recv().await {
            match delivery {
                Delivery::RequestReply { command, reply } => {
                    let transaction_id = command.transaction_id.clone();
                    let ack = engine.process_command(command).await;
                    if reply.send(ack).is_err() {
                        tracing::warn!(
                            %transaction_id,
                            "reply receiver dropped before acknowledgment was delivered"
                        );
                    }
                }
                Delivery::FireAndForget { command } => {
                    let _ack = engine.process_command(command).await;
                }
            }
        }
        tracing::info!("command channel worker exiting: all senders dropped");
    });

    (CommandChannel { sender }, CommandWorker { handle })
}

impl CommandChannel {
    /// Request/reply: blocks until the worker has processed `command` and
    /// returns its acknowledgment. The caller may additionally wrap this
    /// future in a timeout (spec §5: "request/reply ... has a
    /// caller-supplied timeout"); a timeout here only stops the caller
    /// from waiting, it does not affect engine progress.
    pub async fn submit(&self, command: TransferCommand) -> Result<Ack, ChannelError> {
        let (reply, reply_rx) = oneshot::channel();
        self.sender
            .try_send(Delivery::RequestReply { command, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
            })?;
        reply_rx.await.map_err(|_| ChannelError::NoReply)
    }

    /// Fire-and-forget: enqueues `command` for processing without waiting
    /// for the engine's acknowledgment. Never silently drops — a full or
    /// closed channel is surfaced as an error (spec §4.4).
    pub fn publish(&self, command: TransferCommand) -> Result<(), ChannelError> {
        self.sender
            .try_send(Delivery::FireAndForget { command })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
            })
    }
}
