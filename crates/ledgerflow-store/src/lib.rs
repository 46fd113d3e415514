//! Ledgerflow Store - append-only durable event log.
//!
//! Line-delimited JSON, one envelope per line, UTF-8, no BOM. The file is
//! opened for append; reads open an independent handle so a replay never
//! contends with an in-flight append for the same file descriptor's
//! cursor.
//!
//! # Durability
//!
//! `append_batch` does not return success until every byte of the batch
//! has been flushed and fsynced. If encoding any event in the batch
//! fails, no bytes for the batch are written at all.
//!
//! # Recovery policy
//!
//! A trailing partial line (no terminating `\n`) is tolerated on replay:
//! it is treated as the end of the log and a warning is logged. The
//! partial tail is truncated from the file on the store's first
//! successful append after open, never during a read-only `load_all`.
//! That check only runs once per open handle — every append made by
//! this process afterwards writes only complete, newline-terminated
//! lines, so the file can never regrow a partial tail on its own.

use async_trait::async_trait;
use ledgerflow_types::EngineError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] ledgerflow_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(io) => EngineError::StoreIO(io.to_string()),
            StoreError::Codec(codec) => EngineError::Codec(codec.to_string()),
        }
    }
}

use ledgerflow_types::EventEnvelope;

/// The store's contract: append a batch atomically, replay every event in
/// order, and release resources on shutdown.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_batch(&self, envelopes: &[EventEnvelope]) -> Result<()>;
    async fn load_all(&self) -> Result<Vec<EventEnvelope>>;
    async fn close(&self) -> Result<()>;
}

/// Line-delimited-JSON event log backed by a single file.
pub struct FileEventStore {
    path: PathBuf,
    writer: Mutex<tokio::fs::File>,
    partial_tail_checked: AtomicBool,
}

/// How much of the file's tail to probe for the last newline before
/// falling back to a full scan. Generous relative to one JSON line, so
/// the common case never reads more than a few KiB regardless of how
/// large the log has grown.
const TAIL_PROBE_BYTES: u64 = 64 * 1024;

impl FileEventStore {
    /// Opens (creating if absent) the log at `path` for append.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            partial_tail_checked: AtomicBool::new(false),
        })
    }

    /// Truncates a trailing partial (non-newline-terminated) line, if one
    /// exists. Called at most once per open handle, from `append_batch`,
    /// holding the writer lock. Reads only the last `TAIL_PROBE_BYTES` of
    /// the file rather than the whole log; only falls back to a full
    /// read if an unterminated line somehow exceeds that window. Returns
    /// whether anything was truncated.
    async fn truncate_trailing_partial_line(&self) -> Result<bool> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(false);
        }

        let probe_len = len.min(TAIL_PROBE_BYTES);
        file.seek(SeekFrom::Start(len - probe_len)).await?;
        let mut tail = vec![0u8; probe_len as usize];
        file.read_exact(&mut tail).await?;

        if tail.last() == Some(&b'\n') {
            return Ok(false);
        }

        let keep_len = match tail.iter().rposition(|&b| b == b'\n') {
            Some(pos) => len - probe_len + pos as u64 + 1,
            None if probe_len == len => 0,
            None => {
                // The unterminated tail is longer than the probe window;
                // fall back to a full scan rather than guessing.
                let contents = tokio::fs::read(&self.path).await?;
                match contents.iter().rposition(|&b| b == b'\n') {
                    Some(pos) => (pos + 1) as u64,
                    None => 0,
                }
            }
        };

        tracing::warn!(
            path = %self.path.display(),
            discarded_bytes = len - keep_len,
            "truncating trailing partial line from event log"
        );
        let handle = OpenOptions::new().write(true).open(&self.path).await?;
        handle.set_len(keep_len).await?;
        Ok(true)
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn append_batch(&self, envelopes: &[EventEnvelope]) -> Result<()> {
        if envelopes.is_empty() {
            return Ok(());
        }

        // Encode everything before touching the file: a mid-batch codec
        // failure must leave no bytes written.
        let mut lines = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            lines.push(ledgerflow_codec::encode(envelope)?);
        }

        let mut guard = self.writer.lock().await;

        // The partial-tail check only needs to run once per open handle:
        // after it runs (whether or not it truncated anything), every
        // append from this process writes only complete lines, so the
        // file can never regrow a partial tail on its own.
        if !self.partial_tail_checked.swap(true, Ordering::SeqCst) {
            let truncated = self.truncate_trailing_partial_line().await?;
            if truncated {
                // The writer was opened append-only, so its cursor may be
                // stale relative to the truncation above; reopen to pick
                // up the new length.
                *guard = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
            }
        }

        let mut buf = String::new();
        for line in &lines {
            buf.push_str(line);
            buf.push('\n');
        }
        guard.write_all(buf.as_bytes()).await?;
        guard.flush().await?;
        guard.sync_all().await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<EventEnvelope>> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let ends_with_newline = contents.ends_with('\n');
        let mut lines: Vec<&str> = contents.split('\n').collect();
        // split() on a trailing '\n' yields one empty trailing element.
        if ends_with_newline {
            lines.pop();
        }

        let mut envelopes = Vec::with_capacity(lines.len());
        let last_index = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let is_last = i == last_index;
            match ledgerflow_codec::decode(line) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) if is_last && !ends_with_newline => {
                    tracing::warn!(
                        error = %e,
                        "discarding unterminated trailing line during replay"
                    );
                }
                Err(e) => return Err(StoreError::Codec(e)),
            }
        }
        Ok(envelopes)
    }

    async fn close(&self) -> Result<()> {
        let guard = self.writer.lock().await;
        guard.sync_all().await?;
        Ok(())
    }
}
