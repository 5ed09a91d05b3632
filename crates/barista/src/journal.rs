//! Best-effort event journal.
//!
//! Significant events (orders placed, reassignments, collections) are
//! appended to a side-channel log. The journal is observability only:
//!
//! - **Fire-and-forget**: [`Journal::record`] never blocks and never fails
//! - **Background writer**: a single worker task drains the channel into a
//!   [`JournalSink`]
//! - **Lossy on failure**: sink errors are logged with `tracing` and dropped
//!
//! # Example
//!
//! ```ignore
//! let (journal, worker) = Journal::spawn(FileSink::new("barista_log.json"));
//! journal.record("New order from ada: 2 tea(s) and 0 coffee(s).");
//! drop(journal);
//! worker.await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Timestamp layout used in journal records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One journal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Local wall-clock time, formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    pub message: String,
}

impl JournalEntry {
    /// Stamp a message with the current local time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            message: message.into(),
        }
    }
}

/// Destination for journal entries.
#[async_trait]
pub trait JournalSink: Send + 'static {
    async fn write(&mut self, entry: &JournalEntry) -> std::io::Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JournalSink for FileSink {
    async fn write(&mut self, entry: &JournalEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        // Reopened per entry so an external rotate or delete is picked up.
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Keeps entries in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.lock_entries()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock_entries().clone()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<JournalEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JournalSink for MemorySink {
    async fn write(&mut self, entry: &JournalEntry) -> std::io::Result<()> {
        self.lock_entries().push(entry.clone());
        Ok(())
    }
}

/// Cloneable handle for recording journal entries.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    sender: Option<mpsc::UnboundedSender<JournalEntry>>,
}

impl Journal {
    /// Start a background worker writing to `sink`.
    ///
    /// The worker stops once every `Journal` clone has been dropped and the
    /// remaining entries have been written.
    pub fn spawn<S: JournalSink>(sink: S) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(sink, receiver));
        (
            Self {
                sender: Some(sender),
            },
            worker,
        )
    }

    /// A journal that only emits `tracing` lines.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Record an event. Never blocks.
    pub fn record(&self, message: impl Into<String>) {
        let entry = JournalEntry::now(message);
        info!(target: "barista::journal", "{}", entry.message);

        if let Some(sender) = &self.sender {
            if sender.send(entry).is_err() {
                debug!("journal worker gone, entry dropped");
            }
        }
    }
}

async fn run_worker<S: JournalSink>(mut sink: S, mut receiver: mpsc::UnboundedReceiver<JournalEntry>) {
    debug!("journal worker started");

    while let Some(entry) = receiver.recv().await {
        if let Err(e) = sink.write(&entry).await {
            error!(error = %e, message = %entry.message, "failed to write journal entry");
        }
    }

    debug!("journal channel closed, worker stopping");
}
