//! Outbound handle to one client connection.
//!
//! A [`Connection`] is the sending half of an unbounded channel drained by the
//! session's writer task. Sends never block and never fail loudly: once the
//! writer has gone away, notices are dropped. Scheduled batches can outlive
//! the client they were started for, so an undeliverable notice is normal.

use tokio::sync::mpsc;
use tracing::trace;

use crate::notice::Notice;

/// What the writer task receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one notice followed by a newline.
    Notice(Notice),
    /// Flush and shut the write half down.
    Close,
}

/// Cloneable handle for pushing notices to a client.
#[derive(Debug, Clone)]
pub struct Connection {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Create a connection and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a notice. Returns false if the connection is already gone.
    pub fn send(&self, notice: Notice) -> bool {
        match self.sender.send(Outbound::Notice(notice)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(dropped)) => {
                trace!(?dropped, "notice undeliverable, connection closed");
                false
            }
        }
    }

    /// Ask the writer to finish after everything already queued.
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// True when both handles feed the same writer.
    pub fn same_as(&self, other: &Connection) -> bool {
        self.sender.same_channel(&other.sender)
    }
}
