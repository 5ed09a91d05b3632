//! Testing utilities for the barista café service.
//!
//! [`TestCustomer`] drives a real session over an in-memory
//! `tokio::io::duplex` pipe, so tests exercise the same handshake, dispatch,
//! writer task and disconnect handling a TCP client would.
//!
//! # Quick Start
//!
//! ```ignore
//! use barista_testing::{cafe_with_memory_journal, TestCustomer};
//!
//! let (cafe, journal) = cafe_with_memory_journal(CafeConfig::default());
//! let mut ada = TestCustomer::connect(&cafe, "ada").await?;
//! ada.expect("Welcome, ada, May I have your order, please?").await?;
//!
//! ada.send("order 2 teas").await?;
//! ada.expect("Order received for ada: 2 tea(s) and 0 coffee(s).").await?;
//!
//! // Dropping the stream without `exit` is an abrupt disconnect.
//! let end = ada.disconnect().await?;
//! assert!(end.is_abrupt());
//! ```

use anyhow::{anyhow, bail, Context, Result};
use barista_core::{Cafe, CafeBuilder, CafeConfig, Journal, MemorySink, SessionEnd, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Build a café whose journal records into memory.
///
/// Must be called inside a tokio runtime.
pub fn cafe_with_memory_journal(config: CafeConfig) -> Result<(Cafe, MemorySink)> {
    let sink = MemorySink::new();
    let (journal, _worker) = Journal::spawn(sink.clone());
    let cafe = CafeBuilder::new()
        .with_config(config)
        .with_journal(journal)
        .build()?;
    Ok((cafe, sink))
}

/// Client end of an in-memory session.
pub struct TestCustomer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    session: JoinHandle<Result<SessionEnd, SessionError>>,
}

impl TestCustomer {
    /// Open a session without sending anything yet.
    pub fn open(cafe: &Cafe) -> Self {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let cafe = cafe.clone();
        let session = tokio::spawn(async move { cafe.serve_connection(server).await });

        let (reader, writer) = tokio::io::split(client);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            session,
        }
    }

    /// Open a session and send `name` as the handshake line.
    ///
    /// The welcome (or rejection) line is left unread.
    pub async fn connect(cafe: &Cafe, name: &str) -> Result<Self> {
        let mut customer = Self::open(cafe);
        customer.send(name).await?;
        Ok(customer)
    }

    /// Send one line to the café.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .with_context(|| format!("failed to send {line:?}"))?;
        Ok(())
    }

    /// Send raw bytes exactly as given, with no newline appended.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .await
            .context("failed to send raw bytes")?;
        Ok(())
    }

    /// Next line from the café, or `None` once the café closed the stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines.next_line().await.context("failed to read from café")
    }

    /// Read the next line and require it to equal `expected`.
    pub async fn expect(&mut self, expected: &str) -> Result<()> {
        match self.next_line().await? {
            Some(line) if line == expected => Ok(()),
            Some(line) => bail!("expected {expected:?}, got {line:?}"),
            None => bail!("expected {expected:?}, got end of stream"),
        }
    }

    /// Read consecutive lines, requiring each to match in order.
    pub async fn expect_lines(&mut self, expected: &[&str]) -> Result<()> {
        for line in expected {
            self.expect(line).await?;
        }
        Ok(())
    }

    /// Send `order status` and return the four report lines.
    pub async fn status(&mut self) -> Result<Vec<String>> {
        self.send("order status").await?;
        let mut report = Vec::with_capacity(4);
        for _ in 0..4 {
            let line = self
                .next_line()
                .await?
                .ok_or_else(|| anyhow!("stream ended inside status report"))?;
            report.push(line);
        }
        Ok(report)
    }

    /// Require the café to have closed the stream.
    pub async fn expect_closed(&mut self) -> Result<()> {
        match self.next_line().await? {
            None => Ok(()),
            Some(line) => bail!("expected end of stream, got {line:?}"),
        }
    }

    /// Drop the connection without `exit` and wait for the session to end.
    pub async fn disconnect(self) -> Result<SessionEnd> {
        let Self {
            lines,
            writer,
            session,
        } = self;
        drop(writer);
        drop(lines);
        Ok(session.await.context("session task panicked")??)
    }

    /// Wait for the session to end on its own (after `exit` or a rejection).
    pub async fn finish(self) -> Result<Result<SessionEnd, SessionError>> {
        self.session.await.context("session task panicked")
    }
}
