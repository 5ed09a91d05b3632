//! One client session over a line-oriented byte stream.
//!
//! ```text
//!   read half ──► handshake (name) ──► register ──► command loop ──► end
//!                                                        │
//!                                          Dispatcher ───┘
//!   write half ◄── writer task ◄── Connection (mpsc) ◄── dispatcher, scheduler,
//!                                                        reassignment
//! ```
//!
//! The reader runs in the session's own task; everything written to the
//! client goes through the [`Connection`] channel and a dedicated writer
//! task, so scheduler notices can arrive at any time without racing the
//! command replies.
//!
//! # Termination
//!
//! - `exit` ends the session cleanly. The Order is dropped, never donated.
//! - EOF or a read error is abrupt: the reassignment policy runs for the
//!   client before the session returns.
//!
//! Bytes that are not valid UTF-8 are decoded lossily and reach the
//! dispatcher like any other line. Lines longer than [`MAX_LINE_BYTES`] are
//! discarded and answered with an error; neither ends the session.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Span};

use crate::cafe::Cafe;
use crate::connection::{Connection, Outbound};
use crate::dispatch::Flow;
use crate::error::{CommandError, SessionError};
use crate::notice::Notice;

/// Longest line accepted from a client, not counting the newline.
pub const MAX_LINE_BYTES: usize = 4096;

/// How a registered session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client sent `exit`.
    Exit,
    /// The stream hit EOF without `exit`.
    Closed,
    /// Reading from the client failed.
    Failed(std::io::Error),
}

impl SessionEnd {
    /// True for endings that trigger reassignment.
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, SessionEnd::Exit)
    }
}

pub(crate) async fn run<S>(cafe: &Cafe, stream: S) -> Result<SessionEnd, SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let (connection, outbound) = Connection::channel();
    let writer_task = tokio::spawn(write_loop(writer, outbound));

    let identity = match handshake(cafe, &mut reader, &connection).await {
        Ok(identity) => identity,
        Err(e) => {
            connection.close();
            let _ = writer_task.await;
            return Err(e);
        }
    };
    Span::current().record("identity", identity.as_str());
    info!(%identity, "client connected");

    let end = loop {
        match read_line(&mut reader).await {
            Ok(Some(Line::Text(line))) => {
                debug!(%identity, %line, "command");
                if cafe.dispatcher().dispatch(&identity, &connection, &line) == Flow::Exit {
                    break SessionEnd::Exit;
                }
            }
            Ok(Some(Line::TooLong)) => {
                debug!(%identity, limit = MAX_LINE_BYTES, "discarded over-long line");
                connection.send(line_too_long());
            }
            Ok(None) => break SessionEnd::Closed,
            Err(e) => break SessionEnd::Failed(e),
        }
    };

    if end.is_abrupt() {
        info!(%identity, ?end, "client disconnected abruptly");
        let outcome = cafe.reassigner().on_disconnect(&identity);
        debug!(%identity, ?outcome, "reassignment finished");
    }

    connection.close();
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%identity, error = %e, "writer stopped with error"),
        Err(e) => warn!(%identity, error = %e, "writer task failed"),
    }

    Ok(end)
}

async fn handshake<R>(
    cafe: &Cafe,
    reader: &mut R,
    connection: &Connection,
) -> Result<String, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let line = match read_line(reader).await? {
        Some(Line::Text(line)) => line,
        Some(Line::TooLong) => {
            connection.send(line_too_long());
            return Err(SessionError::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        None => return Err(SessionError::ClosedBeforeHandshake),
    };

    let name = line.trim();
    if name.is_empty() {
        connection.send(Notice::NameRequired);
        return Err(SessionError::EmptyName);
    }

    if let Err(e) = cafe.registry().register(name, connection.clone()) {
        connection.send(Notice::NameTaken {
            name: name.to_string(),
        });
        return Err(e.into());
    }

    connection.send(Notice::Welcome {
        name: name.to_string(),
    });
    Ok(name.to_string())
}

/// One line read from a client.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Text(String),
    /// The line exceeded [`MAX_LINE_BYTES`]; its bytes were skipped.
    TooLong,
}

/// Read one newline-terminated line, holding at most `MAX_LINE_BYTES + 1`
/// bytes in memory. `None` at end of stream.
async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<Line>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_BYTES {
        discard_line(reader).await?;
        return Ok(Some(Line::TooLong));
    }

    Ok(Some(Line::Text(String::from_utf8_lossy(&buf).into_owned())))
}

/// Skip everything up to and including the next newline.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (used, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if found {
            return Ok(());
        }
    }
}

fn line_too_long() -> Notice {
    Notice::Error(
        CommandError::LineTooLong {
            limit: MAX_LINE_BYTES,
        }
        .to_string(),
    )
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Outbound>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Notice(notice) => {
                let mut line = notice.to_string();
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await?;
            }
            Outbound::Close => break,
        }
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_write_loop_renders_lines_and_stops_on_close() {
        let (server, client) = duplex(1024);
        let (connection, outbound) = Connection::channel();
        let task = tokio::spawn(write_loop(server, outbound));

        connection.send(Notice::Collected);
        connection.send(Notice::Goodbye { name: "ada".into() });
        connection.close();
        connection.send(Notice::NotReady);
        task.await.unwrap().unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("Enjoy your drinks!"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("Goodbye, ada!"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_status_notice_spans_four_lines() {
        let (server, client) = duplex(1024);
        let (connection, outbound) = Connection::channel();
        let task = tokio::spawn(write_loop(server, outbound));

        connection.send(Notice::Status {
            name: "ada".into(),
            snapshot: Default::default(),
        });
        connection.close();
        task.await.unwrap().unwrap();

        let mut lines = BufReader::new(client).lines();
        let mut count = 0;
        while lines.next_line().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_read_line_decodes_invalid_utf8_lossily() {
        let mut reader: &[u8] = b"caf\xe9\r\norder status\n";
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            Some(Line::Text("caf\u{FFFD}".into()))
        );
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            Some(Line::Text("order status".into()))
        );
        assert_eq!(read_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_skips_over_long_line() {
        let mut input = vec![b'x'; MAX_LINE_BYTES * 3];
        input.extend_from_slice(b"\ncollect\n");
        let mut reader = BufReader::with_capacity(64, input.as_slice());

        assert_eq!(read_line(&mut reader).await.unwrap(), Some(Line::TooLong));
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            Some(Line::Text("collect".into()))
        );
        assert_eq!(read_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_accepts_line_at_limit() {
        let mut input = vec![b'a'; MAX_LINE_BYTES];
        input.push(b'\n');
        let mut reader = input.as_slice();

        match read_line(&mut reader).await.unwrap() {
            Some(Line::Text(line)) => assert_eq!(line.len(), MAX_LINE_BYTES),
            other => panic!("expected text line, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_line_keeps_unterminated_last_line() {
        let mut reader: &[u8] = b"exit";
        assert_eq!(
            read_line(&mut reader).await.unwrap(),
            Some(Line::Text("exit".into()))
        );
    }

    #[test]
    fn test_only_exit_is_clean() {
        assert!(!SessionEnd::Exit.is_abrupt());
        assert!(SessionEnd::Closed.is_abrupt());
        assert!(SessionEnd::Failed(std::io::Error::other("reset")).is_abrupt());
    }
}
