//! TCP accept loop.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, field, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cafe::Cafe;
use crate::error::SessionError;

/// Accept clients on `listener` until `shutdown` resolves.
///
/// Each connection runs in its own task inside a `session` span. Accept
/// errors are logged and the loop keeps going. Sessions already running are
/// left to finish on their own.
pub async fn serve<F>(listener: TcpListener, cafe: Cafe, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "accepting connections");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_session(cafe.clone(), stream, peer),
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

fn spawn_session(cafe: Cafe, stream: TcpStream, peer: SocketAddr) {
    let session_id = Uuid::new_v4();
    let span = info_span!("session", %peer, %session_id, identity = field::Empty);

    tokio::spawn(
        async move {
            match cafe.serve_connection(stream).await {
                Ok(end) => info!(?end, "session ended"),
                Err(SessionError::Io(e)) => warn!(error = %e, "session failed"),
                Err(e) => info!(reason = %e, "session rejected"),
            }
        }
        .instrument(span),
    );
}
