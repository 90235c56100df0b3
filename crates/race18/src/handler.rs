//! Per-connection handler: decode frames in, encode events out.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Register the session with the dispatcher, with an outbound channel
//!   2. Spawn a writer task draining that channel onto the socket
//!   3. Loop: receive frames → decode → forward to the dispatcher
//!   4. On close or error, tell the dispatcher the session is gone
//!
//! The handler never touches game state. Anything it cannot decode is
//! reported to the dispatcher, which answers with one ERROR. If the
//! dispatcher drops the session (a client too slow to keep up), the
//! writer ends and the connection is closed.

use std::sync::Arc;

use race18_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use race18_session::{OUTBOUND_CHANNEL_SIZE, SessionId};
use race18_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::{DispatcherHandle, Race18Error};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<K>(
    conn: WebSocketConnection,
    codec: K,
    dispatcher: DispatcherHandle,
) -> Result<(), Race18Error>
where
    K: Codec + Clone,
{
    let conn = Arc::new(conn);
    let session = SessionId(conn.id().into_inner());
    tracing::debug!(%session, peer = %conn.peer_addr(), "handling new connection");

    // The dispatcher holds the only sender, so the writer ends when the
    // session is dropped there.
    let (sender, receiver) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
    dispatcher.connect(session, sender).await?;

    let mut writer = tokio::spawn(write_events(
        Arc::clone(&conn),
        codec.clone(),
        session,
        receiver,
    ));

    let (result, writer_done) = tokio::select! {
        result = read_events(&conn, &codec, session, &dispatcher) => (result, false),
        joined = &mut writer => {
            if joined.is_err() {
                tracing::warn!(%session, "writer task panicked");
            }
            tracing::debug!(%session, "outbound stream ended, closing");
            (Ok(()), true)
        }
    };

    let disconnected = dispatcher.disconnect(session).await;
    if !writer_done && writer.await.is_err() {
        tracing::warn!(%session, "writer task panicked");
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(%session, error = %e, "close after disconnect");
    }

    tracing::info!(%session, "connection closed");
    result.and(disconnected)
}

/// Reads frames until the peer goes away.
async fn read_events<K: Codec>(
    conn: &WebSocketConnection,
    codec: &K,
    session: SessionId,
    dispatcher: &DispatcherHandle,
) -> Result<(), Race18Error> {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%session, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%session, error = %e, "recv error");
                return Ok(());
            }
        };

        match codec.decode::<Envelope<ClientEvent>>(&data) {
            Ok(envelope) => dispatcher.event(session, envelope.event).await?,
            Err(e) => {
                tracing::debug!(%session, error = %e, "failed to decode frame");
                dispatcher.malformed(session).await?;
            }
        }
    }
}

/// Drains the session's outbound channel onto the socket.
async fn write_events<K: Codec>(
    conn: Arc<WebSocketConnection>,
    codec: K,
    session: SessionId,
    mut receiver: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = receiver.recv().await {
        let name = event.name();
        let bytes = match codec.encode(&Envelope::now(event)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%session, event = name, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%session, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
