//! Error types for the transport layer.

use std::net::SocketAddr;

/// Errors that can occur while listening for or talking to clients.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer connected over TCP but the WebSocket upgrade failed.
    #[error("websocket handshake with {peer} failed: {reason}")]
    Handshake { peer: SocketAddr, reason: String },

    /// Writing a frame failed; the connection is unusable.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading a frame failed; the connection is unusable.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
