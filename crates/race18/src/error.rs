//! Unified error type for the Race to 18 server.

use race18_protocol::ProtocolError;
use race18_room::RoomError;
use race18_session::SessionError;
use race18_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum Race18Error {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown or already-bound connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game rule was violated. The message is safe to show to players.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The dispatcher task is gone; no more events can be handled.
    #[error("dispatcher has shut down")]
    DispatcherClosed,
}
