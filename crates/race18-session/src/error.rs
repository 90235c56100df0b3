//! Error types for the session layer.

use race18_protocol::RoomId;

use crate::SessionId;

/// Errors that can occur while tracking connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The connection was already registered.
    #[error("session {0} is already connected")]
    AlreadyConnected(SessionId),

    /// The connection already plays in a room. One room per connection.
    #[error("session {0} is already in room {1}")]
    AlreadyBound(SessionId, RoomId),
}
