//! Session types: what the server knows about one live connection.

use std::fmt;

use race18_protocol::{PlayerId, RoomId, ServerEvent};
use tokio::sync::mpsc;

/// Identifies one live connection.
///
/// Derived from the transport's connection id, so it is unique for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// How many outbound events may wait for one connection's writer task.
///
/// A client that falls this far behind is disconnected rather than
/// buffered without limit.
pub const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Channel sender for delivering outbound events to one connection's
/// writer task.
pub type SessionSender = mpsc::Sender<ServerEvent>;

/// Which room and player a session acts as.
///
/// Set when the connection creates or joins a room and cleared when it
/// leaves. Gameplay events (roll, hold, new game) carry no ids of their
/// own; they are resolved through this binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// A single connection's record.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub(crate) sender: SessionSender,
    pub binding: Option<Binding>,
}

impl Session {
    /// Returns `true` if the connection is currently in a room.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}
