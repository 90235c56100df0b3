//! The delivery seam between the game core and the network.
//!
//! Rooms never touch sockets. When a room wants to tell its members
//! something it hands each `(session, event)` pair to an [`Outbox`], and
//! whoever implements the trait decides how it reaches the wire. In the
//! server that is the [`SessionRegistry`](crate::SessionRegistry); in
//! tests it is usually a `Vec` that records what would have been sent.

use race18_protocol::ServerEvent;

use crate::SessionId;

/// Delivers outbound events to connected sessions.
pub trait Outbox {
    /// Queues `event` for `session`.
    ///
    /// Delivery is best-effort: if the session is gone the event is
    /// dropped, since its disconnect is already on its way.
    fn deliver(&self, session: SessionId, event: ServerEvent);
}
