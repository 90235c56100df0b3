//! The session registry: every live connection and the room it plays in.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself: it is a plain
//! `HashMap`. It is owned by the dispatcher task, which handles one event
//! at a time, so no locking is needed here.

use std::cell::RefCell;
use std::collections::HashMap;

use race18_protocol::{PlayerId, RoomId, ServerEvent};
use tokio::sync::mpsc::error::TrySendError;

use crate::{Binding, Outbox, Session, SessionError, SessionId, SessionSender};

/// Tracks connected sessions, their outbound channels, and their bindings.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ bind() ──→ unbind() ──→ disconnect()
///     │                                     ▲
///     └─────────────────────────────────────┘
/// ```
///
/// `disconnect()` hands back the binding (if any) so the caller can remove
/// the player from their room.
///
/// ## Slow clients
///
/// Delivery never waits. A session whose outbound queue is full loses the
/// event and is recorded as lagging; the owner collects those with
/// [`take_lagging()`](Self::take_lagging) and disconnects them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    lagging: RefCell<Vec<SessionId>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if `id` is already known.
    pub fn connect(
        &mut self,
        id: SessionId,
        sender: SessionSender,
    ) -> Result<(), SessionError> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyConnected(id));
        }
        self.sessions.insert(
            id,
            Session {
                id,
                sender,
                binding: None,
            },
        );
        tracing::debug!(session = %id, "session connected");
        Ok(())
    }

    /// Forgets a connection and returns its binding, if it had one.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if `id` is unknown.
    pub fn disconnect(
        &mut self,
        id: SessionId,
    ) -> Result<Option<Binding>, SessionError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        tracing::debug!(session = %id, bound = session.is_bound(), "session disconnected");
        Ok(session.binding)
    }

    /// Binds a session to a room and player.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: unknown session
    /// - [`SessionError::AlreadyBound`]: the session is already in a room
    pub fn bind(
        &mut self,
        id: SessionId,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;
        if let Some(existing) = &session.binding {
            return Err(SessionError::AlreadyBound(id, existing.room_id.clone()));
        }
        session.binding = Some(Binding { room_id, player_id });
        Ok(())
    }

    /// Clears a session's binding, returning what it was.
    pub fn unbind(&mut self, id: SessionId) -> Option<Binding> {
        self.sessions.get_mut(&id)?.binding.take()
    }

    /// Clears the binding of every session playing in `room_id` and
    /// returns those sessions, in id order.
    pub fn unbind_room(&mut self, room_id: &RoomId) -> Vec<SessionId> {
        let mut unbound: Vec<SessionId> = self
            .sessions
            .values_mut()
            .filter(|s| s.binding.as_ref().is_some_and(|b| b.room_id == *room_id))
            .map(|s| {
                s.binding = None;
                s.id
            })
            .collect();
        unbound.sort();
        unbound
    }

    /// The room and player a session acts as, if any.
    pub fn binding(&self, id: SessionId) -> Option<&Binding> {
        self.sessions.get(&id)?.binding.as_ref()
    }

    /// Looks up a session.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Returns `true` if the session is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Returns the number of connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drains the sessions whose outbound queue overflowed since the last
    /// call, in id order and without duplicates.
    pub fn take_lagging(&mut self) -> Vec<SessionId> {
        let mut lagging = std::mem::take(self.lagging.get_mut());
        lagging.sort();
        lagging.dedup();
        lagging
    }
}

impl Outbox for SessionRegistry {
    fn deliver(&self, session: SessionId, event: ServerEvent) {
        let Some(entry) = self.sessions.get(&session) else {
            tracing::trace!(%session, event = event.name(), "dropping event for unknown session");
            return;
        };
        match entry.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(%session, event = event.name(), "outbound queue full, dropping session");
                self.lagging.borrow_mut().push(session);
            }
            Err(TrySendError::Closed(_)) => {
                // Writer task already gone; its Disconnected command is queued.
                tracing::trace!(%session, "outbound channel closed");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
