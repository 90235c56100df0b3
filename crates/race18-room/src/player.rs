//! A player's identity and per-round state.

use race18_protocol::{PlayerId, PlayerStatus, PlayerView};
use race18_session::SessionId;

use crate::{RoomError, MAX_PLAYER_NAME_LEN};

/// One seat in a room.
///
/// Identity (`id`, `name`, `session`) is fixed at creation. Score and
/// status change only through [`GameState`](crate::GameState), which keeps
/// the score non-decreasing within a round and the status moving forward
/// from `Active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    name: String,
    /// The connection acting as this player. Owned by the session layer;
    /// never serialized.
    session: SessionId,
    pub(crate) score: u32,
    pub(crate) status: PlayerStatus,
}

impl Player {
    /// Creates a player with a fresh random id, score 0, active.
    pub fn new(name: impl Into<String>, session: SessionId) -> Self {
        Self::with_id(PlayerId::random(), name, session)
    }

    /// Creates a player with a known id.
    pub fn with_id(id: PlayerId, name: impl Into<String>, session: SessionId) -> Self {
        Self {
            id,
            name: name.into(),
            session,
            score: 0,
            status: PlayerStatus::Active,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    /// Returns `true` if the player may still act this round.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Back to score 0 and active, for a new round.
    pub fn reset(&mut self) {
        self.score = 0;
        self.status = PlayerStatus::Active;
    }

    /// The public view sent to clients.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
            status: self.status,
        }
    }
}

/// Trims a requested display name and checks it is usable.
///
/// # Errors
/// - [`RoomError::EmptyName`]: blank after trimming
/// - [`RoomError::NameTooLong`]: more than [`MAX_PLAYER_NAME_LEN`] characters
pub fn validate_player_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::EmptyName);
    }
    if name.chars().count() > MAX_PLAYER_NAME_LEN {
        return Err(RoomError::NameTooLong);
    }
    Ok(name.to_string())
}
