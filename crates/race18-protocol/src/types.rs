//! Core protocol types: identities, statuses, and the public room view.
//!
//! Everything in this module travels on the wire inside the events defined
//! in [`crate::events`]. Field names are camelCase and statuses lowercase
//! because the browser client consumes them directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over a v4 UUID. `#[serde(transparent)]` makes it serialize as
/// the plain UUID string (`"9b2c…"`), which is all the client needs: the id
/// is opaque and only ever compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Generates a fresh random player id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Rooms are addressed by a short human-shareable code (e.g. `"K7Q2XM"`)
/// that players type in to join a friend. The registry guarantees
/// uniqueness; the protocol layer treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Wraps an already-normalized room code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Normalizes user input: trims whitespace and upper-cases, so
    /// `" k7q2xm "` and `"K7Q2XM"` address the same room.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the code is empty (nothing was supplied).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Where a player stands in the current round.
///
/// ```text
///            ┌──(score > 18)──→ Bust
/// Active ────┼──(hold)────────→ Held ──(best score at game over)──→ Won
///            └──(score == 18)─→ Won
/// ```
///
/// Only `Active` players may act. The other three are terminal for the
/// round, except that winner determination promotes the best `Held`
/// player to `Won`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Active,
    Bust,
    Held,
    Won,
}

impl PlayerStatus {
    /// Returns `true` if the player may still roll or hold this round.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if the player can be picked as the round winner.
    pub fn is_winner_candidate(self) -> bool {
        matches!(self, Self::Held | Self::Won)
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Bust => write!(f, "bust"),
            Self::Held => write!(f, "held"),
            Self::Won => write!(f, "won"),
        }
    }
}

/// The result tag of a roll or hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Still under the target, the round goes on.
    Playing,
    /// Went over the target.
    Bust,
    /// Hit the target exactly; the round is over.
    Perfect,
    /// Stopped rolling and locked in the score.
    Held,
}

// ---------------------------------------------------------------------------
// Public views
// ---------------------------------------------------------------------------

/// The public face of a player: what every client in the room may see.
///
/// The server-side session reference is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub status: PlayerStatus,
}

/// Immutable snapshot of a room, embedded in most outbound events.
///
/// This is the canonical payload clients render from. Producing it never
/// mutates the room, so two snapshots taken without an intervening action
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub players: Vec<PlayerView>,
    /// Player at the turn cursor, `None` for an empty room.
    pub current_turn: Option<PlayerId>,
    pub game_started: bool,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
}
